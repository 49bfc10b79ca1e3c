//! New resting-order triage.
//!
//! Open orders are diffed by oid between consecutive snapshots. An order
//! placed to protect or unwind an existing position should not be copied
//! as a fresh entry, so every new order is checked against the trader's
//! current positions before it is mirrored.

use std::collections::HashMap;

use crate::models::{OpenOrder, PerpPosition};

/// How a newly appeared resting order should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDisposition {
    /// A genuine new entry worth mirroring at its limit price
    EntryCandidate,
    /// A stop, take-profit, or unwind for an existing position
    Protective,
}

/// Orders in `curr` but not in `prev`, each with a disposition. An order is
/// protective when it is reduce-only or when it trades against an existing
/// position in the same coin (a sell against a long, a buy against a short).
/// Results are sorted by oid so placement order is deterministic.
pub fn triage_new_orders(
    prev: &HashMap<u64, OpenOrder>,
    curr: &HashMap<u64, OpenOrder>,
    positions: &HashMap<String, PerpPosition>,
) -> Vec<(OpenOrder, OrderDisposition)> {
    let mut triaged: Vec<(OpenOrder, OrderDisposition)> = curr
        .iter()
        .filter(|(oid, _)| !prev.contains_key(oid))
        .map(|(_, order)| {
            let disposition = if is_protective(order, positions.get(&order.coin)) {
                OrderDisposition::Protective
            } else {
                OrderDisposition::EntryCandidate
            };
            (order.clone(), disposition)
        })
        .collect();
    triaged.sort_by_key(|(order, _)| order.oid);
    triaged
}

fn is_protective(order: &OpenOrder, position: Option<&PerpPosition>) -> bool {
    if order.reduce_only {
        return true;
    }
    match position {
        Some(p) if p.is_long() => !order.side.is_buy(),
        Some(p) if p.is_short() => order.side.is_buy(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Side;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn order(oid: u64, coin: &str, side: Side, reduce_only: bool) -> OpenOrder {
        OpenOrder {
            oid,
            coin: coin.to_string(),
            side,
            price: dec!(100),
            size: dec!(1),
            order_type: "Limit".to_string(),
            reduce_only,
        }
    }

    fn position(coin: &str, size: Decimal) -> PerpPosition {
        PerpPosition {
            coin: coin.to_string(),
            size,
            entry_price: dec!(100),
            unrealized_pnl: Decimal::ZERO,
            leverage: Decimal::ONE,
        }
    }

    fn orders(list: Vec<OpenOrder>) -> HashMap<u64, OpenOrder> {
        list.into_iter().map(|o| (o.oid, o)).collect()
    }

    fn positions(list: Vec<PerpPosition>) -> HashMap<String, PerpPosition> {
        list.into_iter().map(|p| (p.coin.clone(), p)).collect()
    }

    #[test]
    fn only_new_oids_are_triaged() {
        let prev = orders(vec![order(1, "ETH", Side::Buy, false)]);
        let curr = orders(vec![
            order(1, "ETH", Side::Buy, false),
            order(2, "BTC", Side::Buy, false),
        ]);
        let result = triage_new_orders(&prev, &curr, &HashMap::new());
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].0.oid, 2);
    }

    #[test]
    fn reduce_only_is_protective() {
        let curr = orders(vec![order(1, "ETH", Side::Buy, true)]);
        let result = triage_new_orders(&HashMap::new(), &curr, &HashMap::new());
        assert_eq!(result[0].1, OrderDisposition::Protective);
    }

    #[test]
    fn sell_against_a_long_is_protective() {
        let curr = orders(vec![order(1, "ETH", Side::Sell, false)]);
        let pos = positions(vec![position("ETH", dec!(5))]);
        let result = triage_new_orders(&HashMap::new(), &curr, &pos);
        assert_eq!(result[0].1, OrderDisposition::Protective);
    }

    #[test]
    fn buy_against_a_short_is_protective() {
        let curr = orders(vec![order(1, "ETH", Side::Buy, false)]);
        let pos = positions(vec![position("ETH", dec!(-5))]);
        let result = triage_new_orders(&HashMap::new(), &curr, &pos);
        assert_eq!(result[0].1, OrderDisposition::Protective);
    }

    #[test]
    fn order_without_a_position_is_an_entry_candidate() {
        let curr = orders(vec![order(1, "ETH", Side::Buy, false)]);
        let result = triage_new_orders(&HashMap::new(), &curr, &HashMap::new());
        assert_eq!(result[0].1, OrderDisposition::EntryCandidate);
    }

    #[test]
    fn buy_extending_a_long_is_an_entry_candidate() {
        let curr = orders(vec![order(1, "ETH", Side::Buy, false)]);
        let pos = positions(vec![position("ETH", dec!(5))]);
        let result = triage_new_orders(&HashMap::new(), &curr, &pos);
        assert_eq!(result[0].1, OrderDisposition::EntryCandidate);
    }

    #[test]
    fn results_are_sorted_by_oid() {
        let curr = orders(vec![
            order(9, "ETH", Side::Buy, false),
            order(3, "BTC", Side::Buy, false),
            order(5, "SOL", Side::Buy, false),
        ]);
        let result = triage_new_orders(&HashMap::new(), &curr, &HashMap::new());
        let oids: Vec<u64> = result.iter().map(|(o, _)| o.oid).collect();
        assert_eq!(oids, vec![3, 5, 9]);
    }
}
