//! Fill model representing an executed trade event on Hyperliquid.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Direction of a fill or resting order. The exchange encodes this as
/// `"B"` (bid/buy) or `"A"` (ask/sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Parse the single-letter wire code.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "B" => Some(Side::Buy),
            "A" => Some(Side::Sell),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }

    pub fn is_buy(&self) -> bool {
        matches!(self, Side::Buy)
    }

    /// The side that closes a position opened on this side.
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// A single executed trade for an account, immutable once fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    /// Exchange-assigned trade id, monotonically assigned per account
    pub id: u64,

    /// Instrument symbol (e.g. "ETH")
    pub coin: String,

    /// Taker side marker. Informational only; classification is driven by
    /// the position delta, not this field.
    pub side: Side,

    /// Execution price
    pub price: Decimal,

    /// Executed size in coin units
    pub size: Decimal,

    /// Execution time in unix milliseconds
    pub time_ms: i64,

    /// Realized PnL, non-zero only when the fill closed or reduced a position
    pub closed_pnl: Decimal,

    /// Exchange direction label ("Open Long", "Close Short", ...), display only
    #[serde(default)]
    pub dir: String,
}

impl Fill {
    /// Notional value of the fill (size × price).
    pub fn notional(&self) -> Decimal {
        self.size * self.price
    }

    /// Whether this fill realized any PnL (closed or reduced a position).
    pub fn is_closing(&self) -> bool {
        !self.closed_pnl.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn side_wire_codes() {
        assert_eq!(Side::from_code("B"), Some(Side::Buy));
        assert_eq!(Side::from_code("A"), Some(Side::Sell));
        assert_eq!(Side::from_code("X"), None);
        assert_eq!(Side::Buy.opposite(), Side::Sell);
    }

    #[test]
    fn fill_notional() {
        let fill = Fill {
            id: 1,
            coin: "ETH".to_string(),
            side: Side::Buy,
            price: dec!(2000),
            size: dec!(0.5),
            time_ms: 0,
            closed_pnl: Decimal::ZERO,
            dir: String::new(),
        };
        assert_eq!(fill.notional(), dec!(1000));
        assert!(!fill.is_closing());
    }
}
