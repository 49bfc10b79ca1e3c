//! Calculator for account performance metrics: win rate, Sharpe, drawdown.

use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use statrs::statistics::Statistics;

use crate::models::{AccountMetrics, Fill};

/// Computes performance metrics from an account's fill history.
///
/// Only closing fills carry realized PnL, so each fill with a non-zero
/// `closed_pnl` is treated as one closed position. Opening fills contribute
/// nothing measurable and are skipped.
pub struct MetricsCalculator;

impl MetricsCalculator {
    pub fn from_fills(address: &str, fills: &[Fill]) -> AccountMetrics {
        let mut metrics = AccountMetrics::new(address.to_string());

        let mut closed: Vec<&Fill> = fills.iter().filter(|f| f.is_closing()).collect();
        closed.sort_by_key(|f| f.time_ms);

        if closed.is_empty() {
            metrics.calculated_at = Utc::now();
            return metrics;
        }

        let pnls: Vec<Decimal> = closed.iter().map(|f| f.closed_pnl).collect();

        metrics.total_trades = closed.len() as u32;
        metrics.total_volume = closed.iter().map(|f| f.notional()).sum();
        metrics.total_pnl = pnls.iter().copied().sum();

        Self::calculate_win_loss(&mut metrics, &pnls);
        Self::calculate_sharpe(&mut metrics, &pnls);
        Self::calculate_drawdown(&mut metrics, &pnls);
        Self::calculate_streaks(&mut metrics, &pnls);

        // ROI over estimated deployed capital. Actual margin history is not
        // in the fill feed, so capital is approximated as a tenth of the
        // closed volume.
        let capital = metrics.total_volume / Decimal::from(10u32);
        if capital > Decimal::ZERO {
            metrics.roi = (metrics.total_pnl / capital).to_f64().unwrap_or(0.0);
        }

        metrics.calculated_at = Utc::now();
        metrics
    }

    fn calculate_win_loss(metrics: &mut AccountMetrics, pnls: &[Decimal]) {
        let (wins, losses): (Vec<_>, Vec<_>) = pnls.iter().partition(|&&p| p > Decimal::ZERO);

        metrics.winning_trades = wins.len() as u32;
        metrics.losing_trades = losses.len() as u32;
        metrics.win_rate = wins.len() as f64 / pnls.len() as f64;

        if !wins.is_empty() {
            metrics.avg_win =
                wins.iter().copied().sum::<Decimal>() / Decimal::from(wins.len() as u32);
        }
        if !losses.is_empty() {
            metrics.avg_loss = losses.iter().copied().map(|l: Decimal| l.abs()).sum::<Decimal>()
                / Decimal::from(losses.len() as u32);
        }

        let gross_profit: Decimal = wins.iter().copied().sum();
        let gross_loss: Decimal = losses.iter().copied().map(|l: Decimal| l.abs()).sum();
        if gross_loss > Decimal::ZERO {
            metrics.profit_factor =
                gross_profit.to_f64().unwrap_or(0.0) / gross_loss.to_f64().unwrap_or(1.0);
        }
    }

    /// Annualized Sharpe over per-position returns, 0% risk-free rate.
    fn calculate_sharpe(metrics: &mut AccountMetrics, pnls: &[Decimal]) {
        if pnls.len() < 2 {
            return;
        }

        let returns: Vec<f64> = pnls.iter().filter_map(|p| p.to_f64()).collect();
        if returns.len() < 2 {
            return;
        }

        let mean = returns.clone().mean();
        let std_dev = returns.std_dev();
        if std_dev > 0.0 {
            metrics.sharpe_ratio = (mean / std_dev) * (365.0_f64).sqrt();
        }
    }

    /// Maximum drawdown fraction over the cumulative PnL curve.
    fn calculate_drawdown(metrics: &mut AccountMetrics, pnls: &[Decimal]) {
        let mut equity = Decimal::ZERO;
        let mut peak = Decimal::ZERO;
        let mut max_dd_pct = 0.0f64;

        for pnl in pnls {
            equity += pnl;
            if equity > peak {
                peak = equity;
            }
            if peak > Decimal::ZERO {
                let dd = (peak - equity).to_f64().unwrap_or(0.0)
                    / peak.to_f64().unwrap_or(1.0);
                if dd > max_dd_pct {
                    max_dd_pct = dd;
                }
            }
        }

        metrics.max_drawdown = max_dd_pct;
    }

    fn calculate_streaks(metrics: &mut AccountMetrics, pnls: &[Decimal]) {
        let mut wins = 0u32;
        let mut losses = 0u32;
        for pnl in pnls {
            if *pnl > Decimal::ZERO {
                wins += 1;
                losses = 0;
            } else if *pnl < Decimal::ZERO {
                losses += 1;
                wins = 0;
            }
            metrics.max_consecutive_wins = metrics.max_consecutive_wins.max(wins);
            metrics.max_consecutive_losses = metrics.max_consecutive_losses.max(losses);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Side;
    use rust_decimal_macros::dec;

    fn closing_fill(id: u64, time_ms: i64, pnl: Decimal) -> Fill {
        Fill {
            id,
            coin: "ETH".to_string(),
            side: Side::Sell,
            price: dec!(100),
            size: dec!(1),
            time_ms,
            closed_pnl: pnl,
            dir: "Close Long".to_string(),
        }
    }

    fn opening_fill(id: u64, time_ms: i64) -> Fill {
        Fill {
            id,
            coin: "ETH".to_string(),
            side: Side::Buy,
            price: dec!(100),
            size: dec!(1),
            time_ms,
            closed_pnl: Decimal::ZERO,
            dir: "Open Long".to_string(),
        }
    }

    #[test]
    fn win_loss_counts_ignore_opening_fills() {
        let fills = vec![
            opening_fill(1, 1000),
            closing_fill(2, 2000, dec!(100)),
            opening_fill(3, 3000),
            closing_fill(4, 4000, dec!(-50)),
            closing_fill(5, 5000, dec!(200)),
        ];

        let metrics = MetricsCalculator::from_fills("0xabc", &fills);
        assert_eq!(metrics.total_trades, 3);
        assert_eq!(metrics.winning_trades, 2);
        assert_eq!(metrics.losing_trades, 1);
        assert!((metrics.win_rate - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(metrics.total_pnl, dec!(250));
        assert!((metrics.profit_factor - 6.0).abs() < 1e-9);
    }

    #[test]
    fn drawdown_follows_the_equity_curve() {
        let fills = vec![
            closing_fill(1, 1000, dec!(100)),
            closing_fill(2, 2000, dec!(50)),
            closing_fill(3, 3000, dec!(-80)),
            closing_fill(4, 4000, dec!(-20)),
            closing_fill(5, 5000, dec!(150)),
        ];

        let metrics = MetricsCalculator::from_fills("0xabc", &fills);
        // Peak 150, trough 50, drawdown 100/150.
        assert!(metrics.max_drawdown > 0.65 && metrics.max_drawdown < 0.68);
    }

    #[test]
    fn streaks_reset_on_sign_change() {
        let pnls = [
            dec!(10),
            dec!(20),
            dec!(30),
            dec!(-5),
            dec!(-5),
            dec!(10),
        ];
        let fills: Vec<Fill> = pnls
            .iter()
            .enumerate()
            .map(|(i, p)| closing_fill(i as u64, i as i64 * 1000, *p))
            .collect();

        let metrics = MetricsCalculator::from_fills("0xabc", &fills);
        assert_eq!(metrics.max_consecutive_wins, 3);
        assert_eq!(metrics.max_consecutive_losses, 2);
    }

    #[test]
    fn no_closed_positions_means_empty_metrics() {
        let fills = vec![opening_fill(1, 1000)];
        let metrics = MetricsCalculator::from_fills("0xabc", &fills);
        assert_eq!(metrics.total_trades, 0);
        assert_eq!(metrics.win_rate, 0.0);
        assert_eq!(metrics.score(), 0.0);
    }
}
