//! Account performance metrics derived from fill history.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Performance metrics for one account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountMetrics {
    /// Account address
    pub address: String,

    /// When these metrics were calculated
    pub calculated_at: DateTime<Utc>,

    /// Number of closed positions observed in the fill history
    pub total_trades: u32,

    /// Closed positions with positive realized PnL
    pub winning_trades: u32,

    /// Closed positions with negative realized PnL
    pub losing_trades: u32,

    /// Win rate (0.0 to 1.0)
    pub win_rate: f64,

    /// Total realized PnL in USD
    pub total_pnl: Decimal,

    /// Total closed-position volume in USD
    pub total_volume: Decimal,

    /// Average profit on winning positions
    pub avg_win: Decimal,

    /// Average loss on losing positions (absolute value)
    pub avg_loss: Decimal,

    /// Gross profit / gross loss
    pub profit_factor: f64,

    /// Return on estimated capital deployed
    pub roi: f64,

    /// Annualized Sharpe ratio over per-position returns
    pub sharpe_ratio: f64,

    /// Maximum drawdown fraction over the cumulative PnL curve (0.0 to 1.0)
    pub max_drawdown: f64,

    /// Longest run of consecutive winning positions
    pub max_consecutive_wins: u32,

    /// Longest run of consecutive losing positions
    pub max_consecutive_losses: u32,
}

impl AccountMetrics {
    /// Empty metrics for an address.
    pub fn new(address: String) -> Self {
        Self {
            address,
            calculated_at: Utc::now(),
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            win_rate: 0.0,
            total_pnl: Decimal::ZERO,
            total_volume: Decimal::ZERO,
            avg_win: Decimal::ZERO,
            avg_loss: Decimal::ZERO,
            profit_factor: 0.0,
            roi: 0.0,
            sharpe_ratio: 0.0,
            max_drawdown: 0.0,
            max_consecutive_wins: 0,
            max_consecutive_losses: 0,
        }
    }

    /// Composite ranking score.
    ///
    /// Weights: win rate 30%, ROI 30% (capped at 200%), Sharpe 20% (capped
    /// at 3), profit factor 10% (capped at 5), trade count 10% (capped at
    /// 100 trades).
    pub fn score(&self) -> f64 {
        let mut score = 0.0;
        score += self.win_rate * 0.3 * 100.0;
        score += self.roi.min(2.0) * 0.3 * 50.0;
        score += self.sharpe_ratio.clamp(0.0, 3.0) * 0.2 * 33.0;
        score += self.profit_factor.min(5.0) * 0.1 * 20.0;
        score += (self.total_trades as f64 / 100.0).min(1.0) * 0.1 * 100.0;
        score
    }

    /// Whether the account meets the minimum bar to be copied at all.
    pub fn meets_copy_criteria(&self, min_win_rate: f64, min_trades: u32) -> bool {
        self.win_rate >= min_win_rate && self.total_trades >= min_trades
    }
}

impl Default for AccountMetrics {
    fn default() -> Self {
        Self::new(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn copy_criteria() {
        let mut m = AccountMetrics::new("0xabc".to_string());
        m.win_rate = 0.65;
        m.total_trades = 60;
        m.total_pnl = dec!(1500);

        assert!(m.meets_copy_criteria(0.6, 50));
        assert!(!m.meets_copy_criteria(0.7, 50));
        assert!(!m.meets_copy_criteria(0.6, 100));
    }

    #[test]
    fn score_is_bounded_by_caps() {
        let mut m = AccountMetrics::new("0xabc".to_string());
        m.win_rate = 1.0;
        m.roi = 10.0;
        m.sharpe_ratio = 9.0;
        m.profit_factor = 50.0;
        m.total_trades = 1000;

        // 30 + 30 + 19.8 + 10 + 10
        assert!((m.score() - 99.8).abs() < 1e-9);
    }
}
