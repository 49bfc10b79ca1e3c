//! Copy-trade and worker configuration.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How a copy config's allocation scales mirrored trades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocationMode {
    /// Fixed capital amount, scaled by trade significance
    Fixed,
    /// Mirror the trader's fractional account commitment
    Percentage,
}

impl AllocationMode {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "percentage" | "pct" => Self::Percentage,
            _ => Self::Fixed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Percentage => "percentage",
        }
    }
}

/// Configuration for copying one trader. Treated as an immutable parameter
/// bundle for the duration of a polling cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyConfig {
    /// Row id in the copy_configs table
    pub id: i64,

    /// Followed trader's wallet address
    pub trader_address: String,

    /// Optional display name
    pub trader_name: Option<String>,

    /// Capital allocated to mirroring this trader, in USD
    pub allocation: Decimal,

    /// Fixed or percentage allocation
    pub mode: AllocationMode,

    /// Hard cap on any single mirrored position's notional, in USD
    pub max_position: Decimal,

    /// Whether the config is live at all
    pub is_active: bool,

    /// Temporarily suspended without being stopped
    pub is_paused: bool,
}

impl CopyConfig {
    pub fn display_name(&self) -> String {
        match &self.trader_name {
            Some(name) if !name.is_empty() => name.clone(),
            _ if self.trader_address.chars().count() > 12 => {
                let head: String = self.trader_address.chars().take(12).collect();
                format!("{}...", head)
            }
            _ => self.trader_address.clone(),
        }
    }
}

/// Runtime configuration for the polling worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Seconds between polling ticks
    pub poll_interval_secs: u64,

    /// How far back each tick's fill fetch reaches, in seconds
    pub fill_window_secs: i64,

    /// Lookback used when a trader is first initialized; fills inside it
    /// are marked seen without generating intents
    pub init_lookback_secs: i64,

    /// Seen-fill ledger cap per trader
    pub ledger_cap: usize,

    /// Re-read active configs from the database every N ticks
    pub config_refresh_ticks: u64,

    /// Log a heartbeat every N ticks
    pub heartbeat_ticks: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 3,
            fill_window_secs: 120,
            init_lookback_secs: 3600,
            ledger_cap: 500,
            config_refresh_ticks: 20,
            heartbeat_ticks: 40,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn config() -> CopyConfig {
        CopyConfig {
            id: 1,
            trader_address: "0xabcdef0123456789abcdef0123456789abcdef01".to_string(),
            trader_name: None,
            allocation: dec!(100),
            mode: AllocationMode::Fixed,
            max_position: dec!(1000),
            is_active: true,
            is_paused: false,
        }
    }

    #[test]
    fn allocation_mode_parses_loosely() {
        assert_eq!(AllocationMode::from_str("percentage"), AllocationMode::Percentage);
        assert_eq!(AllocationMode::from_str("PCT"), AllocationMode::Percentage);
        assert_eq!(AllocationMode::from_str("fixed"), AllocationMode::Fixed);
        assert_eq!(AllocationMode::from_str("anything"), AllocationMode::Fixed);
    }

    #[test]
    fn display_name_falls_back_to_short_address() {
        let mut cfg = config();
        assert_eq!(cfg.display_name(), "0xabcdef0123...");

        cfg.trader_name = Some("whale".to_string());
        assert_eq!(cfg.display_name(), "whale");
    }
}
