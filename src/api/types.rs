//! Wire types for the Hyperliquid info API and the stats leaderboard.
//!
//! Numeric quantities arrive as JSON strings (`"szi": "1.5"`); `Decimal`'s
//! serde impl accepts both strings and numbers, so fields are typed plainly.

use rust_decimal::Decimal;
use serde::Deserialize;

/// Response to `{"type":"clearinghouseState","user":...}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearinghouseState {
    #[serde(default)]
    pub asset_positions: Vec<AssetPosition>,
    pub margin_summary: Option<MarginSummary>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetPosition {
    pub position: RawPosition,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPosition {
    pub coin: String,
    /// Signed size; positive = long, negative = short
    pub szi: Decimal,
    #[serde(default)]
    pub entry_px: Option<Decimal>,
    #[serde(default)]
    pub unrealized_pnl: Decimal,
    #[serde(default)]
    pub leverage: Option<RawLeverage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawLeverage {
    #[serde(default)]
    pub value: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarginSummary {
    #[serde(default)]
    pub account_value: Decimal,
}

/// One entry of the `{"type":"openOrders","user":...}` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawOpenOrder {
    pub oid: u64,
    pub coin: String,
    /// "B" = buy, "A" = sell
    pub side: String,
    pub limit_px: Decimal,
    pub sz: Decimal,
    #[serde(default)]
    pub order_type: String,
    #[serde(default)]
    pub reduce_only: bool,
}

/// One entry of the `{"type":"userFills","user":...}` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFill {
    pub tid: u64,
    pub coin: String,
    /// "B" = buy, "A" = sell
    pub side: String,
    pub px: Decimal,
    pub sz: Decimal,
    /// Unix milliseconds
    pub time: i64,
    #[serde(default)]
    pub closed_pnl: Decimal,
    #[serde(default)]
    pub dir: String,
}

/// Response to `{"type":"meta"}`: the perp asset universe. The position of
/// a coin in `universe` is its asset index for exchange actions.
#[derive(Debug, Clone, Deserialize)]
pub struct Meta {
    pub universe: Vec<AssetMeta>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetMeta {
    pub name: String,
    #[serde(default)]
    pub sz_decimals: u32,
}

/// Response body of the stats leaderboard endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardResponse {
    pub leaderboard_rows: Vec<LeaderboardRow>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardRow {
    pub eth_address: String,
    #[serde(default)]
    pub account_value: Decimal,
    #[serde(default)]
    pub display_name: Option<String>,
    /// Pairs of (window name, performance): "day", "week", "month", "allTime"
    #[serde(default)]
    pub window_performances: Vec<(String, WindowPerformance)>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WindowPerformance {
    #[serde(default)]
    pub pnl: Decimal,
    #[serde(default)]
    pub roi: Decimal,
    #[serde(default)]
    pub vlm: Decimal,
}

impl LeaderboardRow {
    /// Look up the performance for a named window, if present.
    pub fn window(&self, name: &str) -> Option<&WindowPerformance> {
        self.window_performances
            .iter()
            .find(|(w, _)| w == name)
            .map(|(_, p)| p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_clearinghouse_state() {
        let raw = r#"{
            "assetPositions": [
                {"position": {"coin": "ETH", "szi": "-2.5", "entryPx": "1900.1",
                 "unrealizedPnl": "-12.5", "leverage": {"type": "cross", "value": 10}}}
            ],
            "marginSummary": {"accountValue": "5432.1"}
        }"#;

        let state: ClearinghouseState = serde_json::from_str(raw).unwrap();
        assert_eq!(state.asset_positions.len(), 1);
        let pos = &state.asset_positions[0].position;
        assert_eq!(pos.coin, "ETH");
        assert!(pos.szi.is_sign_negative());
        assert_eq!(state.margin_summary.unwrap().account_value.to_string(), "5432.1");
    }

    #[test]
    fn parses_fill_and_order() {
        let raw = r#"{"tid": 42, "coin": "BTC", "side": "B", "px": "60000.0",
                      "sz": "0.01", "time": 1700000000000, "closedPnl": "0.0",
                      "dir": "Open Long"}"#;
        let fill: RawFill = serde_json::from_str(raw).unwrap();
        assert_eq!(fill.tid, 42);
        assert_eq!(fill.side, "B");

        let raw = r#"{"oid": 7, "coin": "BTC", "side": "A", "limitPx": "65000",
                      "sz": "0.01", "reduceOnly": true}"#;
        let order: RawOpenOrder = serde_json::from_str(raw).unwrap();
        assert!(order.reduce_only);
        assert!(order.order_type.is_empty());
    }

    #[test]
    fn parses_leaderboard_windows() {
        let raw = r#"{
            "leaderboardRows": [
                {"ethAddress": "0xabc", "accountValue": "100000",
                 "displayName": null,
                 "windowPerformances": [
                    ["day", {"pnl": "120.5", "roi": "0.01", "vlm": "5000"}],
                    ["allTime", {"pnl": "9000", "roi": "0.9", "vlm": "1000000"}]
                 ]}
            ]
        }"#;

        let resp: LeaderboardResponse = serde_json::from_str(raw).unwrap();
        let row = &resp.leaderboard_rows[0];
        assert!(row.window("day").is_some());
        assert!(row.window("month").is_none());
        assert_eq!(row.window("allTime").unwrap().pnl.to_string(), "9000");
    }
}
