//! Hyperliquid info API client: the read-only snapshot source for tracked
//! trader positions, open orders, fills, and the stats leaderboard.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use backoff::ExponentialBackoff;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};

use crate::models::{Fill, OpenOrder, PerpPosition, Side};

use super::types::*;

pub const MAINNET_API_URL: &str = "https://api.hyperliquid.xyz";
pub const TESTNET_API_URL: &str = "https://api.hyperliquid-testnet.xyz";
const LEADERBOARD_URL: &str = "https://stats-data.hyperliquid.xyz/Mainnet/leaderboard";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Combined clearinghouse snapshot for one account: open positions keyed by
/// coin plus the account value used for proportional sizing.
#[derive(Debug, Clone, Default)]
pub struct UserState {
    pub positions: HashMap<String, PerpPosition>,
    pub account_value: Decimal,
}

/// One window of decoded fills plus the trade ids of records the decoder
/// dropped. Dropped ids still get marked seen by the caller so the same
/// record is not re-examined on every overlapping window.
#[derive(Debug, Default)]
pub struct FillBatch {
    pub fills: Vec<Fill>,
    pub malformed: Vec<u64>,
}

/// Client for the Hyperliquid info endpoint (read-only operations).
pub struct InfoClient {
    client: Client,
    base_url: String,
}

impl InfoClient {
    /// Create a client against the given base URL.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// POST a typed request to `/info`, retrying transient failures with
    /// exponential backoff before giving up for this tick.
    async fn info<T: DeserializeOwned>(&self, body: serde_json::Value) -> Result<T> {
        let url = format!("{}/info", self.base_url);

        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(15)),
            ..Default::default()
        };

        let response = backoff::future::retry(backoff, || async {
            debug!(url = %url, request = %body, "Posting info request");

            let resp = self
                .client
                .post(&url)
                .json(&body)
                .send()
                .await
                .map_err(|e| backoff::Error::transient(anyhow::Error::from(e)))?;

            if resp.status().is_server_error() {
                return Err(backoff::Error::transient(anyhow::anyhow!(
                    "Info request failed: {}",
                    resp.status()
                )));
            }
            if !resp.status().is_success() {
                let status = resp.status();
                let text = resp.text().await.unwrap_or_default();
                return Err(backoff::Error::permanent(anyhow::anyhow!(
                    "Info request failed: {} - {}",
                    status,
                    text
                )));
            }

            Ok(resp)
        })
        .await?;

        response.json().await.context("Failed to parse info response")
    }

    /// Fetch the clearinghouse state for an account: non-flat positions and
    /// the account value (zero when the margin summary is absent).
    pub async fn get_user_state(&self, address: &str) -> Result<UserState> {
        let state: ClearinghouseState = self
            .info(json!({"type": "clearinghouseState", "user": address}))
            .await
            .context("Failed to fetch clearinghouse state")?;

        let positions = state
            .asset_positions
            .into_iter()
            .filter(|p| !p.position.szi.is_zero())
            .map(|p| {
                let raw = p.position;
                let position = PerpPosition {
                    coin: raw.coin.clone(),
                    size: raw.szi,
                    entry_price: raw.entry_px.unwrap_or_default(),
                    unrealized_pnl: raw.unrealized_pnl,
                    leverage: raw.leverage.map(|l| l.value).unwrap_or(Decimal::ONE),
                };
                (raw.coin, position)
            })
            .collect();

        let account_value = state
            .margin_summary
            .map(|m| m.account_value)
            .unwrap_or_default();

        Ok(UserState { positions, account_value })
    }

    /// Fetch an account's current open positions, keyed by coin.
    pub async fn get_positions(&self, address: &str) -> Result<HashMap<String, PerpPosition>> {
        Ok(self.get_user_state(address).await?.positions)
    }

    /// Fetch an account's resting orders, keyed by exchange order id.
    pub async fn get_open_orders(&self, address: &str) -> Result<HashMap<u64, OpenOrder>> {
        let raw: Vec<RawOpenOrder> = self
            .info(json!({"type": "openOrders", "user": address}))
            .await
            .context("Failed to fetch open orders")?;

        let orders = raw
            .into_iter()
            .filter_map(|o| {
                let Some(side) = Side::from_code(&o.side) else {
                    warn!(oid = o.oid, side = %o.side, "Unknown order side");
                    return None;
                };
                Some((
                    o.oid,
                    OpenOrder {
                        oid: o.oid,
                        coin: o.coin,
                        side,
                        price: o.limit_px,
                        size: o.sz,
                        order_type: o.order_type,
                        reduce_only: o.reduce_only,
                    },
                ))
            })
            .collect();

        Ok(orders)
    }

    /// Fetch fills for an account since the given cutoff, ordered by time
    /// then trade id.
    pub async fn get_fills_since(&self, address: &str, start_time_ms: i64) -> Result<FillBatch> {
        let raw: Vec<RawFill> = self
            .info(json!({
                "type": "userFills",
                "user": address,
                "startTime": start_time_ms,
            }))
            .await
            .context("Failed to fetch user fills")?;

        let mut batch = FillBatch::default();
        for f in raw {
            let Some(side) = Side::from_code(&f.side) else {
                warn!(tid = f.tid, side = %f.side, "Unknown fill side");
                batch.malformed.push(f.tid);
                continue;
            };
            batch.fills.push(Fill {
                id: f.tid,
                coin: f.coin,
                side,
                price: f.px,
                size: f.sz,
                time_ms: f.time,
                closed_pnl: f.closed_pnl,
                dir: f.dir,
            });
        }

        batch.fills.sort_by_key(|f| (f.time_ms, f.id));
        Ok(batch)
    }

    /// Fetch current mid prices for all assets.
    pub async fn get_all_mids(&self) -> Result<HashMap<String, Decimal>> {
        self.info(json!({"type": "allMids"}))
            .await
            .context("Failed to fetch mid prices")
    }

    /// Fetch exchange metadata (the perp asset universe).
    pub async fn get_meta(&self) -> Result<Meta> {
        self.info(json!({"type": "meta"}))
            .await
            .context("Failed to fetch exchange meta")
    }

    /// Fetch the stats leaderboard (mainnet only, separate host).
    pub async fn get_leaderboard(&self) -> Result<Vec<LeaderboardRow>> {
        debug!(url = LEADERBOARD_URL, "Fetching leaderboard");

        let response = self
            .client
            .get(LEADERBOARD_URL)
            .send()
            .await
            .context("Failed to fetch leaderboard")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Leaderboard request failed: {} - {}", status, body);
        }

        let parsed: LeaderboardResponse = response
            .json()
            .await
            .context("Failed to parse leaderboard response")?;

        Ok(parsed.leaderboard_rows)
    }
}
