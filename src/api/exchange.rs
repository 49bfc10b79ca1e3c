//! Hyperliquid exchange client for order placement.
//!
//! Write operations go to the `/exchange` endpoint as a JSON action signed
//! with an EIP-712 agent signature: the action bytes and nonce are hashed
//! into a connection id, and the wallet signs an `Agent` struct over that id
//! under the exchange's fixed signing domain (chain id 1337, zero
//! verifying contract).
//!
//! Market orders do not exist as a native type; they are sent as aggressive
//! IOC limit orders at the mid price padded with slippage, which is how the
//! official frontend does it as well.

use std::collections::HashMap;
use std::str::FromStr;

use alloy_primitives::{keccak256, Address, U256};
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::api::info_client::InfoClient;
use crate::models::Side;

/// Slippage padding applied to market orders, as a fraction of mid.
const MARKET_SLIPPAGE: Decimal = dec!(0.005);

/// Outcome of an order placement.
#[derive(Debug, Clone)]
pub struct OrderResult {
    /// "resting", "filled", or an exchange status string
    pub status: String,
    /// Exchange order id when the exchange reported one
    pub oid: Option<u64>,
}

/// Signed-order client for the Hyperliquid `/exchange` endpoint.
pub struct ExchangeClient {
    http: Client,
    signer: PrivateKeySigner,
    info: InfoClient,
    base_url: String,
    /// Coin name to asset index, from the exchange meta. Filled lazily.
    asset_indices: RwLock<HashMap<String, u32>>,
}

impl ExchangeClient {
    pub fn new(private_key: &str, base_url: &str) -> Result<Self> {
        let pk = private_key.strip_prefix("0x").unwrap_or(private_key);
        let signer = PrivateKeySigner::from_str(pk).context("Invalid private key")?;

        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            signer,
            info: InfoClient::new(base_url)?,
            base_url: base_url.to_string(),
            asset_indices: RwLock::new(HashMap::new()),
        })
    }

    /// The wallet address orders are placed from.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Asset index for a coin, resolved from the exchange meta and cached.
    async fn asset_index(&self, coin: &str) -> Result<u32> {
        if let Some(&idx) = self.asset_indices.read().await.get(coin) {
            return Ok(idx);
        }

        let meta = self.info.get_meta().await?;
        let mut indices = self.asset_indices.write().await;
        for (i, asset) in meta.universe.iter().enumerate() {
            indices.insert(asset.name.clone(), i as u32);
        }
        indices
            .get(coin)
            .copied()
            .ok_or_else(|| anyhow!("Unknown coin: {}", coin))
    }

    /// Place a crossing order: an IOC limit at mid padded by 0.5% toward
    /// the taker side.
    pub async fn market_order(
        &self,
        coin: &str,
        side: Side,
        size: Decimal,
        reduce_only: bool,
    ) -> Result<OrderResult> {
        let mids = self.info.get_all_mids().await?;
        let mid = mids
            .get(coin)
            .copied()
            .ok_or_else(|| anyhow!("No mid price for {}", coin))?;

        let price = if side.is_buy() {
            mid * (Decimal::ONE + MARKET_SLIPPAGE)
        } else {
            mid * (Decimal::ONE - MARKET_SLIPPAGE)
        };

        self.place_order(coin, side, size, price, "Ioc", reduce_only)
            .await
    }

    /// Place a resting good-til-cancelled limit order.
    pub async fn limit_order(
        &self,
        coin: &str,
        side: Side,
        size: Decimal,
        price: Decimal,
        reduce_only: bool,
    ) -> Result<OrderResult> {
        self.place_order(coin, side, size, price, "Gtc", reduce_only)
            .await
    }

    async fn place_order(
        &self,
        coin: &str,
        side: Side,
        size: Decimal,
        price: Decimal,
        tif: &str,
        reduce_only: bool,
    ) -> Result<OrderResult> {
        let asset = self.asset_index(coin).await?;

        let action = json!({
            "type": "order",
            "orders": [{
                "a": asset,
                "b": side.is_buy(),
                "p": Self::format_decimal(price),
                "s": Self::format_decimal(size),
                "r": reduce_only,
                "t": {"limit": {"tif": tif}},
            }],
            "grouping": "na",
        });

        let nonce = chrono::Utc::now().timestamp_millis() as u64;
        let signature = self.sign_action(&action, nonce).await?;

        let payload = json!({
            "action": action,
            "nonce": nonce,
            "signature": signature,
        });

        debug!(coin, asset, %price, %size, tif, "submitting order");

        let url = format!("{}/exchange", self.base_url);
        let resp = self.http.post(&url).json(&payload).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("Order placement failed: {} - {}", status, text));
        }

        let body: Value = resp.json().await.context("Failed to parse order response")?;
        Self::parse_order_response(&body)
    }

    /// Pull the per-order status out of the exchange response envelope.
    /// Shape: {"status":"ok","response":{"data":{"statuses":[...]}}}.
    fn parse_order_response(body: &Value) -> Result<OrderResult> {
        if body.get("status").and_then(Value::as_str) != Some("ok") {
            return Err(anyhow!("Exchange rejected order: {}", body));
        }

        let status = body
            .pointer("/response/data/statuses/0")
            .cloned()
            .unwrap_or(Value::Null);

        if let Some(err) = status.get("error").and_then(Value::as_str) {
            return Err(anyhow!("Order error: {}", err));
        }
        if let Some(resting) = status.get("resting") {
            return Ok(OrderResult {
                status: "resting".to_string(),
                oid: resting.get("oid").and_then(Value::as_u64),
            });
        }
        if let Some(filled) = status.get("filled") {
            return Ok(OrderResult {
                status: "filled".to_string(),
                oid: filled.get("oid").and_then(Value::as_u64),
            });
        }

        warn!(%body, "unrecognized order response shape");
        Ok(OrderResult {
            status: "unknown".to_string(),
            oid: None,
        })
    }

    /// Sign an action with an EIP-712 agent signature.
    async fn sign_action(&self, action: &Value, nonce: u64) -> Result<Value> {
        // connectionId = keccak256(action_bytes ++ nonce_be ++ 0x00)
        let mut data = serde_json::to_vec(action)?;
        data.extend_from_slice(&nonce.to_be_bytes());
        data.push(0x00);
        let connection_id = keccak256(&data);

        let struct_hash = {
            let type_hash = keccak256(b"Agent(string source,bytes32 connectionId)");
            let source_hash = keccak256(b"a");
            let mut encoded = Vec::with_capacity(96);
            encoded.extend_from_slice(type_hash.as_slice());
            encoded.extend_from_slice(source_hash.as_slice());
            encoded.extend_from_slice(connection_id.as_slice());
            keccak256(&encoded)
        };

        let domain_hash = Self::domain_separator()?;

        let mut message = vec![0x19, 0x01];
        message.extend_from_slice(domain_hash.as_slice());
        message.extend_from_slice(struct_hash.as_slice());
        let final_hash = keccak256(&message);

        let signature = self
            .signer
            .sign_hash(&final_hash)
            .await
            .context("Failed to sign action")?;

        let bytes = signature.as_bytes();
        // The recovery byte may arrive as 0/1 or already offset to 27/28.
        let v = match bytes[64] as u64 {
            v @ 0..=1 => v + 27,
            v => v,
        };
        Ok(json!({
            "r": format!("0x{}", hex::encode(&bytes[..32])),
            "s": format!("0x{}", hex::encode(&bytes[32..64])),
            "v": v,
        }))
    }

    /// Domain separator for the fixed exchange signing domain.
    fn domain_separator() -> Result<[u8; 32]> {
        let type_hash = keccak256(
            b"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)",
        );
        let name_hash = keccak256(b"Exchange");
        let version_hash = keccak256(b"1");

        let mut encoded = Vec::new();
        encoded.extend_from_slice(type_hash.as_slice());
        encoded.extend_from_slice(name_hash.as_slice());
        encoded.extend_from_slice(version_hash.as_slice());
        encoded.extend_from_slice(&U256::from(1337u64).to_be_bytes::<32>());
        encoded.extend_from_slice(&Self::encode_address(Address::ZERO));

        Ok(keccak256(&encoded).0)
    }

    fn encode_address(addr: Address) -> [u8; 32] {
        let mut buf = [0u8; 32];
        buf[12..].copy_from_slice(addr.as_slice());
        buf
    }

    /// Numbers go on the wire as strings without trailing zeros.
    fn format_decimal(value: Decimal) -> String {
        value.normalize().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_decimal_strips_trailing_zeros() {
        assert_eq!(ExchangeClient::format_decimal(dec!(1.5000)), "1.5");
        assert_eq!(ExchangeClient::format_decimal(dec!(100)), "100");
        assert_eq!(ExchangeClient::format_decimal(dec!(0.001)), "0.001");
    }

    #[test]
    fn encode_address_left_pads() {
        let encoded = ExchangeClient::encode_address(Address::ZERO);
        assert!(encoded.iter().all(|&b| b == 0));
    }

    #[test]
    fn filled_response_carries_the_oid() {
        let body = json!({
            "status": "ok",
            "response": {"data": {"statuses": [{"filled": {"oid": 77, "totalSz": "1.0", "avgPx": "100.0"}}]}}
        });
        let result = ExchangeClient::parse_order_response(&body).unwrap();
        assert_eq!(result.status, "filled");
        assert_eq!(result.oid, Some(77));
    }

    #[test]
    fn error_status_is_surfaced() {
        let body = json!({
            "status": "ok",
            "response": {"data": {"statuses": [{"error": "Insufficient margin"}]}}
        });
        assert!(ExchangeClient::parse_order_response(&body).is_err());
    }
}
