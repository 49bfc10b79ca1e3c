//! Execution seam between the copy worker and the exchange.
//!
//! The worker hands sized intents to an `ExecutionClient` and does not care
//! whether they reach the exchange or a log line. Simulation is the default
//! mode; live trading is opted into explicitly.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::Mutex;
use tracing::info;

use crate::api::exchange::ExchangeClient;
use crate::trading::{OrderIntent, OrderKind};

/// What happened to a submitted intent.
#[derive(Debug, Clone)]
pub struct ExecutionReceipt {
    pub order_id: Option<u64>,
    pub simulated: bool,
    pub status: String,
}

#[async_trait]
pub trait ExecutionClient: Send + Sync {
    async fn submit(&self, intent: &OrderIntent) -> Result<ExecutionReceipt>;

    fn is_live(&self) -> bool;
}

/// Logs intents instead of placing them, and keeps them for inspection.
#[derive(Debug, Default)]
pub struct SimulatedExecution {
    submitted: Mutex<Vec<OrderIntent>>,
}

impl SimulatedExecution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submitted(&self) -> Vec<OrderIntent> {
        self.submitted.lock().expect("submitted lock poisoned").clone()
    }
}

#[async_trait]
impl ExecutionClient for SimulatedExecution {
    async fn submit(&self, intent: &OrderIntent) -> Result<ExecutionReceipt> {
        let kind = match intent.kind {
            OrderKind::Market => "market".to_string(),
            OrderKind::Limit => format!(
                "limit @ {}",
                intent.limit_price.unwrap_or_default()
            ),
        };
        info!(
            coin = %intent.coin,
            side = intent.side.as_str(),
            size = %intent.size,
            reduce_only = intent.reduce_only,
            "[SIMULATED] {} order",
            kind
        );
        self.submitted
            .lock()
            .expect("submitted lock poisoned")
            .push(intent.clone());
        Ok(ExecutionReceipt {
            order_id: None,
            simulated: true,
            status: "simulated".to_string(),
        })
    }

    fn is_live(&self) -> bool {
        false
    }
}

/// Places intents on the exchange for real.
pub struct LiveExecution {
    exchange: ExchangeClient,
}

impl LiveExecution {
    pub fn new(exchange: ExchangeClient) -> Self {
        Self { exchange }
    }
}

#[async_trait]
impl ExecutionClient for LiveExecution {
    async fn submit(&self, intent: &OrderIntent) -> Result<ExecutionReceipt> {
        let result = match intent.kind {
            OrderKind::Market => {
                self.exchange
                    .market_order(&intent.coin, intent.side, intent.size, intent.reduce_only)
                    .await?
            }
            OrderKind::Limit => {
                let price = intent
                    .limit_price
                    .ok_or_else(|| anyhow!("Limit intent without a price"))?;
                self.exchange
                    .limit_order(&intent.coin, intent.side, intent.size, price, intent.reduce_only)
                    .await?
            }
        };
        Ok(ExecutionReceipt {
            order_id: result.oid,
            simulated: false,
            status: result.status,
        })
    }

    fn is_live(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Side;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn simulated_execution_records_intents() {
        let exec = SimulatedExecution::new();
        let intent = OrderIntent {
            coin: "ETH".to_string(),
            side: Side::Buy,
            size: dec!(1),
            kind: OrderKind::Market,
            limit_price: None,
            reduce_only: false,
        };

        let receipt = exec.submit(&intent).await.unwrap();
        assert!(receipt.simulated);
        assert!(receipt.order_id.is_none());
        assert_eq!(exec.submitted().len(), 1);
        assert!(!exec.is_live());
    }
}
