//! Polling worker: the orchestration loop that watches followed traders
//! and mirrors their position changes.
//!
//! Each tick fetches a fresh snapshot (positions, open orders, account
//! value) and the recent fills for every followed trader, turns unseen
//! fills into sized order intents, triages newly appeared resting orders,
//! then replaces the stored snapshot wholesale. One trader failing never
//! stops the others.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::api::{ExecutionClient, FillBatch, InfoClient};
use crate::db::Database;
use crate::models::{OpenOrder, PerpPosition};
use crate::trading::{
    classify, triage_new_orders, ActionKind, ClassifiedAction, CopyConfig, IntentSizer,
    OrderDisposition, OrderIntent, SeenFillLedger, WorkerConfig,
};

/// Last known snapshot for one followed trader. Replaced wholesale every
/// tick; never patched incrementally.
#[derive(Debug, Default)]
struct TraderState {
    positions: HashMap<String, PerpPosition>,
    orders: HashMap<u64, OpenOrder>,
}

/// A classified fill together with the intents sized from it.
#[derive(Debug)]
pub(crate) struct PlannedTrade {
    pub action: ClassifiedAction,
    pub intents: Vec<OrderIntent>,
}

/// Classify and size every unseen fill against the snapshot pair.
///
/// Every fill is marked seen here, including ones that produce no intents
/// and ones the decoder could not read, so a fill is never considered twice
/// even when sizing or decoding skips it.
pub(crate) fn plan_fill_intents(
    sizer: &IntentSizer,
    ledger: &mut SeenFillLedger,
    config: &CopyConfig,
    batch: &FillBatch,
    prev_positions: &HashMap<String, PerpPosition>,
    curr_positions: &HashMap<String, PerpPosition>,
    our_positions: &HashMap<String, PerpPosition>,
    account_value: Decimal,
) -> Vec<PlannedTrade> {
    let mut planned = Vec::new();

    for &tid in &batch.malformed {
        if ledger.mark_seen(&config.trader_address, tid) {
            debug!(
                trader = %config.trader_address,
                fill_id = tid,
                "Undecodable fill marked seen"
            );
        }
    }

    for fill in &batch.fills {
        if !ledger.mark_seen(&config.trader_address, fill.id) {
            continue;
        }

        let prev_size = prev_positions
            .get(&fill.coin)
            .map(|p| p.size)
            .unwrap_or(Decimal::ZERO);
        let curr_size = curr_positions
            .get(&fill.coin)
            .map(|p| p.size)
            .unwrap_or(Decimal::ZERO);

        let action = classify(fill, prev_size, curr_size);
        if action.kind == ActionKind::Unknown {
            warn!(
                trader = %config.trader_address,
                coin = %action.coin,
                fill_id = fill.id,
                "Fill does not match any position change, skipping"
            );
            planned.push(PlannedTrade { action, intents: Vec::new() });
            continue;
        }

        let intents = sizer.intents_for_action(
            config,
            &action,
            our_positions.get(&action.coin),
            account_value,
        );
        planned.push(PlannedTrade { action, intents });
    }

    planned
}

/// Size limit mirrors for resting orders that triage as genuine entries.
pub(crate) fn plan_order_intents(
    sizer: &IntentSizer,
    config: &CopyConfig,
    prev_orders: &HashMap<u64, OpenOrder>,
    curr_orders: &HashMap<u64, OpenOrder>,
    curr_positions: &HashMap<String, PerpPosition>,
    account_value: Decimal,
) -> Vec<OrderIntent> {
    triage_new_orders(prev_orders, curr_orders, curr_positions)
        .into_iter()
        .filter_map(|(order, disposition)| match disposition {
            OrderDisposition::EntryCandidate => {
                sizer.intent_for_order(config, &order, account_value)
            }
            OrderDisposition::Protective => {
                debug!(
                    trader = %config.trader_address,
                    oid = order.oid,
                    coin = %order.coin,
                    "New order protects an existing position, not mirroring"
                );
                None
            }
        })
        .collect()
}

/// The polling worker.
pub struct CopyWorker {
    info: InfoClient,
    db: Database,
    execution: Arc<dyn ExecutionClient>,
    sizer: IntentSizer,
    config: WorkerConfig,

    configs: Vec<CopyConfig>,
    states: HashMap<String, TraderState>,
    ledger: SeenFillLedger,

    /// Our own wallet, polled for positions so closes can be bounded.
    our_address: Option<String>,
    our_positions: HashMap<String, PerpPosition>,

    shutdown: Arc<AtomicBool>,
}

impl CopyWorker {
    pub fn new(
        info: InfoClient,
        db: Database,
        execution: Arc<dyn ExecutionClient>,
        config: WorkerConfig,
        our_address: Option<String>,
    ) -> Self {
        let ledger = SeenFillLedger::new(config.ledger_cap);
        Self {
            info,
            db,
            execution,
            sizer: IntentSizer::default(),
            config,
            configs: Vec::new(),
            states: HashMap::new(),
            ledger,
            our_address,
            our_positions: HashMap::new(),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get shutdown signal for external control.
    pub fn shutdown_signal(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Main run loop.
    pub async fn run(&mut self) -> Result<()> {
        self.refresh_configs().await?;

        info!(
            traders = self.configs.len(),
            live = self.execution.is_live(),
            poll_interval = self.config.poll_interval_secs,
            "Starting copy worker"
        );

        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutdown signal received");
            shutdown.store(true, Ordering::SeqCst);
        });

        let mut poll_interval = interval(Duration::from_secs(self.config.poll_interval_secs));
        let mut tick: u64 = 0;

        while !self.shutdown.load(Ordering::SeqCst) {
            poll_interval.tick().await;
            tick += 1;

            if tick % self.config.config_refresh_ticks == 0 {
                if let Err(e) = self.refresh_configs().await {
                    error!(error = %e, "Failed to refresh copy configs");
                }
            }

            if self.configs.is_empty() {
                if tick % self.config.heartbeat_ticks == 1 {
                    info!("No active copy configs; add one with the follow command");
                }
                continue;
            }

            if tick % self.config.heartbeat_ticks == 0 {
                info!(tick, traders = self.configs.len(), "Copy worker heartbeat");
            }

            if let Err(e) = self.refresh_our_positions().await {
                warn!(error = %e, "Failed to refresh our positions");
            }

            let configs = self.configs.clone();
            for config in &configs {
                if let Err(e) = self.monitor_trader(config).await {
                    error!(
                        trader = %config.trader_address,
                        error = %e,
                        "Error monitoring trader"
                    );
                }
            }
        }

        info!("Copy worker stopped");
        Ok(())
    }

    /// Re-read active configs and initialize any newly followed trader.
    async fn refresh_configs(&mut self) -> Result<()> {
        let configs = self.db.get_active_configs().await?;

        for config in &configs {
            if !self.states.contains_key(&config.trader_address) {
                if let Err(e) = self.initialize_trader(config).await {
                    error!(
                        trader = %config.trader_address,
                        error = %e,
                        "Failed to initialize trader"
                    );
                }
            }
        }

        // Forget traders that are no longer followed.
        self.states
            .retain(|addr, _| configs.iter().any(|c| &c.trader_address == addr));

        self.configs = configs;
        Ok(())
    }

    /// First contact with a trader: take a baseline snapshot and mark every
    /// fill inside the lookback window as seen without generating intents.
    /// Only changes after this point get copied.
    async fn initialize_trader(&mut self, config: &CopyConfig) -> Result<()> {
        let trader = &config.trader_address;
        info!(trader = %trader, name = %config.display_name(), "Initializing trader");

        let persisted = self.db.load_seen_fills(trader).await.unwrap_or_default();
        if !persisted.is_empty() {
            debug!(trader = %trader, count = persisted.len(), "Restored seen-fill ledger");
            self.ledger.restore(trader, persisted);
        }

        let state = self.info.get_user_state(trader).await?;
        let orders = self.info.get_open_orders(trader).await?;

        let lookback_start = Utc::now().timestamp_millis() - self.config.init_lookback_secs * 1000;
        let batch = self.info.get_fills_since(trader, lookback_start).await?;
        let fill_count = batch.fills.len();
        self.ledger.mark_all(
            trader,
            batch
                .fills
                .iter()
                .map(|f| f.id)
                .chain(batch.malformed.iter().copied()),
        );

        self.states.insert(
            trader.clone(),
            TraderState {
                positions: state.positions,
                orders,
            },
        );

        self.db
            .save_seen_fills(trader, &self.ledger.ids(trader))
            .await?;

        info!(
            trader = %trader,
            baseline_fills = fill_count,
            "Trader initialized, copying changes from now on"
        );
        Ok(())
    }

    /// One polling pass over a single trader.
    async fn monitor_trader(&mut self, config: &CopyConfig) -> Result<()> {
        let trader = &config.trader_address;

        if !self.states.contains_key(trader) {
            // Initialization failed earlier; try again rather than copying
            // against a missing baseline.
            return self.initialize_trader(config).await;
        }

        let window_start = Utc::now().timestamp_millis() - self.config.fill_window_secs * 1000;
        let (state, orders, batch) = futures::try_join!(
            self.info.get_user_state(trader),
            self.info.get_open_orders(trader),
            self.info.get_fills_since(trader, window_start),
        )
        .context("Failed to fetch trader snapshot")?;

        let prev = self.states.get(trader).expect("state checked above");

        let planned = plan_fill_intents(
            &self.sizer,
            &mut self.ledger,
            config,
            &batch,
            &prev.positions,
            &state.positions,
            &self.our_positions,
            state.account_value,
        );

        let order_intents = plan_order_intents(
            &self.sizer,
            config,
            &prev.orders,
            &orders,
            &state.positions,
            state.account_value,
        );

        // Snapshot replaced wholesale before any execution, so a failed
        // submission cannot make the next tick re-derive the same action.
        self.states.insert(
            trader.clone(),
            TraderState {
                positions: state.positions,
                orders,
            },
        );

        if config.is_paused {
            if !planned.is_empty() || !order_intents.is_empty() {
                debug!(trader = %trader, "Config paused, observed changes not copied");
            }
        } else {
            for trade in &planned {
                self.execute_planned_trade(config, trade).await;
            }
            for intent in &order_intents {
                self.submit_intent(config, intent, 0, "order_mirror").await;
            }
        }

        self.ledger.trim(trader, self.config.ledger_cap);
        self.db
            .save_seen_fills(trader, &self.ledger.ids(trader))
            .await?;

        Ok(())
    }

    /// Submit the intents for one classified fill, recording each in the
    /// copied-trades log. An execution failure leaves the fill seen; the
    /// trade is not retried.
    async fn execute_planned_trade(&self, config: &CopyConfig, trade: &PlannedTrade) {
        let action = &trade.action;
        if trade.intents.is_empty() {
            return;
        }

        info!(
            trader = %config.trader_address,
            coin = %action.coin,
            action = action.kind.as_str(),
            direction = action.direction.as_str(),
            magnitude = %action.magnitude,
            intents = trade.intents.len(),
            "Copying position change"
        );

        for intent in &trade.intents {
            self.submit_intent(config, intent, action.fill.id, action.kind.as_str())
                .await;
        }

        // Fold realized PnL from the source fill into the config's rollup.
        if action.fill.is_closing() {
            if let Err(e) = self
                .db
                .update_copy_performance(
                    config.id,
                    config.allocation,
                    action.fill.closed_pnl.to_f64().unwrap_or(0.0),
                    action.fill.notional().to_f64().unwrap_or(0.0),
                )
                .await
            {
                warn!(error = %e, "Failed to update copy performance");
            }
        }
    }

    async fn submit_intent(
        &self,
        config: &CopyConfig,
        intent: &OrderIntent,
        source_fill_id: u64,
        action: &str,
    ) {
        let price = intent.limit_price.unwrap_or_default();
        let record = self
            .db
            .record_copied_trade(
                source_fill_id,
                &config.trader_address,
                &intent.coin,
                intent.side.as_str(),
                action,
                price,
                intent.size,
            )
            .await;

        let record_id = match record {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "Failed to record copied trade");
                String::new()
            }
        };

        match self.execution.submit(intent).await {
            Ok(receipt) => {
                info!(
                    coin = %intent.coin,
                    side = intent.side.as_str(),
                    size = %intent.size,
                    status = %receipt.status,
                    order_id = ?receipt.order_id,
                    "Order submitted"
                );
                if !record_id.is_empty() {
                    let status = if receipt.simulated { "simulated" } else { "executed" };
                    if let Err(e) = self
                        .db
                        .update_copied_trade_status(&record_id, status, None)
                        .await
                    {
                        warn!(error = %e, "Failed to update copied trade status");
                    }
                }
            }
            Err(e) => {
                error!(
                    coin = %intent.coin,
                    side = intent.side.as_str(),
                    error = %e,
                    "Order submission failed"
                );
                if !record_id.is_empty() {
                    if let Err(e2) = self
                        .db
                        .update_copied_trade_status(&record_id, "failed", Some(&e.to_string()))
                        .await
                    {
                        warn!(error = %e2, "Failed to update copied trade status");
                    }
                }
            }
        }
    }

    async fn refresh_our_positions(&mut self) -> Result<()> {
        if let Some(address) = &self.our_address {
            self.our_positions = self.info.get_positions(address).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Fill, Side};
    use crate::trading::{AllocationMode, OrderKind};
    use rust_decimal_macros::dec;

    fn config() -> CopyConfig {
        CopyConfig {
            id: 1,
            trader_address: "0xwhale".to_string(),
            trader_name: None,
            allocation: dec!(1000),
            mode: AllocationMode::Fixed,
            max_position: dec!(500),
            is_active: true,
            is_paused: false,
        }
    }

    fn fill(id: u64, coin: &str, side: Side, price: Decimal, size: Decimal) -> Fill {
        Fill {
            id,
            coin: coin.to_string(),
            side,
            price,
            size,
            time_ms: 1_700_000_000_000,
            closed_pnl: Decimal::ZERO,
            dir: String::new(),
        }
    }

    fn positions(list: Vec<(&str, Decimal)>) -> HashMap<String, PerpPosition> {
        list.into_iter()
            .map(|(coin, size)| {
                (
                    coin.to_string(),
                    PerpPosition {
                        coin: coin.to_string(),
                        size,
                        entry_price: dec!(100),
                        unrealized_pnl: Decimal::ZERO,
                        leverage: Decimal::ONE,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn flat_to_long_produces_one_market_buy() {
        let sizer = IntentSizer::default();
        let mut ledger = SeenFillLedger::new(500);
        let cfg = config();
        let batch = FillBatch {
            fills: vec![fill(1, "ETH", Side::Buy, dec!(100), dec!(10))],
            malformed: Vec::new(),
        };
        let prev = HashMap::new();
        let curr = positions(vec![("ETH", dec!(10))]);

        let planned = plan_fill_intents(
            &sizer,
            &mut ledger,
            &cfg,
            &batch,
            &prev,
            &curr,
            &HashMap::new(),
            Decimal::ZERO,
        );

        assert_eq!(planned.len(), 1);
        assert_eq!(planned[0].action.kind, ActionKind::Entry);
        assert_eq!(planned[0].intents.len(), 1);
        let intent = &planned[0].intents[0];
        assert_eq!(intent.side, Side::Buy);
        assert_eq!(intent.kind, OrderKind::Market);
        // Notional 1000: min(100, 200) = 100, at price 100 size is 1.
        assert_eq!(intent.size, dec!(1));
    }

    #[test]
    fn re_presented_fill_produces_nothing() {
        let sizer = IntentSizer::default();
        let mut ledger = SeenFillLedger::new(500);
        let cfg = config();
        let batch = FillBatch {
            fills: vec![fill(1, "ETH", Side::Buy, dec!(100), dec!(10))],
            malformed: Vec::new(),
        };
        let prev = HashMap::new();
        let curr = positions(vec![("ETH", dec!(10))]);

        let first = plan_fill_intents(
            &sizer, &mut ledger, &cfg, &batch, &prev, &curr, &HashMap::new(), Decimal::ZERO,
        );
        assert_eq!(first.len(), 1);

        // Same fill id arrives again on the next overlapping window.
        let second = plan_fill_intents(
            &sizer, &mut ledger, &cfg, &batch, &curr, &curr, &HashMap::new(), Decimal::ZERO,
        );
        assert!(second.is_empty());
    }

    #[test]
    fn unclassifiable_fill_is_marked_seen_without_intents() {
        let sizer = IntentSizer::default();
        let mut ledger = SeenFillLedger::new(500);
        let cfg = config();
        // Fill with no visible position change on either side.
        let batch = FillBatch {
            fills: vec![fill(7, "ETH", Side::Buy, dec!(100), dec!(1))],
            malformed: Vec::new(),
        };

        let planned = plan_fill_intents(
            &sizer,
            &mut ledger,
            &cfg,
            &batch,
            &HashMap::new(),
            &HashMap::new(),
            &HashMap::new(),
            Decimal::ZERO,
        );

        assert_eq!(planned.len(), 1);
        assert_eq!(planned[0].action.kind, ActionKind::Unknown);
        assert!(planned[0].intents.is_empty());
        assert!(ledger.has_seen("0xwhale", 7));
    }

    #[test]
    fn undecodable_fill_ids_are_marked_seen_once() {
        let sizer = IntentSizer::default();
        let mut ledger = SeenFillLedger::new(500);
        let cfg = config();
        // A record the decoder dropped arrives alongside a normal fill.
        let batch = FillBatch {
            fills: vec![fill(1, "ETH", Side::Buy, dec!(100), dec!(10))],
            malformed: vec![99],
        };
        let curr = positions(vec![("ETH", dec!(10))]);

        let planned = plan_fill_intents(
            &sizer,
            &mut ledger,
            &cfg,
            &batch,
            &HashMap::new(),
            &curr,
            &HashMap::new(),
            Decimal::ZERO,
        );

        assert_eq!(planned.len(), 1);
        assert!(ledger.has_seen("0xwhale", 99));

        // The same window re-presents the dropped id; nothing is replanned.
        let again = plan_fill_intents(
            &sizer,
            &mut ledger,
            &cfg,
            &batch,
            &curr,
            &curr,
            &HashMap::new(),
            Decimal::ZERO,
        );
        assert!(again.is_empty());
    }

    #[test]
    fn new_entry_order_is_mirrored_as_a_limit() {
        let sizer = IntentSizer::default();
        let cfg = config();
        let prev = HashMap::new();
        let mut curr = HashMap::new();
        curr.insert(
            5,
            OpenOrder {
                oid: 5,
                coin: "BTC".to_string(),
                side: Side::Buy,
                price: dec!(50000),
                size: dec!(0.1),
                order_type: "Limit".to_string(),
                reduce_only: false,
            },
        );

        let intents = plan_order_intents(
            &sizer,
            &cfg,
            &prev,
            &curr,
            &HashMap::new(),
            Decimal::ZERO,
        );
        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].kind, OrderKind::Limit);
        assert_eq!(intents[0].limit_price, Some(dec!(50000)));
    }

    #[test]
    fn protective_orders_are_not_mirrored() {
        let sizer = IntentSizer::default();
        let cfg = config();
        let mut curr = HashMap::new();
        // A sell resting against the trader's long.
        curr.insert(
            6,
            OpenOrder {
                oid: 6,
                coin: "ETH".to_string(),
                side: Side::Sell,
                price: dec!(120),
                size: dec!(10),
                order_type: "Limit".to_string(),
                reduce_only: false,
            },
        );
        let pos = positions(vec![("ETH", dec!(10))]);

        let intents =
            plan_order_intents(&sizer, &cfg, &HashMap::new(), &curr, &pos, Decimal::ZERO);
        assert!(intents.is_empty());
    }
}
