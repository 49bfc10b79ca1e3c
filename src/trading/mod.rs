//! Copy-trading logic: fill classification, seen-fill tracking, intent
//! sizing, limit-order triage, and the polling worker that drives them.

mod classifier;
mod config;
mod ledger;
mod sizer;
mod triage;
mod worker;

pub use classifier::{classify, ActionKind, ClassifiedAction, Direction};
pub use config::{AllocationMode, CopyConfig, WorkerConfig};
pub use ledger::SeenFillLedger;
pub use sizer::{IntentSizer, OrderIntent, OrderKind};
pub use triage::{triage_new_orders, OrderDisposition};
pub use worker::CopyWorker;
