//! Hyperliquid API clients for data fetching and order execution.

mod exchange;
mod execution;
mod info_client;
mod types;

pub use exchange::ExchangeClient;
pub use execution::{ExecutionClient, LiveExecution, SimulatedExecution};
pub use info_client::{FillBatch, InfoClient, MAINNET_API_URL, TESTNET_API_URL};
