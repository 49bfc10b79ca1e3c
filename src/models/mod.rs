//! Data models for fills, positions, open orders, and account metrics.

mod fill;
mod metrics;
mod order;
mod position;

pub use fill::{Fill, Side};
pub use metrics::AccountMetrics;
pub use order::OpenOrder;
pub use position::PerpPosition;
