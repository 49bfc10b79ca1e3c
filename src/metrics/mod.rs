//! Performance metrics calculation for tracked accounts.

mod calculator;

pub use calculator::MetricsCalculator;
