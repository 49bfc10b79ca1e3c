//! Open-order model for a trader's resting limit orders.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::fill::Side;

/// A resting order in a trader's open-order snapshot.
///
/// Identity is the exchange-assigned `oid`, not the (coin, price) slot: a
/// replaced order shows up under a new id. Orders appear when placed and
/// vanish when filled or cancelled; the worker detects both purely by set
/// difference between consecutive polls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenOrder {
    /// Exchange-assigned order id
    pub oid: u64,

    /// Instrument symbol
    pub coin: String,

    /// Order side
    pub side: Side,

    /// Limit price
    pub price: Decimal,

    /// Remaining size in coin units
    pub size: Decimal,

    /// Exchange order-kind tag ("Limit", "Stop Market", ...)
    #[serde(default)]
    pub order_type: String,

    /// Whether the order can only reduce an existing position
    #[serde(default)]
    pub reduce_only: bool,
}

impl OpenOrder {
    /// Notional value of the resting order.
    pub fn notional(&self) -> Decimal {
        self.size * self.price
    }
}
