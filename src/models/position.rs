//! Position model for a signed perpetual holding.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An account's current holding in one instrument.
///
/// Size is signed: positive = long, negative = short. A coin with no entry
/// in the snapshot map is flat. Snapshots are replaced wholesale each poll,
/// never mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerpPosition {
    /// Instrument symbol
    pub coin: String,

    /// Signed position size in coin units
    pub size: Decimal,

    /// Average entry price
    pub entry_price: Decimal,

    /// Unrealized PnL in USD
    pub unrealized_pnl: Decimal,

    /// Leverage in use
    pub leverage: Decimal,
}

impl PerpPosition {
    pub fn is_long(&self) -> bool {
        self.size > Decimal::ZERO
    }

    pub fn is_short(&self) -> bool {
        self.size < Decimal::ZERO
    }

    /// Unsigned position size.
    pub fn abs_size(&self) -> Decimal {
        self.size.abs()
    }

    /// Notional value at the given price.
    pub fn notional(&self, price: Decimal) -> Decimal {
        self.abs_size() * price
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn signed_size_helpers() {
        let long = PerpPosition {
            coin: "BTC".to_string(),
            size: dec!(0.2),
            entry_price: dec!(60000),
            unrealized_pnl: Decimal::ZERO,
            leverage: dec!(5),
        };
        assert!(long.is_long());
        assert_eq!(long.notional(dec!(60000)), dec!(12000));

        let short = PerpPosition { size: dec!(-0.2), ..long };
        assert!(short.is_short());
        assert_eq!(short.abs_size(), dec!(0.2));
    }
}
