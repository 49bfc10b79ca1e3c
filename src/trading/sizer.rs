//! Order intent sizing.
//!
//! Translates a classified position change into zero, one, or two order
//! intents scaled to our own allocation. Sizing never errors: a trade too
//! small to bother with simply produces no intent.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use crate::models::{PerpPosition, Side};
use crate::trading::{ActionKind, AllocationMode, ClassifiedAction, CopyConfig, Direction};

/// Exchange minimum order notional, in USD.
pub const MIN_ORDER_NOTIONAL: Decimal = dec!(10);

/// Fraction of a fixed allocation committed per trade cap.
const FIXED_TRADE_FRACTION: Decimal = dec!(0.1);
const FIXED_ALLOCATION_FRACTION: Decimal = dec!(0.2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderKind {
    /// Crossing order filled immediately at the prevailing price
    Market,
    /// Resting order at a specific price
    Limit,
}

/// A sized, directional order the execution layer should place.
#[derive(Debug, Clone)]
pub struct OrderIntent {
    pub coin: String,
    pub side: Side,
    /// Size in coin units, always positive
    pub size: Decimal,
    pub kind: OrderKind,
    /// Set for limit intents only
    pub limit_price: Option<Decimal>,
    pub reduce_only: bool,
}

impl OrderIntent {
    fn market(coin: &str, side: Side, size: Decimal, reduce_only: bool) -> Self {
        Self {
            coin: coin.to_string(),
            side,
            size,
            kind: OrderKind::Market,
            limit_price: None,
            reduce_only,
        }
    }

    fn limit(coin: &str, side: Side, size: Decimal, price: Decimal) -> Self {
        Self {
            coin: coin.to_string(),
            side,
            size,
            kind: OrderKind::Limit,
            limit_price: Some(price),
            reduce_only: false,
        }
    }
}

/// Scales a followed trader's position changes down to our allocation.
#[derive(Debug, Clone)]
pub struct IntentSizer {
    min_notional: Decimal,
}

impl Default for IntentSizer {
    fn default() -> Self {
        Self {
            min_notional: MIN_ORDER_NOTIONAL,
        }
    }
}

impl IntentSizer {
    /// Our size in coin units for mirroring a trade of `magnitude` coins at
    /// `price`. Returns None when the scaled order would fall below the
    /// exchange minimum.
    ///
    /// Percentage mode mirrors the trader's fractional account commitment,
    /// which needs a positive account value; without one it degrades to the
    /// fixed formula.
    pub fn copy_size(
        &self,
        config: &CopyConfig,
        magnitude: Decimal,
        price: Decimal,
        account_value: Decimal,
    ) -> Option<Decimal> {
        if price <= Decimal::ZERO || magnitude <= Decimal::ZERO {
            return None;
        }
        let trade_notional = magnitude * price;

        let mut our_value =
            if config.mode == AllocationMode::Percentage && account_value > Decimal::ZERO {
                config.allocation * (trade_notional / account_value)
            } else {
                (trade_notional * FIXED_TRADE_FRACTION)
                    .min(config.allocation * FIXED_ALLOCATION_FRACTION)
            };

        if our_value > config.max_position {
            our_value = config.max_position;
        }

        if our_value < self.min_notional {
            debug!(
                coin_value = %our_value,
                min = %self.min_notional,
                "scaled order below exchange minimum, skipping"
            );
            return None;
        }

        Some(our_value / price)
    }

    /// Intents for a classified fill. `local_position` is our own position
    /// in the same coin, if any, and bounds closing sizes so we never close
    /// more than we hold.
    pub fn intents_for_action(
        &self,
        config: &CopyConfig,
        action: &ClassifiedAction,
        local_position: Option<&PerpPosition>,
        account_value: Decimal,
    ) -> Vec<OrderIntent> {
        let price = action.fill.price;
        match action.kind {
            ActionKind::Entry | ActionKind::Add => {
                let Some(side) = Self::opening_side(action.direction) else {
                    return Vec::new();
                };
                match self.copy_size(config, action.magnitude, price, account_value) {
                    Some(size) => vec![OrderIntent::market(&action.coin, side, size, false)],
                    None => Vec::new(),
                }
            }
            ActionKind::Exit | ActionKind::Reduce => {
                let Some(local) = local_position else {
                    return Vec::new();
                };
                match self.copy_size(config, action.magnitude, price, account_value) {
                    Some(size) => vec![Self::close_intent(local, size.min(local.abs_size()))],
                    None => Vec::new(),
                }
            }
            ActionKind::Flip => {
                // A flip whose opening leg is too small does nothing at all,
                // not even the close.
                let Some(side) = Self::opening_side(action.direction) else {
                    return Vec::new();
                };
                let Some(size) = self.copy_size(config, action.magnitude, price, account_value)
                else {
                    return Vec::new();
                };
                let mut intents = Vec::with_capacity(2);
                if let Some(local) = local_position {
                    intents.push(Self::close_intent(local, local.abs_size()));
                }
                intents.push(OrderIntent::market(&action.coin, side, size, false));
                intents
            }
            ActionKind::Unknown => Vec::new(),
        }
    }

    /// A resting-order mirror: same coin, same side, our scaled size, at the
    /// trader's own limit price.
    pub fn intent_for_order(
        &self,
        config: &CopyConfig,
        order: &crate::models::OpenOrder,
        account_value: Decimal,
    ) -> Option<OrderIntent> {
        let size = self.copy_size(config, order.size, order.price, account_value)?;
        Some(OrderIntent::limit(&order.coin, order.side, size, order.price))
    }

    fn opening_side(direction: Direction) -> Option<Side> {
        match direction {
            Direction::Long => Some(Side::Buy),
            Direction::Short => Some(Side::Sell),
            Direction::Unknown => None,
        }
    }

    /// Reduce-only market order against our own position.
    fn close_intent(local: &PerpPosition, size: Decimal) -> OrderIntent {
        let side = if local.is_long() { Side::Sell } else { Side::Buy };
        OrderIntent::market(&local.coin, side, size, true)
    }
}
