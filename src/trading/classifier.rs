//! Position-change classification.
//!
//! A fill on its own does not say what the trader actually did. Comparing
//! the signed position size before and after the polling window does: the
//! net delta tells us whether the fill opened, closed, grew, shrank, or
//! flipped the position. When several fills land on the same coin inside
//! one window the net delta collapses them into a single action, so a
//! reduce followed by a larger add reads as one add. That approximation is
//! accepted; the sizer only ever acts on net position change.

use rust_decimal::Decimal;

use crate::models::Fill;

/// What the trader did to their position, as inferred from the snapshot delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// Flat before, positioned after
    Entry,
    /// Positioned before, flat after
    Exit,
    /// Same direction, larger magnitude
    Add,
    /// Same direction, smaller magnitude
    Reduce,
    /// Crossed through zero into the opposite direction
    Flip,
    /// Snapshots disagree with every other case (normally both flat)
    Unknown,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::Exit => "exit",
            Self::Add => "add",
            Self::Reduce => "reduce",
            Self::Flip => "flip",
            Self::Unknown => "unknown",
        }
    }
}

/// Direction of the position the action moves toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Long,
    Short,
    Unknown,
}

impl Direction {
    fn of(size: Decimal) -> Self {
        if size > Decimal::ZERO {
            Self::Long
        } else if size < Decimal::ZERO {
            Self::Short
        } else {
            Self::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Long => "long",
            Self::Short => "short",
            Self::Unknown => "unknown",
        }
    }
}

/// A fill plus the position-change interpretation attached to it.
#[derive(Debug, Clone)]
pub struct ClassifiedAction {
    pub kind: ActionKind,
    pub coin: String,
    pub direction: Direction,
    /// Unsigned size of the change, in coin units
    pub magnitude: Decimal,
    pub fill: Fill,
}

/// Classify a fill given the trader's signed position size before and after
/// the window. Total: every (prev, curr) pair maps to exactly one action,
/// and the magnitude is never negative.
pub fn classify(fill: &Fill, prev_size: Decimal, curr_size: Decimal) -> ClassifiedAction {
    let (kind, direction, magnitude) = if prev_size.is_zero() && !curr_size.is_zero() {
        (ActionKind::Entry, Direction::of(curr_size), curr_size.abs())
    } else if !prev_size.is_zero() && curr_size.is_zero() {
        (ActionKind::Exit, Direction::of(prev_size), prev_size.abs())
    } else if prev_size > Decimal::ZERO && curr_size > Decimal::ZERO {
        if curr_size > prev_size {
            (ActionKind::Add, Direction::Long, curr_size - prev_size)
        } else {
            (ActionKind::Reduce, Direction::Long, prev_size - curr_size)
        }
    } else if prev_size < Decimal::ZERO && curr_size < Decimal::ZERO {
        if curr_size < prev_size {
            (ActionKind::Add, Direction::Short, curr_size.abs() - prev_size.abs())
        } else {
            (ActionKind::Reduce, Direction::Short, prev_size.abs() - curr_size.abs())
        }
    } else if !prev_size.is_zero() && !curr_size.is_zero() {
        // Opposite signs: the position crossed through zero.
        (ActionKind::Flip, Direction::of(curr_size), curr_size.abs())
    } else {
        // Both flat. A fill with no visible position change, usually a
        // record the snapshot pair cannot explain.
        (ActionKind::Unknown, Direction::Unknown, fill.size)
    };

    ClassifiedAction {
        kind,
        coin: fill.coin.clone(),
        direction,
        magnitude,
        fill: fill.clone(),
    }
}
