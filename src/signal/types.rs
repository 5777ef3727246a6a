//! Signal types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome side of the binary market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Reference finishes above the benchmark (side A)
    Up,
    /// Reference finishes at or below the benchmark (side B)
    Down,
}

impl Side {
    /// Positive divergence selects UP, anything else DOWN
    pub fn from_divergence(divergence: Decimal) -> Self {
        if divergence > Decimal::ZERO {
            Side::Up
        } else {
            Side::Down
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Up => "UP",
            Side::Down => "DOWN",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dedup key guarding one trigger per (session, side)
pub fn dedup_key(session_slug: &str, side: Side) -> String {
    format!("{}|{}", session_slug, side)
}

/// A (time-remaining ceiling, divergence floor) pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tier {
    /// 1-based priority, lower is checked first
    pub index: u8,
    pub max_remaining_secs: i64,
    pub min_divergence: Decimal,
}

impl Tier {
    pub fn matches(&self, remaining_secs: i64, abs_divergence: Decimal) -> bool {
        remaining_secs <= self.max_remaining_secs && abs_divergence >= self.min_divergence
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tier{}: remaining<={}s and |divergence|>={}",
            self.index, self.max_remaining_secs, self.min_divergence
        )
    }
}

/// Why a tick produced no action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldReason {
    /// Reference or benchmark price unavailable
    Waiting,
    /// No tier condition met
    NoTrigger,
    /// Position open and divergence above the stop-loss threshold
    Holding,
    /// An entry order is awaiting fill confirmation
    OrderPending,
    /// Tier met but no price for the chosen side
    NoQuote,
}

/// Outcome of one evaluation tick
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Hold(HoldReason),
    /// Buy `side` at `price`
    Enter {
        tier: Tier,
        side: Side,
        price: Decimal,
        divergence: Decimal,
    },
    /// Tier met but this (session, side) already fired
    Suppressed { tier: Tier, side: Side },
    /// Exit the held `side`; `price` is absent when the book and lookup are both empty
    StopLoss {
        side: Side,
        price: Option<Decimal>,
        divergence: Decimal,
    },
}
