//! Trigger engine
//!
//! Turns time remaining and reference/benchmark divergence into an
//! enter / hold / stop-loss decision.

mod engine;
mod types;

pub use engine::{TriggerEngine, TriggerInput};
pub use types::{dedup_key, Decision, HoldReason, Side, Tier};
