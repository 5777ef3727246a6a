//! Persisted trade state
//!
//! One JSON record holding position, pending order, dedup key, bounded trade
//! history and observability mirrors. Rewritten wholesale on every mutation.

mod store;
mod types;

pub use store::{StateStore, StoreError};
pub use types::{
    EventStatus, LastOrder, OrderEvent, PendingOrder, Position, PriceMirror, RedeemEvent,
    RedeemOutcome, RedeemStatus, TradeEvent, TradeState,
};
