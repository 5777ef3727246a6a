//! Execution venue and order lifecycle
//!
//! The venue is the external capability that places, queries and cancels
//! orders and submits redemptions. The lifecycle drives one in-flight entry
//! order and the resulting position against it.

mod lifecycle;
mod paper;
mod types;

pub use lifecycle::{EntryOutcome, ExitOutcome, OrderLifecycle, PendingOutcome};
pub use paper::PaperVenue;
pub use types::{
    Fill, OrderId, OrderRequest, OrderSide, OrderStatus, RedeemReceipt, VenueError,
    CONFIRMED_TX_STATES,
};

use crate::config::{ExecutionMode, VenueConfig};
use async_trait::async_trait;
use std::sync::Arc;

/// Trait for execution venue implementations
#[async_trait]
pub trait ExecutionVenue: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Submit an order, returning the venue order id
    async fn place_order(&self, order: &OrderRequest) -> Result<OrderId, VenueError>;

    /// Query an order's fill progress
    async fn order_status(&self, order_id: &str) -> Result<OrderStatus, VenueError>;

    /// Cancel an open order
    async fn cancel_order(&self, order_id: &str) -> Result<(), VenueError>;

    /// Whether `redeem` submits real on-chain transactions
    fn redeems_on_chain(&self) -> bool {
        true
    }

    /// Redeem a settled condition for `owner` and wait for the transaction
    async fn redeem(&self, condition_id: &str, owner: &str) -> Result<RedeemReceipt, VenueError>;

    /// Deploy the owner's proxy account so redemptions can be relayed
    async fn provision_account(&self) -> Result<(), VenueError>;
}

/// Connect to the venue selected by `mode`
pub fn connect(
    mode: ExecutionMode,
    config: &VenueConfig,
) -> Result<Arc<dyn ExecutionVenue>, VenueError> {
    match mode {
        ExecutionMode::Paper => {
            tracing::info!(fee_rate = %config.paper_fee_rate, "Using paper execution venue");
            Ok(Arc::new(PaperVenue::new(config.paper_fee_rate)))
        }
        ExecutionMode::Live => {
            if config.private_key.is_none() {
                return Err(VenueError::Auth("PRIVATE_KEY is not configured".into()));
            }
            Err(VenueError::Auth(
                "live order signing is not available in this build; use mode = \"paper\"".into(),
            ))
        }
    }
}
