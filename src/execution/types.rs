//! Execution types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Venue-assigned order identifier
pub type OrderId = String;

/// Order direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => f.write_str("BUY"),
            OrderSide::Sell => f.write_str("SELL"),
        }
    }
}

/// An order to be submitted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Outcome token identifier
    pub token_id: String,
    pub side: OrderSide,
    /// Limit price, a probability in (0, 1)
    pub price: Decimal,
    /// Order size
    pub size: Decimal,
}

impl OrderRequest {
    /// Reject prices outside (0, 1) and non-positive sizes
    pub fn validate(&self) -> Result<(), VenueError> {
        if self.price <= Decimal::ZERO || self.price >= Decimal::ONE {
            return Err(VenueError::OrderRejected(format!(
                "price {} outside (0, 1)",
                self.price
            )));
        }
        if self.size <= Decimal::ZERO {
            return Err(VenueError::OrderRejected(format!(
                "size {} must be positive",
                self.size
            )));
        }
        Ok(())
    }
}

/// Venue view of an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatus {
    pub status: String,
    pub original_size: Decimal,
    pub size_matched: Decimal,
}

impl OrderStatus {
    /// Fully matched orders count as filled
    pub fn is_filled(&self) -> bool {
        self.original_size > Decimal::ZERO && self.size_matched >= self.original_size
    }
}

/// Result of a redeem transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedeemReceipt {
    pub tx_hash: Option<String>,
    /// Final transaction state reported by the relayer
    pub state: String,
    pub confirmed: bool,
}

/// Transaction states that count as confirmed
pub const CONFIRMED_TX_STATES: [&str; 3] = ["STATE_CONFIRMED", "STATE_MINED", "STATE_EXECUTED"];

impl RedeemReceipt {
    pub fn from_state(tx_hash: Option<String>, state: impl Into<String>) -> Self {
        let state = state.into();
        let confirmed = CONFIRMED_TX_STATES.contains(&state.as_str());
        Self {
            tx_hash,
            state,
            confirmed,
        }
    }
}

/// A fill (executed trade)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    pub order_id: OrderId,
    pub token_id: String,
    pub side: OrderSide,
    pub price: Decimal,
    pub size: Decimal,
    pub timestamp: DateTime<Utc>,
    /// Fees paid
    pub fees: Decimal,
}

/// Execution venue errors
#[derive(Debug, Clone, Error)]
pub enum VenueError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("order rejected: {0}")]
    OrderRejected(String),
    #[error("order not found: {0}")]
    NotFound(String),
    #[error("cancel rejected: {0}")]
    CancelRejected(String),
    #[error("redeem failed: {0}")]
    RedeemFailed(String),
    /// The funder's proxy account has not been deployed yet
    #[error("account not provisioned: {0}")]
    NotProvisioned(String),
    #[error("venue transport error: {0}")]
    Transport(String),
}
