//! State record types

use crate::signal::Side;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Filled entry held for a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Session slug the position belongs to
    pub session: String,
    pub side: Side,
    pub entry_price: Decimal,
    /// Absolute divergence when the fill was confirmed
    pub entry_divergence: Decimal,
}

/// Entry order awaiting fill confirmation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOrder {
    pub order_id: String,
    pub session: String,
    pub side: Side,
    pub price: Decimal,
    pub submitted_at: DateTime<Utc>,
}

impl PendingOrder {
    /// Seconds since submission
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.submitted_at)
    }
}

/// Last attempted trigger, keyed by `session|side`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastOrder {
    pub key: String,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Submitted,
    Filled,
    Failed,
    Confirmed,
}

/// Order placed or confirmed on the venue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub time: DateTime<Utc>,
    pub session: String,
    pub side: Side,
    pub price: Option<Decimal>,
    pub amount: Decimal,
    /// Empty when the venue returned no id
    pub order_id: String,
    pub status: EventStatus,
    pub reason: String,
    pub divergence: Decimal,
}

/// Redemption attempt outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedeemEvent {
    pub time: DateTime<Utc>,
    pub condition_id: String,
    pub owner: String,
    pub tx_hash: Option<String>,
    pub status: EventStatus,
    pub message: String,
}

/// History entry, tagged by action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "UPPERCASE")]
pub enum TradeEvent {
    Buy(OrderEvent),
    Sell(OrderEvent),
    Redeem(RedeemEvent),
}

impl TradeEvent {
    pub fn time(&self) -> DateTime<Utc> {
        match self {
            TradeEvent::Buy(e) | TradeEvent::Sell(e) => e.time,
            TradeEvent::Redeem(e) => e.time,
        }
    }

    pub fn status(&self) -> EventStatus {
        match self {
            TradeEvent::Buy(e) | TradeEvent::Sell(e) => e.status,
            TradeEvent::Redeem(e) => e.status,
        }
    }
}

/// Prices as of the last write, for diagnostics only
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceMirror {
    pub benchmark: Option<Decimal>,
    pub reference: Option<Decimal>,
    pub binance: Option<Decimal>,
    pub up_price: Option<Decimal>,
    pub down_price: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedeemOutcome {
    pub time: DateTime<Utc>,
    pub ok: bool,
    pub condition_id: String,
    pub tx_hash: Option<String>,
    pub message: String,
}

/// Reconciler mirror; owned by the redemption loop
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RedeemStatus {
    pub enabled: bool,
    pub last_scan: Option<DateTime<Utc>>,
    /// Redeemable conditions across every scanned owner
    pub pending: usize,
    /// Subset the funder can submit
    pub claimable: usize,
    pub last_result: Option<RedeemOutcome>,
}

/// The single persisted record
///
/// `position`, `pending_order` and `last_order` belong to the decision loop;
/// `redeem` belongs to the reconciler. Both append to `history`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradeState {
    pub position: Option<Position>,
    pub pending_order: Option<PendingOrder>,
    pub last_order: Option<LastOrder>,
    pub history: Vec<TradeEvent>,
    pub prices: PriceMirror,
    pub redeem: RedeemStatus,
    pub updated_at: Option<DateTime<Utc>>,
}

impl TradeState {
    pub fn push_event(&mut self, event: TradeEvent) {
        self.history.push(event);
    }

    /// Drop the oldest events beyond `limit`
    pub fn trim_history(&mut self, limit: usize) {
        if self.history.len() > limit {
            let excess = self.history.len() - limit;
            self.history.drain(..excess);
        }
    }

    /// Forget all session-scoped trading state
    pub fn clear_session(&mut self) {
        self.position = None;
        self.pending_order = None;
        self.last_order = None;
    }

    pub fn last_order_key(&self) -> Option<&str> {
        self.last_order.as_ref().map(|o| o.key.as_str())
    }
}
