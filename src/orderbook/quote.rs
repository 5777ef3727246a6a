//! Per-token top-of-book quotes

use super::QuoteUpdate;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Latest top of book for one outcome token
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TokenQuote {
    pub mid: Decimal,
    pub best_bid: Decimal,
    pub best_ask: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl TokenQuote {
    /// Price to pay when taking liquidity: best ask, else mid
    pub fn entry_price(&self) -> Option<Decimal> {
        positive(self.best_ask).or_else(|| positive(self.mid))
    }

    /// Price received when hitting the bid: best bid, else mid
    pub fn exit_price(&self) -> Option<Decimal> {
        positive(self.best_bid).or_else(|| positive(self.mid))
    }
}

fn positive(value: Decimal) -> Option<Decimal> {
    (value > Decimal::ZERO).then_some(value)
}

/// Shared quote table, most recent update wins
#[derive(Clone, Default)]
pub struct QuoteBoard {
    quotes: Arc<RwLock<HashMap<String, TokenQuote>>>,
}

impl QuoteBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&self, update: &QuoteUpdate) {
        let quote = TokenQuote {
            mid: (update.best_bid + update.best_ask) / Decimal::TWO,
            best_bid: update.best_bid,
            best_ask: update.best_ask,
            updated_at: Utc::now(),
        };
        self.quotes.write().insert(update.token_id.clone(), quote);
    }

    pub fn quote(&self, token_id: &str) -> Option<TokenQuote> {
        self.quotes.read().get(token_id).copied()
    }

    pub fn clear(&self) {
        self.quotes.write().clear();
    }

    pub fn len(&self) -> usize {
        self.quotes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.read().is_empty()
    }
}
