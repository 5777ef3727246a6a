//! Market session discovery
//!
//! Resolves the active BTC up/down window from the Gamma API and looks up
//! the window's benchmark (open) price.

mod crypto_price;
mod gamma;
mod resolver;

pub use crypto_price::CryptoPriceClient;
pub use gamma::GammaClient;
pub use resolver::SessionResolver;

use crate::signal::Side;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One instance of the recurring up/down market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSession {
    /// Event slug, e.g. `btc-updown-15m-1767638700`
    pub slug: String,
    /// Window-aligned unix timestamp the slug is derived from
    pub window_start: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Outcome token for side A
    pub up_token: String,
    /// Outcome token for side B
    pub down_token: String,
    /// Market condition id, if the lookup returned one
    pub condition_id: Option<String>,
    /// Last traded outcome prices from the lookup, used when the book is empty
    pub up_price: Option<Decimal>,
    pub down_price: Option<Decimal>,
    /// Reference price fixed at window open; filled in lazily
    pub benchmark: Option<Decimal>,
}

impl MarketSession {
    /// Whole seconds until the window closes (negative once closed)
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> i64 {
        self.end_time.signed_duration_since(now).num_seconds()
    }

    pub fn token_for(&self, side: Side) -> &str {
        match side {
            Side::Up => &self.up_token,
            Side::Down => &self.down_token,
        }
    }

    pub fn fallback_price(&self, side: Side) -> Option<Decimal> {
        match side {
            Side::Up => self.up_price,
            Side::Down => self.down_price,
        }
    }
}

/// Start of the window containing `now_ts`
pub fn session_window_start(now_ts: i64, window_secs: i64) -> i64 {
    now_ts.div_euclid(window_secs) * window_secs
}

/// Slug for the window starting at `window_start`
pub fn session_slug(prefix: &str, window_start: i64) -> String {
    format!("{}-{}", prefix, window_start)
}

/// Metadata lookup for a market window
#[async_trait]
pub trait SessionLookup: Send + Sync {
    /// Fetch the window identified by `slug`
    ///
    /// Returns `None` when the window is closed, missing, malformed or has no
    /// time remaining at `now`.
    async fn fetch_session(
        &self,
        slug: &str,
        window_start: i64,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<MarketSession>>;
}

/// Lookup of a window's benchmark price
#[async_trait]
pub trait BenchmarkSource: Send + Sync {
    async fn fetch_benchmark(&self, session: &MarketSession) -> anyhow::Result<Option<Decimal>>;
}
