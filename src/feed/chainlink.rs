//! Chainlink BTC/USD price via the Polymarket real-time data stream

use super::{decimal_from_json, FeedSource};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};

const TOPIC: &str = "crypto_prices_chainlink";

#[derive(Debug, Deserialize)]
struct RtdsMessage {
    #[serde(default)]
    topic: String,
    payload: Option<RtdsPayload>,
}

#[derive(Debug, Deserialize)]
struct RtdsPayload {
    symbol: Option<String>,
    data: Option<Vec<RtdsPoint>>,
    value: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RtdsPoint {
    value: Value,
}

/// Chainlink oracle feed, the trading reference price
pub struct ChainlinkFeed {
    url: String,
    symbol: String,
}

impl ChainlinkFeed {
    /// Snapshot key for this feed
    pub const NAME: &'static str = "chainlink";

    pub fn new(url: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            symbol: symbol.into().to_lowercase(),
        }
    }

    /// Parse an RTDS frame
    ///
    /// Batched frames carry `payload.data[]` and the newest entry wins;
    /// streaming frames carry a single `payload.value`.
    pub fn parse_update(text: &str, symbol: &str) -> Option<Decimal> {
        let msg: RtdsMessage = serde_json::from_str(text).ok()?;
        if !msg.topic.starts_with("crypto_prices") {
            return None;
        }
        let payload = msg.payload?;

        if let Some(points) = payload.data {
            if payload.symbol.as_deref() != Some(symbol) {
                return None;
            }
            return decimal_from_json(&points.last()?.value);
        }

        if let Some(sym) = payload.symbol.as_deref() {
            if sym != symbol {
                return None;
            }
        }
        decimal_from_json(payload.value.as_ref()?)
    }
}

impl FeedSource for ChainlinkFeed {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn ws_url(&self) -> String {
        self.url.clone()
    }

    fn subscribe_message(&self) -> Option<String> {
        let filters = json!({ "symbol": self.symbol }).to_string();
        let msg = json!({
            "action": "subscribe",
            "subscriptions": [{
                "topic": TOPIC,
                "type": "*",
                "filters": filters,
            }]
        });
        Some(msg.to_string())
    }

    fn parse_message(&self, text: &str) -> Option<Decimal> {
        Self::parse_update(text, &self.symbol)
    }
}
