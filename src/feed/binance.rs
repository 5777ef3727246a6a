//! Binance spot trades, a display-only comparison price

use super::{decimal_from_json, FeedSource};
use rust_decimal::Decimal;
use serde_json::Value;

/// `<symbol>@trade` stream on the Binance spot socket
pub struct BinanceFeed {
    stream_url: String,
}

impl BinanceFeed {
    /// Snapshot key for this feed
    pub const NAME: &'static str = "binance";

    pub fn new(base_url: impl Into<String>, symbol: impl Into<String>) -> Self {
        let base_url = base_url.into();
        let stream_url = format!(
            "{}/{}@trade",
            base_url.trim_end_matches('/'),
            symbol.into().to_lowercase()
        );
        Self { stream_url }
    }

    /// Last trade price from a raw or combined-stream frame
    ///
    /// Combined streams wrap the event as `{"stream": .., "data": {..}}`.
    pub fn parse_trade(text: &str) -> Option<Decimal> {
        let frame: Value = serde_json::from_str(text).ok()?;
        let event = frame.get("data").unwrap_or(&frame);
        if event.get("e")?.as_str()? != "trade" {
            return None;
        }
        decimal_from_json(event.get("p")?)
    }
}

impl FeedSource for BinanceFeed {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn ws_url(&self) -> String {
        self.stream_url.clone()
    }

    fn parse_message(&self, text: &str) -> Option<Decimal> {
        Self::parse_trade(text)
    }
}
