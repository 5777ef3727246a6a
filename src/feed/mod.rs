//! Price feed module
//!
//! Reference BTC prices from independent WebSocket feeds, merged into one
//! shared snapshot by the [`PriceAggregator`].

mod aggregator;
mod binance;
mod chainlink;
mod types;

pub use aggregator::PriceAggregator;
pub use binance::BinanceFeed;
pub use chainlink::ChainlinkFeed;
pub use types::{decimal_from_json, PricePoint, PriceSnapshot};

use rust_decimal::Decimal;

/// A single upstream price stream
///
/// Implementations describe where to connect and how to pull one price out of
/// a raw message. Connection management lives in the aggregator worker.
pub trait FeedSource: Send + Sync + 'static {
    /// Key under which this feed is stored in the snapshot
    fn name(&self) -> &str;

    /// WebSocket URL to connect to
    fn ws_url(&self) -> String;

    /// Message sent after every (re)connect, if the stream needs one
    fn subscribe_message(&self) -> Option<String> {
        None
    }

    /// Extract a price from a raw text frame; malformed frames yield `None`
    fn parse_message(&self, text: &str) -> Option<Decimal>;
}
