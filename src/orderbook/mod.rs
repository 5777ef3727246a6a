//! Outcome-token order book feed
//!
//! Best bid/ask and mid for the active session's two outcome tokens, from the
//! Polymarket CLOB market WebSocket.

mod manager;
mod parser;
mod quote;

pub use manager::MarketFeedManager;
pub use parser::{parse_market_message, subscription_message, QuoteUpdate};
pub use quote::{QuoteBoard, TokenQuote};
