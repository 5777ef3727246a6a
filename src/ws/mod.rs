//! WebSocket client library
//!
//! Provides a reusable WebSocket client with fixed-delay reconnection,
//! ping/pong handling, resubscription on connect and optional HTTP proxy
//! tunnelling.

mod client;
mod proxy;
mod types;

pub use client::WsClient;
pub use proxy::open_tunnel;
pub use types::{WsConfig, WsError, WsMessage};
