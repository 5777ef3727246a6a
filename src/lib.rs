//! poly-updown: divergence-triggered trading bot for Polymarket BTC
//! 15-minute up/down markets
//!
//! This library provides the core components for:
//! - Reference price feeds from Chainlink (RTDS) and Binance
//! - Session discovery via the Gamma API and benchmark lookup
//! - Per-session order book quotes from the Polymarket market WebSocket
//! - The tiered divergence trigger with stop-loss
//! - Order lifecycle against a paper/live execution venue
//! - Settlement redemption and account snapshots
//! - Durable JSON trade state and the observer interface
//! - Structured logging and Prometheus metrics

pub mod cli;
pub mod config;
pub mod execution;
pub mod feed;
pub mod market;
pub mod observer;
pub mod orderbook;
pub mod redeem;
pub mod runner;
pub mod signal;
pub mod state;
pub mod telemetry;
pub mod ws;
