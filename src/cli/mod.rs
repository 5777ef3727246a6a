//! CLI interface for poly-updown
//!
//! Provides subcommands for:
//! - `run`: Start the decision loop, price feeds and redemption
//! - `status`: Show the persisted trade state
//! - `config`: Show the effective configuration

mod run;
mod status;

pub use run::RunArgs;
pub use status::StatusArgs;

use crate::config::Config;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "poly-updown")]
#[command(about = "Divergence-triggered trading bot for Polymarket BTC 15-minute up/down markets")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start trading (or alerting when trading is disabled)
    Run(RunArgs),
    /// Show persisted position, pending order and recent history
    Status(StatusArgs),
    /// Show effective configuration with secrets masked
    Config,
}

/// Effective configuration as TOML, credentials replaced by `***`
pub fn render_config(config: &Config) -> anyhow::Result<String> {
    let mut masked = config.clone();
    let venue = &mut masked.venue;
    for secret in [
        &mut venue.private_key,
        &mut venue.builder_api_key,
        &mut venue.builder_secret,
        &mut venue.builder_passphrase,
    ] {
        if secret.as_deref().is_some_and(|s| !s.is_empty()) {
            *secret = Some("***".to_string());
        }
    }
    for proxy in [&mut masked.proxy.http, &mut masked.proxy.https] {
        if let Some(mut url) = proxy.as_deref().and_then(|u| reqwest::Url::parse(u).ok()) {
            if url.password().is_some() && url.set_password(Some("***")).is_ok() {
                *proxy = Some(url.to_string());
            }
        }
    }
    Ok(toml::to_string_pretty(&masked)?)
}
