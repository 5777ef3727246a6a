//! Configuration types for poly-updown
//!
//! Loaded from a TOML file, then overridden by environment variables so the
//! bot can be driven from a plain `.env`-style deployment.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Tier table is not usable
    #[error("Invalid trigger tiers: {0}")]
    InvalidTiers(String),
    /// A value is out of range
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub trading: TradingConfig,
    #[serde(default)]
    pub tiers: TiersConfig,
    #[serde(default)]
    pub market: MarketConfig,
    #[serde(default)]
    pub feeds: FeedsConfig,
    #[serde(default)]
    pub redeem: RedeemConfig,
    #[serde(default)]
    pub venue: VenueConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Execution mode: paper trading or live
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Paper,
    Live,
}

/// Order placement and risk configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TradingConfig {
    /// Place orders when a trigger fires (otherwise alert only)
    #[serde(default)]
    pub enabled: bool,

    /// Which execution venue backs order placement
    #[serde(default)]
    pub mode: ExecutionMode,

    /// Order size in outcome shares
    #[serde(default = "default_trade_size")]
    pub trade_size: Decimal,

    /// Exit an open position once |divergence| falls below this
    #[serde(default = "default_stop_loss")]
    pub stop_loss_divergence: Decimal,

    /// Main loop tick interval (milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Main loop sleep while no session is active (milliseconds)
    #[serde(default = "default_idle_sleep_ms")]
    pub idle_sleep_ms: u64,

    /// Age after which a pending order is checked and cancelled if unfilled
    #[serde(default = "default_fill_timeout_secs")]
    pub fill_timeout_secs: u64,
}

fn default_trade_size() -> Decimal {
    Decimal::new(5, 0)
}
fn default_stop_loss() -> Decimal {
    Decimal::new(40, 0)
}
fn default_poll_interval_ms() -> u64 {
    100
}
fn default_idle_sleep_ms() -> u64 {
    500
}
fn default_fill_timeout_secs() -> u64 {
    10
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: ExecutionMode::Paper,
            trade_size: default_trade_size(),
            stop_loss_divergence: default_stop_loss(),
            poll_interval_ms: default_poll_interval_ms(),
            idle_sleep_ms: default_idle_sleep_ms(),
            fill_timeout_secs: default_fill_timeout_secs(),
        }
    }
}

impl TradingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(10))
    }

    pub fn idle_sleep(&self) -> Duration {
        Duration::from_millis(self.idle_sleep_ms)
    }

    pub fn fill_timeout(&self) -> Duration {
        Duration::from_secs(self.fill_timeout_secs)
    }
}

/// One (time remaining ceiling, divergence floor) pair
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct TierConfig {
    /// Fires only when at most this many seconds remain
    pub max_remaining_secs: i64,
    /// Fires only when |divergence| is at least this
    pub min_divergence: Decimal,
}

/// The three trigger tiers, evaluated in order
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct TiersConfig {
    pub tier1: TierConfig,
    pub tier2: TierConfig,
    pub tier3: TierConfig,
}

impl Default for TiersConfig {
    fn default() -> Self {
        Self {
            tier1: TierConfig {
                max_remaining_secs: 40,
                min_divergence: Decimal::new(60, 0),
            },
            tier2: TierConfig {
                max_remaining_secs: 60,
                min_divergence: Decimal::new(80, 0),
            },
            tier3: TierConfig {
                max_remaining_secs: 120,
                min_divergence: Decimal::new(180, 0),
            },
        }
    }
}

impl TiersConfig {
    pub fn as_array(&self) -> [TierConfig; 3] {
        [self.tier1, self.tier2, self.tier3]
    }

    fn tier_mut(&mut self, index: usize) -> &mut TierConfig {
        match index {
            1 => &mut self.tier1,
            2 => &mut self.tier2,
            _ => &mut self.tier3,
        }
    }
}

/// Market discovery configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MarketConfig {
    pub gamma_url: String,
    pub crypto_price_url: String,
    pub clob_ws_url: String,
    /// Event slug prefix, the window start timestamp is appended
    pub slug_prefix: String,
    /// Length of one market window
    pub window_secs: i64,
    /// How often the active session is re-fetched
    pub refresh_interval_secs: u64,
    pub benchmark_symbol: String,
    pub benchmark_variant: String,
    pub request_timeout_secs: u64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            gamma_url: "https://gamma-api.polymarket.com".to_string(),
            crypto_price_url: "https://polymarket.com/api/crypto/crypto-price".to_string(),
            clob_ws_url: "wss://ws-subscriptions-clob.polymarket.com/ws/market".to_string(),
            slug_prefix: "btc-updown-15m".to_string(),
            window_secs: 900,
            refresh_interval_secs: 5,
            benchmark_symbol: "BTC".to_string(),
            benchmark_variant: "fifteen".to_string(),
            request_timeout_secs: 10,
        }
    }
}

impl MarketConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.clamp(1, 5))
    }
}

/// Reference price feeds
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FeedsConfig {
    /// Feed whose price is compared against the benchmark
    pub reference: String,
    pub binance_ws_url: String,
    pub binance_symbol: String,
    pub chainlink_ws_url: String,
    pub chainlink_symbol: String,
    /// Prices older than this are treated as unavailable
    pub max_age_secs: u64,
    /// Fixed delay between reconnect attempts
    pub reconnect_delay_secs: u64,
    pub ping_interval_secs: u64,
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            reference: "chainlink".to_string(),
            binance_ws_url: "wss://stream.binance.com:9443/ws".to_string(),
            binance_symbol: "btcusdt".to_string(),
            chainlink_ws_url: "wss://ws-live-data.polymarket.com".to_string(),
            chainlink_symbol: "btc/usd".to_string(),
            max_age_secs: 30,
            reconnect_delay_secs: 5,
            ping_interval_secs: 30,
        }
    }
}

impl FeedsConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

/// Settlement redemption configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RedeemConfig {
    pub enabled: bool,
    pub data_api_url: String,
    pub scan_interval_secs: u64,
    pub retry_interval_secs: u64,
    pub max_per_scan: usize,
    pub pending_log_interval_secs: u64,
    pub account_sync_secs: u64,
}

impl Default for RedeemConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            data_api_url: "https://data-api.polymarket.com".to_string(),
            scan_interval_secs: 15,
            retry_interval_secs: 120,
            max_per_scan: 2,
            pending_log_interval_secs: 30,
            account_sync_secs: 20,
        }
    }
}

impl RedeemConfig {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs.max(3))
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs.max(10))
    }

    pub fn max_per_scan(&self) -> usize {
        self.max_per_scan.max(1)
    }

    pub fn pending_log_interval(&self) -> Duration {
        Duration::from_secs(self.pending_log_interval_secs.max(10))
    }

    pub fn account_sync_interval(&self) -> Duration {
        Duration::from_secs(self.account_sync_secs.max(10))
    }
}

/// Venue credentials
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VenueConfig {
    pub private_key: Option<String>,
    /// Proxy wallet that holds positions and funds orders
    pub funder_address: Option<String>,
    pub builder_api_key: Option<String>,
    pub builder_secret: Option<String>,
    pub builder_passphrase: Option<String>,
    pub relayer_url: String,
    /// Fee rate applied to simulated fills
    pub paper_fee_rate: Decimal,
}

impl Default for VenueConfig {
    fn default() -> Self {
        Self {
            private_key: None,
            funder_address: None,
            builder_api_key: None,
            builder_secret: None,
            builder_passphrase: None,
            relayer_url: "https://relayer-v2.polymarket.com".to_string(),
            paper_fee_rate: Decimal::ZERO,
        }
    }
}

impl VenueConfig {
    pub fn has_builder_credentials(&self) -> bool {
        [
            &self.builder_api_key,
            &self.builder_secret,
            &self.builder_passphrase,
        ]
        .iter()
        .all(|v| v.as_deref().is_some_and(|s| !s.is_empty()))
    }

    /// First missing credential required by the redemption reconciler
    pub fn missing_redeem_credential(&self) -> Option<&'static str> {
        if self.private_key.as_deref().unwrap_or("").is_empty() {
            return Some("PRIVATE_KEY");
        }
        if self.funder_address.as_deref().unwrap_or("").is_empty() {
            return Some("FUNDER_ADDRESS");
        }
        if !self.has_builder_credentials() {
            return Some("POLY_BUILDER_API_KEY/SECRET/PASSPHRASE");
        }
        None
    }
}

/// Outbound HTTP proxy
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub http: Option<String>,
    pub https: Option<String>,
}

impl ProxyConfig {
    /// Proxy URL used for every outbound connection
    pub fn url(&self) -> Option<&str> {
        self.http
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.https.as_deref().filter(|s| !s.is_empty()))
    }

    /// Build a reqwest client honouring the proxy setting
    pub fn http_client(&self, timeout: Duration) -> anyhow::Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder().timeout(timeout);
        if let Some(url) = self.url() {
            builder = builder.proxy(reqwest::Proxy::all(url)?);
        }
        Ok(builder.build()?)
    }
}

/// Durable state record location
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StateConfig {
    pub path: PathBuf,
    /// Maximum retained trade history events
    pub history_limit: usize,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("state.json"),
            history_limit: 300,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format
    #[default]
    Pretty,
    /// JSON format for log aggregation
    Json,
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Prometheus scrape port, 0 disables the exporter
    pub metrics_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    /// Entries kept in the observer activity log
    pub activity_capacity: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            metrics_port: 0,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            activity_capacity: 400,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string());

        if let Some(v) = get("AUTO_TRADE") {
            self.trading.enabled = parse_bool(&v);
        }
        if let Some(v) = parse_env(&get, "TRADE_AMOUNT") {
            self.trading.trade_size = v;
        }
        if let Some(v) = parse_env(&get, "STOP_LOSS_DIFF") {
            self.trading.stop_loss_divergence = v;
        }
        if let Some(v) = parse_env(&get, "POLL_INTERVAL_MS") {
            self.trading.poll_interval_ms = v;
        }
        for index in 1..=3 {
            if let Some(v) = parse_env(&get, &format!("CONDITION_{index}_TIME")) {
                self.tiers.tier_mut(index).max_remaining_secs = v;
            }
            if let Some(v) = parse_env(&get, &format!("CONDITION_{index}_DIFF")) {
                self.tiers.tier_mut(index).min_divergence = v;
            }
        }

        if let Some(v) = get("AUTO_REDEEM") {
            self.redeem.enabled = parse_bool(&v);
        }
        if let Some(v) = parse_env(&get, "REDEEM_SCAN_INTERVAL") {
            self.redeem.scan_interval_secs = v;
        }
        if let Some(v) = parse_env(&get, "REDEEM_RETRY_INTERVAL") {
            self.redeem.retry_interval_secs = v;
        }
        if let Some(v) = parse_env(&get, "REDEEM_MAX_PER_SCAN") {
            self.redeem.max_per_scan = v;
        }

        let non_empty = |key: &str| get(key).filter(|v| !v.is_empty());
        if let Some(v) = non_empty("PRIVATE_KEY") {
            self.venue.private_key = Some(v);
        }
        if let Some(v) = non_empty("FUNDER_ADDRESS") {
            self.venue.funder_address = Some(v);
        }
        if let Some(v) = non_empty("POLY_BUILDER_API_KEY") {
            self.venue.builder_api_key = Some(v);
        }
        if let Some(v) = non_empty("POLY_BUILDER_SECRET") {
            self.venue.builder_secret = Some(v);
        }
        if let Some(v) = non_empty("POLY_BUILDER_PASSPHRASE") {
            self.venue.builder_passphrase = Some(v);
        }
        if let Some(v) = non_empty("RELAYER_URL") {
            self.venue.relayer_url = v;
        }
        if let Some(v) = non_empty("HTTP_PROXY") {
            self.proxy.http = Some(v);
        }
        if let Some(v) = non_empty("HTTPS_PROXY") {
            self.proxy.https = Some(v);
        }
        if let Some(v) = non_empty("STATE_FILE") {
            self.state.path = PathBuf::from(v);
        }
        if let Some(v) = non_empty("LOG_LEVEL") {
            self.telemetry.log_level = v;
        }
    }

    /// Check invariants that would make the trigger engine misbehave
    pub fn validate(&self) -> Result<(), ConfigError> {
        let tiers = self.tiers.as_array();
        if tiers
            .windows(2)
            .any(|w| w[0].max_remaining_secs >= w[1].max_remaining_secs)
        {
            return Err(ConfigError::InvalidTiers(
                "time ceilings must be strictly increasing".to_string(),
            ));
        }
        if let Some(tier) = tiers
            .iter()
            .find(|t| t.max_remaining_secs <= 0 || t.min_divergence <= Decimal::ZERO)
        {
            return Err(ConfigError::InvalidTiers(format!(
                "non-positive threshold in {tier:?}"
            )));
        }
        if self.trading.trade_size <= Decimal::ZERO {
            return Err(ConfigError::InvalidValue {
                key: "trading.trade_size",
                value: self.trading.trade_size.to_string(),
            });
        }
        if self.trading.stop_loss_divergence < Decimal::ZERO {
            return Err(ConfigError::InvalidValue {
                key: "trading.stop_loss_divergence",
                value: self.trading.stop_loss_divergence.to_string(),
            });
        }
        if self.market.window_secs <= 0 {
            return Err(ConfigError::InvalidValue {
                key: "market.window_secs",
                value: self.market.window_secs.to_string(),
            });
        }
        if tiers
            .windows(2)
            .any(|w| w[0].min_divergence > w[1].min_divergence)
        {
            tracing::warn!(
                ?tiers,
                "Divergence floors decrease with time remaining; longer windows fire on weaker signals"
            );
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

fn parse_env<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = get(key)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparseable environment override");
            None
        }
    }
}
