//! Run command implementation

use crate::config::Config;
use crate::execution::{self, ExecutionVenue, OrderLifecycle};
use crate::feed::{BinanceFeed, ChainlinkFeed, FeedSource, PriceAggregator};
use crate::market::{CryptoPriceClient, GammaClient, SessionResolver};
use crate::observer::{ActivityLog, Observer};
use crate::orderbook::{MarketFeedManager, QuoteBoard};
use crate::redeem::{run_account_sync, DataApiClient, PositionSource, RedemptionReconciler};
use crate::runner::Runner;
use crate::state::StateStore;
use crate::ws::WsConfig;
use anyhow::Context;
use clap::Args;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Never place orders, only report triggers
    #[arg(long)]
    pub alert_only: bool,

    /// Disable settlement redemption for this run
    #[arg(long)]
    pub no_redeem: bool,
}

impl RunArgs {
    pub async fn execute(&self, mut config: Config, activity: ActivityLog) -> anyhow::Result<()> {
        if self.alert_only {
            config.trading.enabled = false;
        }
        if self.no_redeem {
            config.redeem.enabled = false;
        }
        config.validate()?;

        let token = CancellationToken::new();
        let shutdown = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown requested");
                shutdown.cancel();
            }
        });

        let http = config
            .proxy
            .http_client(Duration::from_secs(config.market.request_timeout_secs))
            .context("building HTTP client")?;
        let proxy = config.proxy.url().map(str::to_string);
        if let Some(url) = &proxy {
            tracing::info!(proxy = %redact(url), "Routing outbound traffic through proxy");
        }

        let store = Arc::new(StateStore::open(&config.state.path, config.state.history_limit));
        let observer = Arc::new(Observer::new(store.clone(), activity));

        let redeem_missing = config.venue.missing_redeem_credential();
        let redeem_wanted = config.redeem.enabled && redeem_missing.is_none();
        if let (true, Some(missing)) = (config.redeem.enabled, redeem_missing) {
            tracing::warn!(missing, "Redemption disabled, credential not configured");
        }

        let venue = connect_venue(&config, redeem_wanted)?;

        let ws_template = WsConfig::new(String::new())
            .reconnect_delay(config.feeds.reconnect_delay())
            .ping_interval(Duration::from_secs(config.feeds.ping_interval_secs.max(1)))
            .proxy(proxy);

        let prices = PriceAggregator::new();
        let sources: Vec<Arc<dyn FeedSource>> = vec![
            Arc::new(ChainlinkFeed::new(
                &config.feeds.chainlink_ws_url,
                &config.feeds.chainlink_symbol,
            )),
            Arc::new(BinanceFeed::new(
                &config.feeds.binance_ws_url,
                &config.feeds.binance_symbol,
            )),
        ];
        let mut workers = prices.start(sources, &ws_template, token.clone());

        let resolver = SessionResolver::new(
            Arc::new(GammaClient::new(&config.market.gamma_url, http.clone())),
            Arc::new(CryptoPriceClient::new(
                &config.market.crypto_price_url,
                &config.market.benchmark_symbol,
                &config.market.benchmark_variant,
                http.clone(),
            )),
            &config.market.slug_prefix,
            config.market.window_secs,
            config.market.refresh_interval(),
        );
        let mut market_template = ws_template.clone();
        market_template.url = config.market.clob_ws_url.clone();
        let feeds = MarketFeedManager::new(QuoteBoard::new(), market_template);

        let positions: Arc<dyn PositionSource> =
            Arc::new(DataApiClient::new(&config.redeem.data_api_url, http));
        if let Some(funder) = config.venue.funder_address.clone().filter(|f| !f.is_empty()) {
            workers.push(tokio::spawn(run_account_sync(
                positions.clone(),
                funder,
                observer.clone(),
                config.redeem.account_sync_interval(),
                token.child_token(),
            )));
        }

        match (&venue, config.venue.funder_address.clone()) {
            (Some(venue), Some(funder)) if redeem_wanted => {
                let reconciler = RedemptionReconciler::new(
                    positions,
                    venue.clone(),
                    store.clone(),
                    observer.clone(),
                    config.redeem.clone(),
                    funder,
                );
                workers.push(tokio::spawn(reconciler.run(token.child_token())));
            }
            _ => store.update(|s| s.redeem.enabled = false),
        }

        let lifecycle = OrderLifecycle::new(
            venue,
            store.clone(),
            config.trading.enabled,
            config.trading.trade_size,
            config.trading.fill_timeout(),
        );

        let runner = Runner::new(&config, resolver, prices, feeds, lifecycle, store, observer);
        let result = runner.run(token.clone()).await;

        token.cancel();
        for worker in workers {
            let _ = worker.await;
        }
        result
    }
}

/// Connect the venue when trading or redemption needs it
///
/// Failing to connect is fatal only when trading is enabled.
fn connect_venue(
    config: &Config,
    redeem_wanted: bool,
) -> anyhow::Result<Option<Arc<dyn ExecutionVenue>>> {
    if !config.trading.enabled && !redeem_wanted {
        return Ok(None);
    }

    match execution::connect(config.trading.mode, &config.venue) {
        Ok(venue) => {
            tracing::info!(venue = venue.name(), "Execution venue connected");
            Ok(Some(venue))
        }
        Err(e) if config.trading.enabled => {
            Err(e).context("trading is enabled but the execution venue is unavailable")
        }
        Err(e) => {
            tracing::warn!(error = %e, "Execution venue unavailable, redemption disabled");
            Ok(None)
        }
    }
}

fn redact(url: &str) -> String {
    match reqwest::Url::parse(url) {
        Ok(mut parsed) if parsed.password().is_some() => {
            if parsed.set_password(Some("***")).is_ok() {
                parsed.to_string()
            } else {
                url.to_string()
            }
        }
        _ => url.to_string(),
    }
}
