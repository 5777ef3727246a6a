//! Shared fixtures: scripted venue and market lookups, runner harness

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use poly_updown::config::Config;
use poly_updown::execution::{
    ExecutionVenue, OrderId, OrderLifecycle, OrderRequest, OrderStatus, RedeemReceipt, VenueError,
};
use poly_updown::feed::PriceAggregator;
use poly_updown::market::{
    session_window_start, BenchmarkSource, MarketSession, SessionLookup, SessionResolver,
};
use poly_updown::observer::{ActivityLog, Observer};
use poly_updown::orderbook::{MarketFeedManager, QuoteBoard, QuoteUpdate};
use poly_updown::runner::Runner;
use poly_updown::state::StateStore;
use poly_updown::ws::WsConfig;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const PREFIX: &str = "btc-updown-15m";

/// Venue that records calls; fills only when `fill` is set
#[derive(Default)]
pub struct ScriptedVenue {
    pub fill: Mutex<bool>,
    pub placed: Mutex<Vec<OrderRequest>>,
    pub cancelled: Mutex<Vec<String>>,
}

#[async_trait]
impl ExecutionVenue for ScriptedVenue {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<OrderId, VenueError> {
        let mut placed = self.placed.lock();
        placed.push(order.clone());
        Ok(format!("order-{}", placed.len()))
    }

    async fn order_status(&self, order_id: &str) -> Result<OrderStatus, VenueError> {
        let placed = self.placed.lock();
        let index: usize = order_id
            .trim_start_matches("order-")
            .parse()
            .map_err(|_| VenueError::NotFound(order_id.to_string()))?;
        let order = placed
            .get(index - 1)
            .ok_or_else(|| VenueError::NotFound(order_id.to_string()))?;
        Ok(OrderStatus {
            status: "LIVE".into(),
            original_size: order.size,
            size_matched: if *self.fill.lock() { order.size } else { Decimal::ZERO },
        })
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), VenueError> {
        self.cancelled.lock().push(order_id.to_string());
        Ok(())
    }

    async fn redeem(&self, _condition_id: &str, _owner: &str) -> Result<RedeemReceipt, VenueError> {
        Ok(RedeemReceipt::from_state(Some("0xtx".into()), "STATE_CONFIRMED"))
    }

    async fn provision_account(&self) -> Result<(), VenueError> {
        Ok(())
    }
}

/// Lookup that serves whatever session the test installed, for any slug
#[derive(Default)]
pub struct StaticLookup {
    pub session: Mutex<Option<MarketSession>>,
}

#[async_trait]
impl SessionLookup for StaticLookup {
    async fn fetch_session(
        &self,
        _slug: &str,
        _window_start: i64,
        _now: DateTime<Utc>,
    ) -> anyhow::Result<Option<MarketSession>> {
        Ok(self.session.lock().clone())
    }
}

pub struct FixedBenchmark(pub Decimal);

#[async_trait]
impl BenchmarkSource for FixedBenchmark {
    async fn fetch_benchmark(&self, _session: &MarketSession) -> anyhow::Result<Option<Decimal>> {
        Ok(Some(self.0))
    }
}

/// Session for the window containing `now`, ending `remaining` seconds later
pub fn session_at(now: DateTime<Utc>, remaining: i64) -> MarketSession {
    let window_start = session_window_start(now.timestamp(), 900);
    MarketSession {
        slug: format!("{PREFIX}-{window_start}"),
        window_start,
        start_time: now - chrono::Duration::seconds(900 - remaining),
        end_time: now + chrono::Duration::seconds(remaining),
        up_token: "token-up".into(),
        down_token: "token-down".into(),
        condition_id: Some(format!("0x{}", "c".repeat(64))),
        up_price: Some(dec!(0.80)),
        down_price: Some(dec!(0.20)),
        benchmark: None,
    }
}

pub struct Harness {
    pub _dir: tempfile::TempDir,
    pub store: Arc<StateStore>,
    pub venue: Arc<ScriptedVenue>,
    pub lookup: Arc<StaticLookup>,
    pub prices: PriceAggregator,
    pub board: QuoteBoard,
    pub observer: Arc<Observer>,
    pub runner: Runner,
    pub token: CancellationToken,
}

impl Harness {
    /// Runner with trading enabled, benchmark 97000 and the given session
    pub fn new(session: MarketSession) -> Self {
        Self::with_store(session, |_| {})
    }

    /// Like `new`, with the state file prepared before the runner starts
    pub fn with_store(session: MarketSession, prepare: impl FnOnce(&StateStore)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        {
            let seed = StateStore::open(&path, 300);
            prepare(&seed);
        }
        let store = Arc::new(StateStore::open(&path, 300));

        let mut config = Config::default();
        config.trading.enabled = true;

        let venue = Arc::new(ScriptedVenue::default());
        let lookup = Arc::new(StaticLookup::default());
        *lookup.session.lock() = Some(session);

        let resolver = SessionResolver::new(
            lookup.clone(),
            Arc::new(FixedBenchmark(dec!(97000))),
            PREFIX,
            900,
            Duration::from_secs(5),
        );
        let prices = PriceAggregator::new();
        let board = QuoteBoard::new();
        // Nothing listens here; the worker just sits in its reconnect delay
        let feed_template = WsConfig::new("ws://127.0.0.1:9").reconnect_delay(Duration::from_secs(60));
        let feeds = MarketFeedManager::new(board.clone(), feed_template);

        let dyn_venue: Arc<dyn ExecutionVenue> = venue.clone();
        let lifecycle = OrderLifecycle::new(
            Some(dyn_venue),
            store.clone(),
            true,
            config.trading.trade_size,
            config.trading.fill_timeout(),
        );
        let observer = Arc::new(Observer::new(store.clone(), ActivityLog::new(50)));
        let runner = Runner::new(
            &config,
            resolver,
            prices.clone(),
            feeds,
            lifecycle,
            store.clone(),
            observer.clone(),
        );

        Self {
            _dir: dir,
            store,
            venue,
            lookup,
            prices,
            board,
            observer,
            runner,
            token: CancellationToken::new(),
        }
    }

    pub fn quote(&self, token: &str, bid: Decimal, ask: Decimal) {
        self.board.apply(&QuoteUpdate {
            token_id: token.into(),
            best_bid: bid,
            best_ask: ask,
        });
    }

    pub fn reference(&self, price: Decimal) {
        self.prices.record("chainlink", price);
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
