//! Main decision loop
//!
//! One task owns every order side effect. Each tick resolves the session,
//! rolls the market feed over when the slug changes, settles any aged
//! pending order, evaluates the trigger and acts on the decision.

use crate::config::Config;
use crate::execution::OrderLifecycle;
use crate::feed::{BinanceFeed, PriceAggregator};
use crate::market::{MarketSession, SessionResolver};
use crate::observer::{MarketView, Observer};
use crate::orderbook::MarketFeedManager;
use crate::signal::{Decision, HoldReason, Side, TriggerEngine, TriggerInput};
use crate::state::{PriceMirror, StateStore, TradeState};
use crate::telemetry::{increment, set_gauge, CounterMetric, GaugeMetric};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// What a tick did
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// No active session
    Idle,
    Evaluated(Decision),
}

pub struct Runner {
    resolver: SessionResolver,
    prices: PriceAggregator,
    feeds: MarketFeedManager,
    engine: TriggerEngine,
    lifecycle: OrderLifecycle,
    store: Arc<StateStore>,
    observer: Arc<Observer>,
    reference_feed: String,
    max_age: Duration,
    poll_interval: Duration,
    idle_sleep: Duration,
    active_slug: Option<String>,
}

impl Runner {
    pub fn new(
        config: &Config,
        resolver: SessionResolver,
        prices: PriceAggregator,
        feeds: MarketFeedManager,
        lifecycle: OrderLifecycle,
        store: Arc<StateStore>,
        observer: Arc<Observer>,
    ) -> Self {
        Self {
            resolver,
            prices,
            feeds,
            engine: TriggerEngine::from_config(&config.tiers, config.trading.stop_loss_divergence),
            lifecycle,
            store,
            observer,
            reference_feed: config.feeds.reference.clone(),
            max_age: config.feeds.max_age(),
            poll_interval: config.trading.poll_interval(),
            idle_sleep: config.trading.idle_sleep(),
            active_slug: None,
        }
    }

    pub fn engine(&self) -> &TriggerEngine {
        &self.engine
    }

    /// Tick until `token` is cancelled
    ///
    /// A tick in progress always completes; in-flight venue calls are never
    /// aborted.
    pub async fn run(mut self, token: CancellationToken) -> anyhow::Result<()> {
        self.log_banner();

        while !token.is_cancelled() {
            let delay = match self.tick(Utc::now(), &token).await {
                TickOutcome::Idle => self.idle_sleep,
                TickOutcome::Evaluated(_) => self.poll_interval,
            };

            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.feeds.stop();
        tracing::info!("Decision loop stopped");
        Ok(())
    }

    pub async fn tick(&mut self, now: DateTime<Utc>, token: &CancellationToken) -> TickOutcome {
        let Some(session) = self.resolver.poll(now).await else {
            self.observer.set_market(None);
            return TickOutcome::Idle;
        };

        if self.active_slug.as_deref() != Some(session.slug.as_str()) {
            self.roll_over(&session, token).await;
        }

        let snapshot = self.prices.snapshot();
        let reference = snapshot.price(&self.reference_feed, now, self.max_age);
        let binance = snapshot.price(BinanceFeed::NAME, now, self.max_age);
        let divergence = TriggerEngine::divergence(reference, session.benchmark);
        let remaining_secs = session.remaining_secs(now);

        self.lifecycle.check_pending(now, divergence).await;

        let board = self.feeds.board();
        let up_quote = board.quote(&session.up_token);
        let down_quote = board.quote(&session.down_token);

        let state = self.store.snapshot();
        let input = TriggerInput {
            session: &session,
            remaining_secs,
            reference,
            up_quote,
            down_quote,
            position: state.position.as_ref(),
            pending: state.pending_order.as_ref(),
            last_order_key: state.last_order_key(),
        };
        let decision = self.engine.evaluate(&input);

        match &decision {
            Decision::Enter {
                tier,
                side,
                price,
                divergence,
            } => {
                self.lifecycle
                    .submit_entry(&session, *tier, *side, *price, *divergence, now)
                    .await;
            }
            Decision::StopLoss {
                price, divergence, ..
            } => {
                self.lifecycle
                    .exit_position(&session, *price, *divergence, now)
                    .await;
            }
            Decision::Suppressed { tier, side } => {
                tracing::debug!(%tier, side = %side, "Trigger already fired for this session");
            }
            Decision::Hold(HoldReason::NoQuote) => {
                tracing::debug!(slug = %session.slug, "Trigger met but no entry price available");
            }
            Decision::Hold(_) => {}
        }

        let mid = |side: Side, quote: Option<crate::orderbook::TokenQuote>| {
            quote
                .map(|q| q.mid)
                .filter(|m| *m > Decimal::ZERO)
                .or_else(|| session.fallback_price(side))
        };
        let mirror = PriceMirror {
            benchmark: session.benchmark,
            reference,
            binance,
            up_price: mid(Side::Up, up_quote),
            down_price: mid(Side::Down, down_quote),
        };
        self.store.set_prices(mirror.clone());
        self.observer.set_prices(mirror);
        self.observer.set_market(Some(MarketView {
            session: session.clone(),
            remaining_secs,
            divergence,
        }));
        self.publish_gauges(remaining_secs, reference, session.benchmark, divergence);

        TickOutcome::Evaluated(decision)
    }

    async fn roll_over(&mut self, session: &MarketSession, token: &CancellationToken) {
        let state = self.store.snapshot();
        if holds_other_session(&state, &session.slug) {
            tracing::info!(
                next = %session.slug,
                "Clearing trading state from previous session"
            );
            self.lifecycle.abandon_session().await;
        }

        if let Some(previous) = self.active_slug.replace(session.slug.clone()) {
            increment(CounterMetric::SessionRollover);
            tracing::info!(previous = %previous, next = %session.slug, "Session rollover");
        }

        self.feeds.rollover(session, token);
    }

    fn publish_gauges(
        &self,
        remaining_secs: i64,
        reference: Option<Decimal>,
        benchmark: Option<Decimal>,
        divergence: Option<Decimal>,
    ) {
        let as_f64 = |v: Option<Decimal>| v.and_then(|d| d.to_f64()).unwrap_or(0.0);
        set_gauge(GaugeMetric::RemainingSecs, remaining_secs as f64);
        set_gauge(GaugeMetric::ReferencePrice, as_f64(reference));
        set_gauge(GaugeMetric::BenchmarkPrice, as_f64(benchmark));
        set_gauge(GaugeMetric::Divergence, as_f64(divergence));

        let state = self.store.snapshot();
        set_gauge(GaugeMetric::OpenPosition, f64::from(u8::from(state.position.is_some())));
        set_gauge(GaugeMetric::PendingOrder, f64::from(u8::from(state.pending_order.is_some())));
    }

    fn log_banner(&self) {
        let [t1, t2, t3] = self.engine.tiers();
        tracing::info!(
            trading = self.lifecycle.trading_enabled(),
            reference = %self.reference_feed,
            tier1 = %t1,
            tier2 = %t2,
            tier3 = %t3,
            stop_loss = %self.engine.stop_loss(),
            poll_ms = self.poll_interval.as_millis() as u64,
            "Decision loop starting"
        );
        if !self.lifecycle.trading_enabled() {
            tracing::warn!("Trading disabled, triggers are reported as alerts only");
        }
    }
}

/// True when persisted trading state belongs to a session other than `slug`
fn holds_other_session(state: &TradeState, slug: &str) -> bool {
    let other = |session: &str| session != slug;
    state.position.as_ref().is_some_and(|p| other(&p.session))
        || state.pending_order.as_ref().is_some_and(|p| other(&p.session))
        || state
            .last_order
            .as_ref()
            .is_some_and(|o| !o.key.starts_with(&format!("{slug}|")))
}
