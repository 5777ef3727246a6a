//! Entry order state machine
//!
//! `Idle -> Submitting -> Pending -> {Filled, TimedOut -> Cancelled, Failed}`,
//! then `Position -> exit` on stop-loss. Every transition is persisted through
//! the state store before returning.

use super::{ExecutionVenue, OrderId, OrderRequest, OrderSide, VenueError};
use crate::market::MarketSession;
use crate::signal::{dedup_key, Side, Tier};
use crate::state::{EventStatus, LastOrder, OrderEvent, PendingOrder, Position, StateStore, TradeEvent};
use crate::telemetry::{increment, CounterMetric, TRADE_TARGET};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

/// Result of checking the in-flight order
#[derive(Debug, Clone, PartialEq)]
pub enum PendingOutcome {
    /// Nothing in flight
    Idle,
    /// Younger than the fill timeout
    Waiting,
    Filled(Position),
    Cancelled { order_id: OrderId },
    /// Status query failed; retried next tick
    Unresolved,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryOutcome {
    Submitted(OrderId),
    Failed(String),
    /// Trading disabled; recommendation logged and dedup key consumed
    AlertOnly,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExitOutcome {
    NoPosition,
    Submitted(OrderId),
    Failed(String),
    /// No venue connected; position dropped and recommendation logged
    Recommended,
}

/// Drives one entry order and the resulting position
pub struct OrderLifecycle {
    venue: Option<Arc<dyn ExecutionVenue>>,
    store: Arc<StateStore>,
    trading_enabled: bool,
    trade_size: Decimal,
    fill_timeout: Duration,
}

impl OrderLifecycle {
    pub fn new(
        venue: Option<Arc<dyn ExecutionVenue>>,
        store: Arc<StateStore>,
        trading_enabled: bool,
        trade_size: Decimal,
        fill_timeout: Duration,
    ) -> Self {
        Self {
            venue,
            store,
            trading_enabled,
            trade_size,
            fill_timeout,
        }
    }

    pub fn trading_enabled(&self) -> bool {
        self.trading_enabled && self.venue.is_some()
    }

    /// Resolve an entry order older than the fill timeout
    ///
    /// Filled orders become the position; anything else is cancelled and
    /// dropped. The dedup key stays consumed either way.
    pub async fn check_pending(&self, now: DateTime<Utc>, divergence: Option<Decimal>) -> PendingOutcome {
        let Some(pending) = self.store.snapshot().pending_order else {
            return PendingOutcome::Idle;
        };

        let timed_out = pending
            .age(now)
            .to_std()
            .map(|age| age > self.fill_timeout)
            .unwrap_or(false);
        if !timed_out {
            return PendingOutcome::Waiting;
        }

        let Some(venue) = &self.venue else {
            tracing::warn!(order_id = %pending.order_id, "Dropping pending order, no venue connected");
            self.store.update(|s| s.pending_order = None);
            return PendingOutcome::Cancelled {
                order_id: pending.order_id,
            };
        };

        let filled = match venue.order_status(&pending.order_id).await {
            Ok(status) => status.is_filled(),
            Err(VenueError::NotFound(_)) => false,
            Err(e) => {
                tracing::warn!(order_id = %pending.order_id, error = %e, "Order status query failed");
                return PendingOutcome::Unresolved;
            }
        };

        if filled {
            let divergence = divergence.unwrap_or_default();
            let position = Position {
                session: pending.session.clone(),
                side: pending.side,
                entry_price: pending.price,
                entry_divergence: divergence.abs(),
            };
            self.store.update(|s| {
                s.pending_order = None;
                s.position = Some(position.clone());
                s.push_event(TradeEvent::Buy(OrderEvent {
                    time: now,
                    session: pending.session.clone(),
                    side: pending.side,
                    price: Some(pending.price),
                    amount: self.trade_size,
                    order_id: pending.order_id.clone(),
                    status: EventStatus::Filled,
                    reason: "pending_filled".into(),
                    divergence,
                }));
            });
            increment(CounterMetric::OrderFilled);
            tracing::info!(
                target: TRADE_TARGET,
                order_id = %pending.order_id,
                side = %pending.side,
                price = %pending.price,
                session = %pending.session,
                "Order filled, position open"
            );
            return PendingOutcome::Filled(position);
        }

        match venue.cancel_order(&pending.order_id).await {
            Ok(()) => tracing::info!(
                target: TRADE_TARGET,
                order_id = %pending.order_id,
                "Order not filled in time, cancelled"
            ),
            Err(e) => tracing::warn!(
                order_id = %pending.order_id,
                error = %e,
                "Cancel of unfilled order failed"
            ),
        }
        self.store.update(|s| s.pending_order = None);
        increment(CounterMetric::OrderCancelled);

        PendingOutcome::Cancelled {
            order_id: pending.order_id,
        }
    }

    /// Act on a fired trigger
    pub async fn submit_entry(
        &self,
        session: &MarketSession,
        tier: Tier,
        side: Side,
        price: Decimal,
        divergence: Decimal,
        now: DateTime<Utc>,
    ) -> EntryOutcome {
        let key = dedup_key(&session.slug, side);
        let last_order = LastOrder {
            key: key.clone(),
            time: now,
        };

        tracing::info!(
            target: TRADE_TARGET,
            %tier,
            side = %side,
            price = %price,
            divergence = %divergence,
            "Trigger fired"
        );

        let venue = match &self.venue {
            Some(venue) if self.trading_enabled => venue,
            _ => {
                tracing::info!(
                    target: TRADE_TARGET,
                    side = %side,
                    price = %price,
                    "Alert only: recommend BUY"
                );
                self.store.update(|s| s.last_order = Some(last_order));
                return EntryOutcome::AlertOnly;
            }
        };

        let request = OrderRequest {
            token_id: session.token_for(side).to_string(),
            side: OrderSide::Buy,
            price,
            size: self.trade_size,
        };
        let event = |order_id: &str, status| {
            TradeEvent::Buy(OrderEvent {
                time: now,
                session: session.slug.clone(),
                side,
                price: Some(price),
                amount: self.trade_size,
                order_id: order_id.to_string(),
                status,
                reason: tier.to_string(),
                divergence,
            })
        };

        match venue.place_order(&request).await {
            Ok(order_id) => {
                let pending = PendingOrder {
                    order_id: order_id.clone(),
                    session: session.slug.clone(),
                    side,
                    price,
                    submitted_at: now,
                };
                self.store.update(|s| {
                    s.pending_order = Some(pending);
                    s.last_order = Some(last_order);
                    s.push_event(event(&order_id, EventStatus::Submitted));
                });
                increment(CounterMetric::OrderSubmitted);
                tracing::info!(target: TRADE_TARGET, order_id = %order_id, "Order submitted, awaiting fill");
                EntryOutcome::Submitted(order_id)
            }
            Err(e) => {
                self.store.update(|s| {
                    s.last_order = Some(last_order);
                    s.push_event(event("", EventStatus::Failed));
                });
                increment(CounterMetric::OrderFailed);
                tracing::error!(side = %side, price = %price, error = %e, "Order placement failed");
                EntryOutcome::Failed(e.to_string())
            }
        }
    }

    /// Stop-loss exit of the held position
    ///
    /// The position is cleared whatever happens to the sell order.
    pub async fn exit_position(
        &self,
        session: &MarketSession,
        price: Option<Decimal>,
        divergence: Decimal,
        now: DateTime<Utc>,
    ) -> ExitOutcome {
        let Some(position) = self.store.snapshot().position else {
            return ExitOutcome::NoPosition;
        };

        increment(CounterMetric::StopLossExit);
        tracing::info!(
            target: TRADE_TARGET,
            side = %position.side,
            divergence = %divergence,
            "Stop-loss triggered"
        );

        let Some(venue) = &self.venue else {
            tracing::info!(
                target: TRADE_TARGET,
                side = %position.side,
                "Alert only: recommend SELL"
            );
            self.store.update(|s| s.position = None);
            return ExitOutcome::Recommended;
        };

        let result = match price {
            Some(price) => {
                let request = OrderRequest {
                    token_id: session.token_for(position.side).to_string(),
                    side: OrderSide::Sell,
                    price,
                    size: self.trade_size,
                };
                venue.place_order(&request).await
            }
            None => Err(VenueError::OrderRejected("no exit price available".into())),
        };

        let (order_id, status, outcome) = match result {
            Ok(id) => {
                tracing::info!(target: TRADE_TARGET, order_id = %id, "Stop-loss sell submitted");
                (id.clone(), EventStatus::Submitted, ExitOutcome::Submitted(id))
            }
            Err(e) => {
                increment(CounterMetric::OrderFailed);
                tracing::error!(side = %position.side, error = %e, "Stop-loss sell failed");
                (String::new(), EventStatus::Failed, ExitOutcome::Failed(e.to_string()))
            }
        };

        self.store.update(|s| {
            s.position = None;
            s.push_event(TradeEvent::Sell(OrderEvent {
                time: now,
                session: position.session.clone(),
                side: position.side,
                price,
                amount: self.trade_size,
                order_id,
                status,
                reason: "stop_loss".into(),
                divergence,
            }));
        });

        outcome
    }

    /// Drop all session-scoped state when the session rolls over
    ///
    /// An in-flight order from the old session gets one best-effort cancel.
    pub async fn abandon_session(&self) {
        let state = self.store.snapshot();

        if let (Some(pending), Some(venue)) = (&state.pending_order, &self.venue) {
            match venue.cancel_order(&pending.order_id).await {
                Ok(()) => tracing::info!(
                    target: TRADE_TARGET,
                    order_id = %pending.order_id,
                    "Cancelled pending order from previous session"
                ),
                Err(e) => tracing::warn!(
                    order_id = %pending.order_id,
                    error = %e,
                    "Could not cancel pending order from previous session"
                ),
            }
        }

        if state.position.is_some() || state.pending_order.is_some() || state.last_order.is_some() {
            self.store.update(|s| s.clear_session());
        }
    }
}
