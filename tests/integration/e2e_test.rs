//! End-to-end decision loop scenarios

use crate::common::{session_at, Harness};
use chrono::Utc;
use poly_updown::execution::OrderSide;
use poly_updown::runner::TickOutcome;
use poly_updown::signal::{Decision, HoldReason, Side};
use poly_updown::state::{EventStatus, LastOrder, PendingOrder, Position, TradeEvent};
use rust_decimal_macros::dec;

fn seconds(n: i64) -> chrono::Duration {
    chrono::Duration::seconds(n)
}

#[tokio::test]
async fn test_tier1_fires_once_per_session_side() {
    let now = Utc::now();
    let mut h = Harness::new(session_at(now, 35));

    // First tick subscribes the session; no reference yet
    let first = h.runner.tick(now, &h.token).await;
    assert_eq!(first, TickOutcome::Evaluated(Decision::Hold(HoldReason::Waiting)));

    h.quote("token-up", dec!(0.85), dec!(0.86));
    h.quote("token-down", dec!(0.14), dec!(0.15));
    h.reference(dec!(97065));

    let fired = h.runner.tick(now, &h.token).await;
    match fired {
        TickOutcome::Evaluated(Decision::Enter { side, price, tier, .. }) => {
            assert_eq!(side, Side::Up);
            assert_eq!(price, dec!(0.86));
            assert_eq!(tier.index, 1);
        }
        other => panic!("expected entry, got {other:?}"),
    }

    let placed = h.venue.placed.lock().clone();
    assert_eq!(placed.len(), 1);
    assert_eq!(placed[0].token_id, "token-up");
    assert_eq!(placed[0].side, OrderSide::Buy);

    // Order is cancelled unfilled, then the same signal persists
    let later = now + seconds(11);
    h.reference(dec!(97065));
    let after_cancel = h.runner.tick(later, &h.token).await;
    assert!(matches!(
        after_cancel,
        TickOutcome::Evaluated(Decision::Suppressed { side: Side::Up, .. })
    ));

    assert_eq!(h.venue.placed.lock().len(), 1);
    assert_eq!(h.venue.cancelled.lock().as_slice(), ["order-1".to_string()]);
    let state = h.store.snapshot();
    assert!(state.pending_order.is_none());
    assert!(state.position.is_none());
}

#[tokio::test]
async fn test_fill_then_stop_loss_exit() {
    let now = Utc::now();
    let mut h = Harness::new(session_at(now, 50));
    *h.venue.fill.lock() = true;

    h.runner.tick(now, &h.token).await;
    h.quote("token-down", dec!(0.10), dec!(0.12));
    h.reference(dec!(96910));

    let fired = h.runner.tick(now, &h.token).await;
    assert!(matches!(
        fired,
        TickOutcome::Evaluated(Decision::Enter { side: Side::Down, .. })
    ));

    // Pending is resolved as filled; the position is then held
    h.reference(dec!(96910));
    let held = h.runner.tick(now + seconds(11), &h.token).await;
    assert_eq!(held, TickOutcome::Evaluated(Decision::Hold(HoldReason::Holding)));
    let position = h.store.snapshot().position.unwrap();
    assert_eq!(position.side, Side::Down);
    assert_eq!(position.entry_divergence, dec!(90));

    // Divergence collapses below the stop-loss threshold
    h.quote("token-down", dec!(0.31), dec!(0.33));
    h.reference(dec!(96965));
    let exit = h.runner.tick(now + seconds(12), &h.token).await;
    assert!(matches!(
        exit,
        TickOutcome::Evaluated(Decision::StopLoss { side: Side::Down, .. })
    ));

    let placed = h.venue.placed.lock().clone();
    assert_eq!(placed.len(), 2);
    assert_eq!(placed[1].side, OrderSide::Sell);
    assert_eq!(placed[1].token_id, "token-down");
    assert_eq!(placed[1].price, dec!(0.31));

    let state = h.store.snapshot();
    assert!(state.position.is_none());
    let statuses: Vec<_> = state.history.iter().map(|e| e.status()).collect();
    assert_eq!(
        statuses,
        vec![EventStatus::Submitted, EventStatus::Filled, EventStatus::Submitted]
    );
    assert!(matches!(state.history.last(), Some(TradeEvent::Sell(_))));

    // Nothing held anymore; the exit does not repeat
    h.reference(dec!(96965));
    let after = h.runner.tick(now + seconds(13), &h.token).await;
    assert!(!matches!(after, TickOutcome::Evaluated(Decision::StopLoss { .. })));
    assert_eq!(h.venue.placed.lock().len(), 2);
}

#[tokio::test]
async fn test_stale_reference_exits_held_position() {
    let now = Utc::now();
    let mut h = Harness::new(session_at(now, 60));
    *h.venue.fill.lock() = true;

    h.runner.tick(now, &h.token).await;
    h.quote("token-up", dec!(0.85), dec!(0.86));
    h.reference(dec!(97090));
    h.runner.tick(now, &h.token).await;

    h.reference(dec!(97090));
    let held = h.runner.tick(now + seconds(11), &h.token).await;
    assert_eq!(held, TickOutcome::Evaluated(Decision::Hold(HoldReason::Holding)));

    // Chainlink goes quiet past the staleness bound while the position is open
    let exit = h.runner.tick(now + seconds(45), &h.token).await;
    assert_eq!(
        exit,
        TickOutcome::Evaluated(Decision::StopLoss {
            side: Side::Up,
            price: Some(dec!(0.85)),
            divergence: dec!(0),
        })
    );

    let placed = h.venue.placed.lock().clone();
    assert_eq!(placed.len(), 2);
    assert_eq!(placed[1].side, OrderSide::Sell);
    assert!(h.store.snapshot().position.is_none());
}

#[tokio::test]
async fn test_restart_resumes_position_of_same_session() {
    let now = Utc::now();
    let session = session_at(now, 200);
    let slug = session.slug.clone();
    let mut h = Harness::with_store(session, |store| {
        store.update(|s| {
            s.position = Some(Position {
                session: slug.clone(),
                side: Side::Up,
                entry_price: dec!(0.86),
                entry_divergence: dec!(90),
            });
            s.last_order = Some(LastOrder {
                key: format!("{slug}|UP"),
                time: now,
            });
        })
    });

    h.runner.tick(now, &h.token).await;
    assert!(h.store.snapshot().position.is_some());

    h.quote("token-up", dec!(0.70), dec!(0.72));
    h.reference(dec!(97035));
    let exit = h.runner.tick(now, &h.token).await;
    assert!(matches!(
        exit,
        TickOutcome::Evaluated(Decision::StopLoss { side: Side::Up, .. })
    ));
    assert!(h.store.snapshot().position.is_none());
}

#[tokio::test]
async fn test_rollover_clears_previous_session_state() {
    let now = Utc::now();
    let session = session_at(now, 300);
    let mut h = Harness::with_store(session.clone(), |store| {
        store.update(|s| {
            s.pending_order = Some(PendingOrder {
                order_id: "stale-order".into(),
                session: "btc-updown-15m-1767637800".into(),
                side: Side::Down,
                price: dec!(0.2),
                submitted_at: now - seconds(600),
            });
            s.position = Some(Position {
                session: "btc-updown-15m-1767637800".into(),
                side: Side::Up,
                entry_price: dec!(0.86),
                entry_divergence: dec!(90),
            });
        })
    });

    h.runner.tick(now, &h.token).await;

    assert_eq!(h.venue.cancelled.lock().as_slice(), ["stale-order".to_string()]);
    let state = h.store.snapshot();
    assert!(state.pending_order.is_none());
    assert!(state.position.is_none());
    assert!(state.last_order.is_none());

    let market = h.observer.snapshot().market.unwrap();
    assert_eq!(market.session.slug, session.slug);
    assert_eq!(market.session.benchmark, Some(dec!(97000)));
}

#[tokio::test]
async fn test_session_change_mid_run_rolls_over() {
    let now = Utc::now();
    let mut h = Harness::new(session_at(now, 35));

    h.runner.tick(now, &h.token).await;
    h.quote("token-up", dec!(0.85), dec!(0.86));
    h.reference(dec!(97065));
    h.runner.tick(now, &h.token).await;
    assert!(h.store.snapshot().pending_order.is_some());

    let mut next = session_at(now, 900);
    next.slug = "btc-updown-15m-next".into();
    *h.lookup.session.lock() = Some(next);

    h.reference(dec!(97065));
    let outcome = h.runner.tick(now + seconds(6), &h.token).await;

    // The new window is far from any tier; the old order is gone
    assert_eq!(outcome, TickOutcome::Evaluated(Decision::Hold(HoldReason::NoTrigger)));
    let state = h.store.snapshot();
    assert!(state.pending_order.is_none());
    assert!(state.last_order.is_none());
    assert_eq!(h.venue.cancelled.lock().len(), 1);
}

#[tokio::test]
async fn test_price_mirror_is_persisted() {
    let now = Utc::now();
    let mut h = Harness::new(session_at(now, 500));

    h.runner.tick(now, &h.token).await;
    h.quote("token-up", dec!(0.50), dec!(0.52));
    h.reference(dec!(97010));
    h.runner.tick(now, &h.token).await;

    let prices = h.observer.snapshot().prices;
    assert_eq!(prices.benchmark, Some(dec!(97000)));
    assert_eq!(prices.reference, Some(dec!(97010)));
    assert_eq!(prices.up_price, Some(dec!(0.51)));
    assert_eq!(prices.down_price, Some(dec!(0.20)));
}
