//! Status command implementation

use crate::state::{StateStore, TradeEvent, TradeState};
use clap::Args;
use std::fmt::Write;
use std::path::Path;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Number of most recent history events to show
    #[arg(long, default_value_t = 10)]
    pub history: usize,

    /// Print the raw state record as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn execute(&self, state_path: &Path) -> anyhow::Result<()> {
        let Some(state) = StateStore::read(state_path)? else {
            println!("No state recorded at {}", state_path.display());
            return Ok(());
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&state)?);
        } else {
            print!("{}", render_status(&state, self.history));
        }
        Ok(())
    }
}

/// Human-readable summary of a state record
pub fn render_status(state: &TradeState, history: usize) -> String {
    let mut out = String::new();
    let updated = state
        .updated_at
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "never".to_string());
    let _ = writeln!(out, "poly-updown status (updated {updated})");

    match &state.position {
        Some(p) => {
            let _ = writeln!(
                out,
                "  Position: {} on {} @ {} (entry divergence {})",
                p.side, p.session, p.entry_price, p.entry_divergence
            );
        }
        None => {
            let _ = writeln!(out, "  Position: none");
        }
    }
    match &state.pending_order {
        Some(p) => {
            let _ = writeln!(
                out,
                "  Pending: {} {} @ {} since {}",
                p.order_id,
                p.side,
                p.price,
                p.submitted_at.to_rfc3339()
            );
        }
        None => {
            let _ = writeln!(out, "  Pending: none");
        }
    }
    let last = state.last_order_key().unwrap_or("none");
    let _ = writeln!(out, "  Last trigger: {last}");

    let fmt_price = |p: Option<rust_decimal::Decimal>| p.map_or("-".to_string(), |v| v.to_string());
    let _ = writeln!(
        out,
        "  Prices: benchmark {} reference {} up {} down {}",
        fmt_price(state.prices.benchmark),
        fmt_price(state.prices.reference),
        fmt_price(state.prices.up_price),
        fmt_price(state.prices.down_price)
    );
    let _ = writeln!(
        out,
        "  Redeem: enabled={} pending={} claimable={}",
        state.redeem.enabled, state.redeem.pending, state.redeem.claimable
    );

    let skip = state.history.len().saturating_sub(history);
    if history > 0 && !state.history.is_empty() {
        let _ = writeln!(out, "  History ({} of {}):", state.history.len() - skip, state.history.len());
        for event in &state.history[skip..] {
            let _ = writeln!(out, "    {}", describe(event));
        }
    }
    out
}

fn describe(event: &TradeEvent) -> String {
    let time = event.time().format("%Y-%m-%d %H:%M:%S");
    match event {
        TradeEvent::Buy(e) | TradeEvent::Sell(e) => {
            let action = if matches!(event, TradeEvent::Buy(_)) { "BUY" } else { "SELL" };
            let price = e.price.map_or("-".to_string(), |p| p.to_string());
            format!(
                "{time} {action} {} {} x{} @ {} [{:?}] {}",
                e.session, e.side, e.amount, price, e.status, e.reason
            )
        }
        TradeEvent::Redeem(e) => format!(
            "{time} REDEEM {} [{:?}] {}",
            e.condition_id, e.status, e.message
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Side;
    use crate::state::{EventStatus, OrderEvent, Position};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn buy(order_id: &str) -> TradeEvent {
        TradeEvent::Buy(OrderEvent {
            time: Utc::now(),
            session: "btc-updown-15m-1767638700".into(),
            side: Side::Up,
            price: Some(dec!(0.86)),
            amount: dec!(5),
            order_id: order_id.into(),
            status: EventStatus::Submitted,
            reason: "tier1".into(),
            divergence: dec!(65),
        })
    }

    #[test]
    fn test_render_status_limits_history() {
        let state = TradeState {
            position: Some(Position {
                session: "btc-updown-15m-1767638700".into(),
                side: Side::Up,
                entry_price: dec!(0.86),
                entry_divergence: dec!(90),
            }),
            history: vec![buy("a"), buy("b"), buy("c")],
            ..Default::default()
        };

        let out = render_status(&state, 2);
        assert!(out.contains("Position: UP on btc-updown-15m-1767638700 @ 0.86"));
        assert!(out.contains("Pending: none"));
        assert!(out.contains("History (2 of 3)"));
        assert_eq!(out.matches(" BUY ").count(), 2);
    }
}
