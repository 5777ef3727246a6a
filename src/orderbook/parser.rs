//! Market channel message parsing

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// Top-of-book change for one token
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteUpdate {
    pub token_id: String,
    pub best_bid: Decimal,
    pub best_ask: Decimal,
}

/// Subscription message for the market channel
#[derive(Debug, Serialize)]
struct SubscriptionMessage<'a> {
    assets_ids: &'a [String],
    #[serde(rename = "type")]
    msg_type: &'static str,
}

/// Build the subscription for a set of asset ids
pub fn subscription_message(assets_ids: &[String]) -> String {
    let msg = SubscriptionMessage {
        assets_ids,
        msg_type: "market",
    };
    serde_json::to_string(&msg).unwrap_or_default()
}

/// Order book snapshot
#[derive(Debug, Deserialize)]
struct BookEvent {
    asset_id: String,
    #[serde(default)]
    bids: Vec<BookLevel>,
    #[serde(default)]
    asks: Vec<BookLevel>,
}

#[derive(Debug, Deserialize)]
struct BookLevel {
    price: String,
}

/// Price changes message, each entry carries the new top of book
#[derive(Debug, Deserialize)]
struct PriceChangesMessage {
    asset_id: Option<String>,
    #[serde(default)]
    price_changes: Vec<PriceChange>,
}

#[derive(Debug, Deserialize)]
struct PriceChange {
    asset_id: Option<String>,
    best_bid: Option<String>,
    best_ask: Option<String>,
}

/// Parse a market channel frame into quote updates
///
/// Frames are a single event or an array of events. `book` snapshots yield
/// max bid / min ask when both sides are present; `price_change` entries
/// yield their reported best bid/ask when both are positive. Anything else,
/// including malformed JSON, yields nothing.
pub fn parse_market_message(text: &str) -> Vec<QuoteUpdate> {
    let events = match serde_json::from_str::<Value>(text) {
        Ok(Value::Array(items)) => items,
        Ok(event @ Value::Object(_)) => vec![event],
        _ => return Vec::new(),
    };

    events.into_iter().flat_map(parse_single_event).collect()
}

fn parse_single_event(event: Value) -> Vec<QuoteUpdate> {
    let event_type = event
        .get("event_type")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    match event_type.as_str() {
        "book" => serde_json::from_value::<BookEvent>(event)
            .ok()
            .and_then(book_to_update)
            .into_iter()
            .collect(),
        "price_change" => serde_json::from_value::<PriceChangesMessage>(event)
            .map(price_changes_to_updates)
            .unwrap_or_default(),
        _ => {
            tracing::trace!(event_type = %event_type, "Ignoring market event");
            Vec::new()
        }
    }
}

fn book_to_update(book: BookEvent) -> Option<QuoteUpdate> {
    fn prices(levels: &[BookLevel]) -> impl Iterator<Item = Decimal> + '_ {
        levels
            .iter()
            .filter_map(|l| Decimal::from_str(&l.price).ok())
    }

    let best_bid = prices(&book.bids).max()?;
    let best_ask = prices(&book.asks).min()?;

    Some(QuoteUpdate {
        token_id: book.asset_id,
        best_bid,
        best_ask,
    })
}

fn price_changes_to_updates(msg: PriceChangesMessage) -> Vec<QuoteUpdate> {
    let parent = msg.asset_id;
    msg.price_changes
        .into_iter()
        .filter_map(|change| {
            let token_id = change.asset_id.or_else(|| parent.clone())?;
            let best_bid = Decimal::from_str(change.best_bid.as_deref()?).ok()?;
            let best_ask = Decimal::from_str(change.best_ask.as_deref()?).ok()?;
            if best_bid <= Decimal::ZERO || best_ask <= Decimal::ZERO {
                return None;
            }
            Some(QuoteUpdate {
                token_id,
                best_bid,
                best_ask,
            })
        })
        .collect()
}
