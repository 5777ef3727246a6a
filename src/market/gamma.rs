//! Gamma API client for market discovery
//!
//! Looks up a 15-minute BTC up/down event by slug. The first outcome token is
//! UP, the second DOWN.

use super::{MarketSession, SessionLookup};
use crate::feed::decimal_from_json;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

/// Client for Polymarket's Gamma API
#[derive(Clone)]
pub struct GammaClient {
    base_url: String,
    client: Client,
}

impl GammaClient {
    pub fn new(base_url: impl Into<String>, client: Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Fetch the event for `slug` and convert it to a session
    pub async fn fetch_event(
        &self,
        slug: &str,
        window_start: i64,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<MarketSession>> {
        let url = format!("{}/events", self.base_url);

        tracing::debug!(url = %url, slug, "Fetching event from Gamma API");

        let response = self.client.get(&url).query(&[("slug", slug)]).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Gamma API error: {} - {}", status, body);
        }

        let events: Vec<GammaEvent> = response.json().await?;
        Ok(events
            .into_iter()
            .next()
            .and_then(|event| convert_event(event, slug, window_start, now)))
    }
}

#[async_trait]
impl SessionLookup for GammaClient {
    async fn fetch_session(
        &self,
        slug: &str,
        window_start: i64,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<MarketSession>> {
        self.fetch_event(slug, window_start, now).await
    }
}

/// Event response from Gamma API (one 15-minute window)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GammaEvent {
    #[serde(default)]
    closed: bool,
    start_time: Option<String>,
    end_date: Option<String>,
    #[serde(default)]
    markets: Vec<GammaMarket>,
}

/// Raw market response from Gamma API
///
/// List fields arrive either as JSON arrays or as JSON-encoded strings.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GammaMarket {
    condition_id: Option<String>,
    #[serde(default)]
    clob_token_ids: Value,
    #[serde(default)]
    outcome_prices: Value,
}

fn convert_event(
    event: GammaEvent,
    slug: &str,
    window_start: i64,
    now: DateTime<Utc>,
) -> Option<MarketSession> {
    if event.closed {
        return None;
    }

    let start_time = parse_time(event.start_time.as_deref()?)?;
    let end_time = parse_time(event.end_date.as_deref()?)?;
    if end_time.signed_duration_since(now).num_seconds() <= 0 {
        return None;
    }

    let market = event.markets.into_iter().next()?;
    let tokens = json_list(&market.clob_token_ids);
    let prices = json_list(&market.outcome_prices);

    let token = |i: usize| -> Option<String> {
        match tokens.get(i)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        }
    };
    let price = |i: usize| -> Option<Decimal> { prices.get(i).and_then(decimal_from_json) };

    Some(MarketSession {
        slug: slug.to_string(),
        window_start,
        start_time,
        end_time,
        up_token: token(0)?,
        down_token: token(1)?,
        condition_id: market.condition_id,
        up_price: price(0),
        down_price: price(1),
        benchmark: None,
    })
}

/// Read a list that may be a JSON array or a JSON-encoded string
fn json_list(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

fn parse_time(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
