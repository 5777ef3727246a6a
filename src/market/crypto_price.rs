//! Benchmark (window open) price lookup

use super::{BenchmarkSource, MarketSession};
use crate::feed::decimal_from_json;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CryptoPriceResponse {
    #[serde(default)]
    open_price: Value,
}

/// Client for the crypto-price endpoint that publishes each window's open price
#[derive(Clone)]
pub struct CryptoPriceClient {
    url: String,
    symbol: String,
    variant: String,
    client: Client,
}

impl CryptoPriceClient {
    pub fn new(
        url: impl Into<String>,
        symbol: impl Into<String>,
        variant: impl Into<String>,
        client: Client,
    ) -> Self {
        Self {
            url: url.into(),
            symbol: symbol.into(),
            variant: variant.into(),
            client,
        }
    }

    fn query(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> [(&'static str, String); 4] {
        [
            ("symbol", self.symbol.clone()),
            ("eventStartTime", start.format(TIME_FORMAT).to_string()),
            ("variant", self.variant.clone()),
            ("endDate", end.format(TIME_FORMAT).to_string()),
        ]
    }

    /// Fetch the open price for the window `[start, end)`
    ///
    /// `Ok(None)` means the endpoint answered without a usable price yet.
    pub async fn fetch_open_price(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Option<Decimal>> {
        let query = self.query(start, end);
        tracing::debug!(url = %self.url, start = %query[1].1, end = %query[3].1, "Fetching benchmark price");

        let response = self
            .client
            .get(&self.url)
            .query(&query)
            .header("Accept", "application/json")
            .header("Referer", "https://polymarket.com/")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            anyhow::bail!("crypto-price error: {} - {}", status, snippet);
        }

        let body: CryptoPriceResponse = response.json().await?;
        Ok(parse_open_price(&body.open_price))
    }
}

fn parse_open_price(value: &Value) -> Option<Decimal> {
    decimal_from_json(value).filter(|p| *p > Decimal::ZERO)
}

#[async_trait]
impl BenchmarkSource for CryptoPriceClient {
    async fn fetch_benchmark(&self, session: &MarketSession) -> anyhow::Result<Option<Decimal>> {
        self.fetch_open_price(session.start_time, session.end_time)
            .await
    }
}
