//! Shared price snapshot fed by one reconnecting worker per feed

use super::{FeedSource, PricePoint, PriceSnapshot};
use crate::telemetry::{increment, CounterMetric};
use crate::ws::{WsClient, WsConfig, WsMessage};
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Thread-safe store of the latest price per feed
#[derive(Clone, Default)]
pub struct PriceAggregator {
    points: Arc<Mutex<HashMap<String, PricePoint>>>,
}

impl PriceAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn one isolated worker per source
    ///
    /// `template` carries the shared connection policy (reconnect delay, ping
    /// interval, proxy); url and subscription come from each source. Workers
    /// reconnect without limit until `token` is cancelled.
    pub fn start(
        &self,
        sources: Vec<Arc<dyn FeedSource>>,
        template: &WsConfig,
        token: CancellationToken,
    ) -> Vec<JoinHandle<()>> {
        sources
            .into_iter()
            .map(|source| {
                let config = template.for_endpoint(source.ws_url(), source.subscribe_message());

                tracing::info!(feed = source.name(), url = %config.url, "Starting price feed");

                let ws_rx = WsClient::new(config).connect(token.child_token());
                let aggregator = self.clone();
                tokio::spawn(async move {
                    aggregator.run_worker(source, ws_rx).await;
                })
            })
            .collect()
    }

    /// Apply one observed price under the lock
    pub fn record(&self, feed: &str, value: Decimal) {
        let point = PricePoint {
            value,
            observed_at: Utc::now(),
        };
        self.points.lock().insert(feed.to_string(), point);
    }

    /// Point-in-time copy of all prices
    pub fn snapshot(&self) -> PriceSnapshot {
        PriceSnapshot::new(self.points.lock().clone())
    }

    async fn run_worker(&self, source: Arc<dyn FeedSource>, mut ws_rx: mpsc::Receiver<WsMessage>) {
        let name = source.name().to_string();

        while let Some(msg) = ws_rx.recv().await {
            match msg {
                WsMessage::Text(text) => {
                    if let Some(price) = source.parse_message(&text) {
                        self.record(&name, price);
                        increment(CounterMetric::FeedMessage);
                    }
                }
                WsMessage::Connected => {
                    tracing::info!(feed = %name, "Price feed connected");
                }
                WsMessage::Reconnecting { attempt } => {
                    increment(CounterMetric::FeedReconnect);
                    tracing::warn!(feed = %name, attempt, "Price feed disconnected, reconnecting");
                }
                WsMessage::Disconnected => {
                    tracing::info!(feed = %name, "Price feed stopped");
                    break;
                }
            }
        }
    }
}
