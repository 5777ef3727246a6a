//! Per-session market feed lifecycle

use super::{parse_market_message, subscription_message, QuoteBoard};
use crate::market::MarketSession;
use crate::ws::{WsClient, WsConfig, WsMessage};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct FeedWorker {
    slug: String,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns the order book subscription for the active session
///
/// Exactly one worker runs at a time. Rolling over to a new session stops the
/// old worker, clears the quote board and subscribes to the new tokens.
pub struct MarketFeedManager {
    board: QuoteBoard,
    template: WsConfig,
    worker: Option<FeedWorker>,
}

impl MarketFeedManager {
    pub fn new(board: QuoteBoard, template: WsConfig) -> Self {
        Self {
            board,
            template,
            worker: None,
        }
    }

    pub fn board(&self) -> &QuoteBoard {
        &self.board
    }

    /// Slug of the session currently subscribed
    pub fn active_slug(&self) -> Option<&str> {
        self.worker.as_ref().map(|w| w.slug.as_str())
    }

    /// Switch the subscription to `session`
    pub fn rollover(&mut self, session: &MarketSession, parent: &CancellationToken) {
        self.stop();
        self.board.clear();

        let assets = vec![session.up_token.clone(), session.down_token.clone()];
        let config = self
            .template
            .for_endpoint(self.template.url.clone(), Some(subscription_message(&assets)));

        let token = parent.child_token();
        let ws_rx = WsClient::new(config).connect(token.clone());
        let board = self.board.clone();
        let slug = session.slug.clone();

        tracing::info!(slug = %slug, up = %assets[0], down = %assets[1], "Subscribing to market feed");

        let handle = tokio::spawn(async move {
            Self::run_worker(board, assets, ws_rx).await;
        });

        self.worker = Some(FeedWorker {
            slug: session.slug.clone(),
            token,
            handle,
        });
    }

    /// Stop the current worker, if any
    pub fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            tracing::info!(slug = %worker.slug, "Stopping market feed");
            worker.token.cancel();
            worker.handle.abort();
        }
    }

    async fn run_worker(board: QuoteBoard, assets: Vec<String>, mut ws_rx: mpsc::Receiver<WsMessage>) {
        while let Some(msg) = ws_rx.recv().await {
            match msg {
                WsMessage::Text(text) => {
                    for update in parse_market_message(&text) {
                        if assets.contains(&update.token_id) {
                            board.apply(&update);
                        }
                    }
                }
                WsMessage::Connected => {
                    tracing::info!("Market feed connected");
                }
                WsMessage::Reconnecting { attempt } => {
                    tracing::warn!(attempt, "Market feed disconnected, reconnecting");
                }
                WsMessage::Disconnected => break,
            }
        }
    }
}

impl Drop for MarketFeedManager {
    fn drop(&mut self) {
        self.stop();
    }
}
