//! Price feed workers against a local WebSocket server

use futures_util::{SinkExt, StreamExt};
use poly_updown::feed::{BinanceFeed, ChainlinkFeed, FeedSource, PriceAggregator};
use poly_updown::ws::WsConfig;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

/// Accept one client, hand its first frame to `first`, then send `frames`
async fn serve_frames(
    frames: Vec<String>,
    first: tokio::sync::oneshot::Sender<Option<String>>,
    expect_subscribe: bool,
) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        let subscribe = if expect_subscribe {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => Some(text),
                _ => None,
            }
        } else {
            None
        };
        let _ = first.send(subscribe);

        for frame in frames {
            ws.send(Message::Text(frame)).await.unwrap();
        }
        // Hold the connection open until the client goes away
        while ws.next().await.is_some() {}
    });

    format!("ws://{addr}")
}

async fn wait_for_price(prices: &PriceAggregator, feed: &str) -> Option<Decimal> {
    for _ in 0..100 {
        if let Some(point) = prices.snapshot().get(feed) {
            return Some(point.value);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    None
}

#[tokio::test]
async fn test_binance_worker_records_trades() {
    let (first_tx, _first_rx) = tokio::sync::oneshot::channel();
    let frames = vec![
        r#"{"e":"aggTrade","p":"1"}"#.to_string(),
        r#"{"e":"trade","E":1,"s":"BTCUSDT","p":"97012.55","q":"0.01"}"#.to_string(),
    ];
    let url = serve_frames(frames, first_tx, false).await;

    let prices = PriceAggregator::new();
    let token = CancellationToken::new();
    let sources: Vec<Arc<dyn FeedSource>> = vec![Arc::new(BinanceFeed::new(url, "BTCUSDT"))];
    let template = WsConfig::new("").reconnect_delay(Duration::from_millis(100));
    prices.start(sources, &template, token.clone());

    assert_eq!(wait_for_price(&prices, BinanceFeed::NAME).await, Some(dec!(97012.55)));
    token.cancel();
}

#[tokio::test]
async fn test_chainlink_worker_subscribes_then_records() {
    let (first_tx, first_rx) = tokio::sync::oneshot::channel();
    let frames = vec![
        r#"{"topic":"crypto_prices_chainlink","type":"update","payload":{"symbol":"eth/usd","value":3500.1}}"#.to_string(),
        r#"{"topic":"crypto_prices_chainlink","type":"update","payload":{"symbol":"btc/usd","value":96950.25}}"#.to_string(),
    ];
    let url = serve_frames(frames, first_tx, true).await;

    let prices = PriceAggregator::new();
    let token = CancellationToken::new();
    let sources: Vec<Arc<dyn FeedSource>> = vec![Arc::new(ChainlinkFeed::new(url, "btc/usd"))];
    let template = WsConfig::new("").reconnect_delay(Duration::from_millis(100));
    prices.start(sources, &template, token.clone());

    let subscribe = first_rx.await.unwrap().unwrap();
    let sub: serde_json::Value = serde_json::from_str(&subscribe).unwrap();
    assert_eq!(sub["subscriptions"][0]["topic"], "crypto_prices_chainlink");

    assert_eq!(wait_for_price(&prices, ChainlinkFeed::NAME).await, Some(dec!(96950.25)));
    token.cancel();
}

#[test]
fn test_snapshot_staleness_bound() {
    let prices = PriceAggregator::new();
    prices.record("chainlink", dec!(97000));
    prices.record("binance", dec!(0));

    let snapshot = prices.snapshot();
    let now = chrono::Utc::now();
    let max_age = Duration::from_secs(30);

    assert_eq!(snapshot.price("chainlink", now, max_age), Some(dec!(97000)));
    assert_eq!(snapshot.price("binance", now, max_age), None);
    assert_eq!(
        snapshot.price("chainlink", now + chrono::Duration::seconds(31), max_age),
        None
    );
    assert_eq!(snapshot.price("missing", now, max_age), None);
}
