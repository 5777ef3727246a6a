//! REST clients against a local HTTP responder

use chrono::{Duration, Utc};
use poly_updown::market::{CryptoPriceClient, GammaClient, SessionResolver};
use poly_updown::redeem::{DataApiClient, PositionSource};
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Serve `body` as JSON to every request; request lines are forwarded
async fn serve_json(body: String) -> (String, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                match stream.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => buf.extend_from_slice(&chunk[..n]),
                }
            }
            let request = String::from_utf8_lossy(&buf);
            let line = request.lines().next().unwrap_or_default().to_string();
            let _ = tx.send(line);

            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    });

    (format!("http://{addr}"), rx)
}

#[tokio::test]
async fn test_gamma_and_benchmark_resolve_session() {
    let now = Utc::now();
    let end = now + Duration::seconds(120);
    let event = json!([{
        "slug": "ignored",
        "closed": false,
        "startTime": (end - Duration::seconds(900)).to_rfc3339(),
        "endDate": end.to_rfc3339(),
        "markets": [{
            "conditionId": format!("0x{}", "ab".repeat(32)),
            "outcomePrices": ["0.55", "0.45"],
            "clobTokenIds": "[\"up-token\", \"down-token\"]"
        }]
    }]);
    let (gamma_url, mut gamma_requests) = serve_json(event.to_string()).await;
    let (price_url, mut price_requests) = serve_json(json!({"openPrice": 97123.45}).to_string()).await;

    let http = reqwest::Client::new();
    let mut resolver = SessionResolver::new(
        Arc::new(GammaClient::new(&gamma_url, http.clone())),
        Arc::new(CryptoPriceClient::new(&price_url, "BTC", "fifteen", http)),
        "btc-updown-15m",
        900,
        std::time::Duration::from_secs(5),
    );

    let session = resolver.poll(now).await.unwrap();
    let expected_slug = format!("btc-updown-15m-{}", resolver.current_session_id(now));
    assert_eq!(session.slug, expected_slug);
    assert_eq!(session.up_token, "up-token");
    assert_eq!(session.down_token, "down-token");
    assert_eq!(session.up_price, Some(dec!(0.55)));
    assert_eq!(session.benchmark, Some(dec!(97123.45)));

    let gamma_line = gamma_requests.recv().await.unwrap();
    assert!(gamma_line.starts_with(&format!("GET /events?slug={expected_slug}")));
    let price_line = price_requests.recv().await.unwrap();
    assert!(price_line.contains("symbol=BTC"));
    assert!(price_line.contains("variant=fifteen"));

    // Within the refresh interval nothing is fetched again
    let cached = resolver.poll(now + Duration::seconds(2)).await.unwrap();
    assert_eq!(cached.slug, session.slug);
    assert!(gamma_requests.try_recv().is_err());
}

#[tokio::test]
async fn test_data_api_positions() {
    let rows = json!([
        {"conditionId": format!("0x{}", "1".repeat(64)), "size": 5, "avgPrice": 0.86, "curPrice": 1, "redeemable": true},
        {"conditionId": format!("0x{}", "2".repeat(64)), "size": "2.5", "avgPrice": "0.4", "curPrice": "0.35", "redeemable": false},
        "garbage"
    ]);
    let (url, mut requests) = serve_json(rows.to_string()).await;

    let client = DataApiClient::new(&url, reqwest::Client::new());
    let positions = client.positions("0xfunder").await.unwrap();

    assert_eq!(positions.len(), 2);
    assert!(positions[0].redeemable);
    assert_eq!(positions[1].size, dec!(2.5));

    let line = requests.recv().await.unwrap();
    assert!(line.starts_with("GET /positions?user=0xfunder&sizeThreshold=0"));
}

#[tokio::test]
async fn test_data_api_closed_positions() {
    let rows = json!([
        {"conditionId": "0x01", "slug": "btc-updown-15m-1767638700", "size": 5, "realizedPnl": 0.7},
        {"condition_id": "0x02", "size": "3", "realized_pnl": "-1.2"}
    ]);
    let (url, mut requests) = serve_json(rows.to_string()).await;

    let client = DataApiClient::new(&url, reqwest::Client::new());
    let closed = client.closed_positions("0xfunder").await.unwrap();

    assert_eq!(closed.len(), 2);
    assert_eq!(closed[0].realized_pnl, Some(dec!(0.7)));
    assert_eq!(closed[1].realized_pnl, Some(dec!(-1.2)));

    let line = requests.recv().await.unwrap();
    assert!(line.starts_with(
        "GET /closed-positions?user=0xfunder&limit=200&offset=0&sortBy=TIMESTAMP&sortDirection=DESC"
    ));
}
