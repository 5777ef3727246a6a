//! Reconnecting socket worker

use super::proxy::open_tunnel;
use super::types::{WsConfig, WsError, WsMessage};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::{
    client_async_tls, connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};
use tokio_util::sync::CancellationToken;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How a healthy connection ended
enum Stop {
    Cancelled,
    ReceiverGone,
}

/// Owns one streaming endpoint and keeps it connected
pub struct WsClient {
    config: WsConfig,
}

impl WsClient {
    pub fn new(config: WsConfig) -> Self {
        Self { config }
    }

    /// Spawn the worker and hand back its event stream
    ///
    /// The worker reconnects after `reconnect_delay` for as long as the
    /// receiver is alive and `token` is not cancelled. It always finishes
    /// with a single [`WsMessage::Disconnected`].
    pub fn connect(self, token: CancellationToken) -> mpsc::Receiver<WsMessage> {
        let (tx, rx) = mpsc::channel(1024);
        tokio::spawn(async move {
            self.supervise(tx, token).await;
        });
        rx
    }

    async fn supervise(self, tx: mpsc::Sender<WsMessage>, token: CancellationToken) {
        let url = self.config.url.clone();
        let mut failures = 0u32;

        loop {
            let outcome = tokio::select! {
                _ = token.cancelled() => Ok(Stop::Cancelled),
                outcome = self.session(&tx, &mut failures) => outcome,
            };

            let error = match outcome {
                Ok(Stop::Cancelled) => {
                    tracing::debug!(url = %url, "Socket worker cancelled");
                    break;
                }
                Ok(Stop::ReceiverGone) => return,
                Err(e) => e,
            };

            failures += 1;
            tracing::warn!(url = %url, error = %error, attempt = failures, "Socket dropped");

            if tx.send(WsMessage::Reconnecting { attempt: failures }).await.is_err() {
                return;
            }

            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(self.config.reconnect_delay) => {}
            }
        }

        let _ = tx.send(WsMessage::Disconnected).await;
    }

    async fn open(&self) -> Result<WsStream, WsError> {
        let url = self.config.url.as_str();
        let stream = match &self.config.proxy {
            Some(proxy) => {
                let tunnel = open_tunnel(proxy, url).await?;
                client_async_tls(url, tunnel).await.map(|(s, _)| s)
            }
            None => connect_async(url).await.map(|(s, _)| s),
        };
        stream.map_err(|e| WsError::ConnectionFailed(e.to_string()))
    }

    /// One connected period, from handshake to drop
    async fn session(
        &self,
        tx: &mpsc::Sender<WsMessage>,
        failures: &mut u32,
    ) -> Result<Stop, WsError> {
        let stream = self.open().await?;
        let (mut sink, mut frames) = stream.split();

        if let Some(subscribe) = &self.config.subscribe_message {
            sink.send(Message::Text(subscribe.clone()))
                .await
                .map_err(|e| WsError::SendFailed(e.to_string()))?;
        }

        tracing::info!(
            url = %self.config.url,
            proxied = self.config.proxy.is_some(),
            "Socket connected"
        );
        *failures = 0;
        if tx.send(WsMessage::Connected).await.is_err() {
            return Ok(Stop::ReceiverGone);
        }

        let period = self.config.ping_interval;
        let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut last_heard = Instant::now();

        loop {
            tokio::select! {
                frame = frames.next() => {
                    let frame = match frame {
                        Some(Ok(frame)) => frame,
                        Some(Err(e)) => return Err(WsError::ConnectionFailed(e.to_string())),
                        None => return Err(WsError::Closed),
                    };
                    last_heard = Instant::now();
                    match frame {
                        Message::Text(text) => {
                            if tx.send(WsMessage::Text(text)).await.is_err() {
                                return Ok(Stop::ReceiverGone);
                            }
                        }
                        Message::Ping(data) => {
                            sink.send(Message::Pong(data))
                                .await
                                .map_err(|e| WsError::SendFailed(e.to_string()))?;
                        }
                        Message::Close(_) => return Err(WsError::Closed),
                        _ => {}
                    }
                }
                _ = heartbeat.tick() => {
                    let silent = last_heard.elapsed();
                    if silent > period * 2 {
                        return Err(WsError::Silent(silent));
                    }
                    sink.send(Message::Ping(Vec::new()))
                        .await
                        .map_err(|e| WsError::SendFailed(e.to_string()))?;
                }
            }
        }
    }
}
