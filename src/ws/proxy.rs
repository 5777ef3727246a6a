//! HTTP CONNECT tunnelling for WebSocket connections

use super::types::WsError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Url;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const MAX_RESPONSE_HEADER: usize = 8192;

/// Open a TCP tunnel to the host of `target` through the HTTP proxy at `proxy`
pub async fn open_tunnel(proxy: &str, target: &str) -> Result<TcpStream, WsError> {
    let proxy_url = Url::parse(proxy).map_err(|e| WsError::ProxyFailed(e.to_string()))?;
    let target_url = Url::parse(target).map_err(|e| WsError::ProxyFailed(e.to_string()))?;

    let proxy_host = proxy_url
        .host_str()
        .ok_or_else(|| WsError::ProxyFailed("proxy URL has no host".into()))?;
    let proxy_port = proxy_url.port_or_known_default().unwrap_or(8080);
    let target_host = target_url
        .host_str()
        .ok_or_else(|| WsError::ProxyFailed("target URL has no host".into()))?;
    let target_port = target_url
        .port_or_known_default()
        .ok_or_else(|| WsError::ProxyFailed("target URL has no port".into()))?;

    let mut stream = TcpStream::connect((proxy_host, proxy_port))
        .await
        .map_err(|e| WsError::ProxyFailed(e.to_string()))?;

    let request = build_connect_request(target_host, target_port, basic_auth(&proxy_url));
    stream
        .write_all(request.as_bytes())
        .await
        .map_err(|e| WsError::ProxyFailed(e.to_string()))?;

    let mut response = Vec::with_capacity(256);
    let mut chunk = [0u8; 512];
    while !response.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream
            .read(&mut chunk)
            .await
            .map_err(|e| WsError::ProxyFailed(e.to_string()))?;
        if n == 0 {
            return Err(WsError::ProxyFailed("proxy closed during CONNECT".into()));
        }
        response.extend_from_slice(&chunk[..n]);
        if response.len() > MAX_RESPONSE_HEADER {
            return Err(WsError::ProxyFailed("oversized CONNECT response".into()));
        }
    }

    let head = String::from_utf8_lossy(&response);
    match parse_connect_status(&head) {
        Some(200) => {
            tracing::debug!(proxy = %proxy_host, target = %target_host, "Proxy tunnel established");
            Ok(stream)
        }
        Some(code) => Err(WsError::ProxyFailed(format!("CONNECT returned {}", code))),
        None => Err(WsError::ProxyFailed("malformed CONNECT response".into())),
    }
}

fn basic_auth(proxy_url: &Url) -> Option<String> {
    if proxy_url.username().is_empty() {
        return None;
    }
    let credentials = format!(
        "{}:{}",
        proxy_url.username(),
        proxy_url.password().unwrap_or_default()
    );
    Some(STANDARD.encode(credentials))
}

fn build_connect_request(host: &str, port: u16, auth: Option<String>) -> String {
    let mut request = format!(
        "CONNECT {host}:{port} HTTP/1.1\r\nHost: {host}:{port}\r\nProxy-Connection: keep-alive\r\n"
    );
    if let Some(auth) = auth {
        request.push_str(&format!("Proxy-Authorization: Basic {}\r\n", auth));
    }
    request.push_str("\r\n");
    request
}

fn parse_connect_status(head: &str) -> Option<u16> {
    let status_line = head.lines().next()?;
    let mut parts = status_line.split_whitespace();
    let version = parts.next()?;
    if !version.starts_with("HTTP/") {
        return None;
    }
    parts.next()?.parse().ok()
}
