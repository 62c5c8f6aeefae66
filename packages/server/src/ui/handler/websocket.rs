//! WebSocket upgrade handler.

use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{ConnectInfo, State, ws::WebSocketUpgrade},
    http::HeaderMap,
    response::IntoResponse,
};

use super::lifecycle;
use crate::ui::state::AppState;

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let client_address = resolve_client_address(&headers, peer);
    tracing::debug!("Upgrading connection from {} (peer {})", client_address, peer);
    ws.on_upgrade(move |socket| lifecycle::run(socket, state, client_address))
}

/// Client address behind a reverse proxy: `X-Real-IP`, then the first
/// `X-Forwarded-For` entry, then the socket peer.
pub fn resolve_client_address(headers: &HeaderMap, peer: SocketAddr) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    if let Some(real_ip) = header("x-real-ip") {
        return real_ip.to_string();
    }
    if let Some(first) = header("x-forwarded-for")
        .and_then(|forwarded| forwarded.split(',').next())
        .map(str::trim)
        .filter(|first| !first.is_empty())
    {
        return first.to_string();
    }
    peer.ip().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> SocketAddr {
        "192.0.2.10:54321".parse().unwrap()
    }

    #[test]
    fn test_real_ip_header_wins() {
        // テスト項目: X-Real-IP があれば最優先で使われる
        // given (前提条件):
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("203.0.113.7"));
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("198.51.100.1, 10.0.0.1"),
        );

        // when (操作):
        let address = resolve_client_address(&headers, peer());

        // then (期待する結果):
        assert_eq!(address, "203.0.113.7");
    }

    #[test]
    fn test_first_forwarded_for_entry_is_used() {
        // テスト項目: X-Forwarded-For の先頭のアドレスが使われる
        // given (前提条件):
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static(" 198.51.100.1 , 10.0.0.1"),
        );

        // when (操作):
        let address = resolve_client_address(&headers, peer());

        // then (期待する結果):
        assert_eq!(address, "198.51.100.1");
    }

    #[test]
    fn test_peer_address_is_the_fallback() {
        // テスト項目: ヘッダーがなければソケットの接続元アドレスが使われる
        // given (前提条件):
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("  "));

        // when (操作):
        let address = resolve_client_address(&headers, peer());

        // then (期待する結果):
        assert_eq!(address, "192.0.2.10");
    }
}
