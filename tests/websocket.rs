//! WebSocket negotiation and sessions against a live server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use websrv::client::{ClientError, WebsocketClient};
use websrv::config::ServerConfig;
use websrv::demo::{DemoCounters, EchoHandler, ECHO_REPLY};
use websrv::http::websocket::Frame;
use websrv::http::HttpServer;

mod common;

fn offers(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_negotiates_first_supported_offer() {
    let server = common::start_server(ServerConfig::default()).await;

    let ws = WebsocketClient::connect(&server.ws_url(), &offers(&["chat", "proto-two", "websocket-protocol"]))
        .await
        .unwrap();
    assert_eq!(ws.protocol(), Some("proto-two"));

    let ws = WebsocketClient::connect(&server.ws_url(), &offers(&["websocket-protocol"]))
        .await
        .unwrap();
    assert_eq!(ws.protocol(), Some("websocket-protocol"));
}

/// Send a handshake with one `Sec-WebSocket-Protocol` line per entry of
/// `offer_lines` and return the response head.
async fn raw_handshake(addr: SocketAddr, offer_lines: &[&str]) -> String {
    let mut request = String::from(
        "GET / HTTP/1.1\r\nHost: localhost\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\
         Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\nSec-WebSocket-Version: 13\r\n",
    );
    for line in offer_lines {
        request.push_str(&format!("Sec-WebSocket-Protocol: {line}\r\n"));
    }
    request.push_str("\r\n");

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    tokio::time::timeout(Duration::from_secs(5), async {
        while !head.ends_with(b"\r\n\r\n") {
            if stream.read(&mut byte).await.unwrap() == 0 {
                break;
            }
            head.push(byte[0]);
        }
    })
    .await
    .unwrap();
    String::from_utf8_lossy(&head).to_ascii_lowercase()
}

#[tokio::test]
async fn test_offers_across_header_lines() {
    let server = common::start_server(ServerConfig::default()).await;

    let head = raw_handshake(server.addr, &["chat", "proto-two"]).await;
    assert!(head.starts_with("http/1.1 101"), "{head}");
    assert!(head.contains("sec-websocket-protocol: proto-two\r\n"), "{head}");

    let head = raw_handshake(server.addr, &["chat, superchat", "websocket-protocol"]).await;
    assert!(head.starts_with("http/1.1 101"), "{head}");
    assert!(head.contains("sec-websocket-protocol: websocket-protocol\r\n"), "{head}");

    let head = raw_handshake(server.addr, &["chat", "superchat"]).await;
    assert!(head.starts_with("http/1.1 400"), "{head}");
}

#[tokio::test]
async fn test_unknown_offers_rejected() {
    let server = common::start_server(ServerConfig::default()).await;

    let err = WebsocketClient::connect(&server.ws_url(), &offers(&["chat", "superchat"]))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, ClientError::WebSocket(_)), "{err}");
    assert_eq!(DemoCounters::load(&server.counters.ws_opened), 0);
}

#[tokio::test]
async fn test_no_offer_uses_default_protocol() {
    let server = common::start_server(ServerConfig::default()).await;
    assert!(WebsocketClient::connect(&server.ws_url(), &[]).await.is_err());

    let mut config = ServerConfig::default();
    config.websocket.default_protocol = Some("proto-two".into());
    let server = common::start_server(config).await;
    let ws = WebsocketClient::connect(&server.ws_url(), &[]).await.unwrap();
    // Nothing was offered, so nothing is echoed back.
    assert_eq!(ws.protocol(), None);
    let sessions = server.sessions.clone();
    assert!(common::eventually(|| sessions.count_protocol("proto-two") == 1).await);
}

#[tokio::test]
async fn test_session_echo_and_close() {
    let server = common::start_server(ServerConfig::default()).await;

    let ws = WebsocketClient::connect(&server.ws_url(), &offers(&["websocket-protocol"]))
        .await
        .unwrap()
        .with_idle_timeout(Duration::from_millis(500));

    let mut received = Vec::new();
    let summary = ws
        .run_session("hello from client", |frame| {
            received.push(frame.clone());
            false
        })
        .await
        .unwrap();

    assert_eq!(received, vec![Frame::text(ECHO_REPLY)]);
    assert_eq!(summary.frames_received, 1);
    assert_eq!(summary.protocol.as_deref(), Some("websocket-protocol"));

    let counters = server.counters.clone();
    assert!(common::eventually(|| DemoCounters::load(&counters.ws_closed) == 1).await);
    assert_eq!(DemoCounters::load(&server.counters.ws_frames), 1);
    assert_eq!(server.counters.client_texts(), vec!["hello from client".to_string()]);
    assert!(common::eventually(|| server.sessions.is_empty()).await);
}

#[tokio::test]
async fn test_idle_timeout_closes_session() {
    let server = common::start_server(ServerConfig::default()).await;

    let ws = WebsocketClient::connect(&server.ws_url(), &offers(&["proto-two"]))
        .await
        .unwrap()
        .with_idle_timeout(Duration::from_millis(300));

    let summary = ws.run_session("hello from client", |_| true).await.unwrap();
    assert_eq!(summary.frames_received, 1);
    assert_eq!(summary.close_reason.as_deref(), Some("idle timeout"));
    assert_eq!(DemoCounters::load(&server.counters.ws_frames), 1);
}

#[tokio::test]
async fn test_server_shutdown_closes_sessions() {
    let server = common::start_server(ServerConfig::default()).await;

    let ws = WebsocketClient::connect(&server.ws_url(), &offers(&["websocket-protocol"]))
        .await
        .unwrap()
        .with_idle_timeout(Duration::from_secs(5));

    let shutdown = server.shutdown.clone();
    let session = tokio::spawn(ws.run_session("hello from client", move |_| {
        shutdown.trigger();
        true
    }));

    let summary = tokio::time::timeout(Duration::from_secs(3), session)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(summary.frames_received, 1);
    assert_ne!(summary.close_reason.as_deref(), Some("idle timeout"));
}

#[tokio::test]
async fn test_session_opened_after_shutdown_closes() {
    let config = ServerConfig::default();
    let protocols = config.websocket.protocols.clone();
    let counters = DemoCounters::new();
    let mut server = HttpServer::new(config);
    let echo = Arc::new(EchoHandler::new(counters.clone()));
    for protocol in protocols {
        server.add_websocket(protocol, echo.clone());
    }
    server.shutdown().trigger();

    // Served without graceful shutdown so the upgrade still goes through.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = server.into_router().into_make_service_with_connect_info::<SocketAddr>();
    let serving = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let ws = WebsocketClient::connect(&format!("ws://{addr}/"), &offers(&["websocket-protocol"]))
        .await
        .unwrap()
        .with_idle_timeout(Duration::from_secs(5));
    let summary = tokio::time::timeout(Duration::from_secs(3), ws.run_session("hello from client", |_| true))
        .await
        .unwrap()
        .unwrap();
    assert_ne!(summary.close_reason.as_deref(), Some("idle timeout"));
    assert!(common::eventually(|| DemoCounters::load(&counters.ws_closed) == 1).await);

    serving.abort();
}
