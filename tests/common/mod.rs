//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use websrv::config::ServerConfig;
use websrv::demo::{demo_webservice, DemoCounters, EchoHandler};
use websrv::http::websocket::SessionRegistry;
use websrv::http::HttpServer;
use websrv::lifecycle::Shutdown;

/// A demo server running on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub counters: Arc<DemoCounters>,
    pub sessions: Arc<SessionRegistry>,
    pub shutdown: Shutdown,
}

#[allow(dead_code)]
impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}/{}", self.addr, path.trim_start_matches('/'))
    }

    pub fn base(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/", self.addr)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start the demo server with both webservices and the default protocols.
pub async fn start_server(config: ServerConfig) -> TestServer {
    start_server_with(config, |_| {}).await
}

/// Like `start_server`, with `extra` registering more endpoints before the
/// server starts.
pub async fn start_server_with<F>(mut config: ServerConfig, extra: F) -> TestServer
where
    F: FnOnce(&mut HttpServer),
{
    config.websocket.poll_frequency_hz = 100.0;
    let protocols = config.websocket.protocols.clone();

    let counters = DemoCounters::new();
    let mut server = HttpServer::new(config);
    server.add_webservice(demo_webservice("webservice", "", counters.clone()));
    server.add_webservice(demo_webservice("web", "some_", counters.clone()));
    let echo = Arc::new(EchoHandler::new(counters.clone()));
    for protocol in protocols {
        server.add_websocket(protocol, echo.clone());
    }
    extra(&mut server);

    let shutdown = server.shutdown();
    let sessions = server.sessions();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let _ = server.run(listener).await;
    });

    TestServer {
        addr,
        counters,
        sessions,
        shutdown,
    }
}

/// Poll `condition` until it holds or two seconds pass.
#[allow(dead_code)]
pub async fn eventually<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Send a raw HTTP/1.1 request and return the full reply. The request must
/// ask for `Connection: close`.
#[allow(dead_code)]
pub async fn raw_request(addr: SocketAddr, request: &[u8]) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request).await.unwrap();

    let mut reply = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut reply))
        .await
        .unwrap()
        .unwrap();
    String::from_utf8_lossy(&reply).into_owned()
}
