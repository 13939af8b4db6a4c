//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Create the Axum Router with the dispatch handler and middleware
//!   (tracing, timeout, request ID, common response headers)
//! - Upgrade WebSocket requests to the negotiated protocol handler
//! - Serve static resources from the root directory
//! - Dispatch `/<service>/<path>` to webservice entry points
//! - Answer everything else with the 404 page
//! - Bind and serve (plain or TLS) until shutdown

use std::collections::{BTreeSet, HashMap};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ws::WebSocketUpgrade, ConnectInfo, FromRequestParts, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use percent_encoding::percent_decode_str;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::{set_header::SetResponseHeaderLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::{ServerConfig, TlsConfig};
use crate::http::header::HttpHeader;
use crate::http::mime::Mime;
use crate::http::request::{HttpRequest, RequestType};
use crate::http::request_id::{propagate_request_id_layer, request_id, set_request_id_layer};
use crate::http::resource::{self, resolve_resource_path};
use crate::http::response::HttpResponse;
use crate::http::webservice::{split_service_path, WebService};
use crate::http::websocket::{
    offered_protocols, run_session, ProtocolTable, SessionId, SessionInfo, SessionRegistry,
    WebsocketHandler,
};
use crate::lifecycle::Shutdown;
use crate::net::tls::load_tls_config;
use crate::observability::metrics;

const DEFAULT_POLL_FREQUENCY_HZ: f64 = 10.0;
const MAX_POLL_FREQUENCY_HZ: f64 = 1000.0;

pub const DEFAULT_NOT_FOUND_PAGE: &str = "<html><body><h1>404 file not found</h1></body></html>";

/// Errors from running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid bind address '{0}'")]
    BindAddress(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS setup failed: {0}")]
    Tls(std::io::Error),
}

/// Everything the dispatch handler needs, frozen once the server starts.
struct ServerState {
    config: ServerConfig,
    root_dir: Option<PathBuf>,
    webservices: HashMap<String, WebService>,
    websockets: ProtocolTable,
    resource_paths: BTreeSet<String>,
    mime: Mime,
    sessions: Arc<SessionRegistry>,
    shutdown: Shutdown,
    poll_interval: Duration,
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<ServerState>,
}

/// HTTP + WebSocket server.
pub struct HttpServer {
    config: ServerConfig,
    webservices: HashMap<String, WebService>,
    websockets: ProtocolTable,
    resource_paths: BTreeSet<String>,
    mime: Mime,
    sessions: Arc<SessionRegistry>,
    shutdown: Shutdown,
}

impl HttpServer {
    /// Create a new server with the given configuration.
    pub fn new(config: ServerConfig) -> Self {
        let resource_paths = config.http.resource_paths.iter().cloned().collect();
        Self {
            config,
            webservices: HashMap::new(),
            websockets: ProtocolTable::new(),
            resource_paths,
            mime: Mime::new(),
            sessions: Arc::new(SessionRegistry::new()),
            shutdown: Shutdown::new(),
        }
    }

    /// Mount a webservice under its name. Returns the webservice it replaced, if any.
    pub fn add_webservice(&mut self, webservice: WebService) -> Option<WebService> {
        tracing::debug!(
            service = %webservice.name(),
            entry_points = webservice.entry_points().len(),
            "Webservice added"
        );
        self.webservices
            .insert(webservice.name().to_string(), webservice)
    }

    /// Register a WebSocket sub-protocol handler.
    pub fn add_websocket(&mut self, protocol: impl Into<String>, handler: Arc<dyn WebsocketHandler>) {
        let protocol = protocol.into();
        tracing::debug!(protocol = %protocol, "WebSocket protocol added");
        self.websockets.add(protocol, handler);
    }

    pub fn add_resource_path(&mut self, name: impl Into<String>) -> bool {
        self.resource_paths.insert(name.into())
    }

    pub fn remove_resource_path(&mut self, name: &str) -> bool {
        self.resource_paths.remove(name)
    }

    pub fn mime_mut(&mut self) -> &mut Mime {
        &mut self.mime
    }

    /// Handle that stops the server when triggered.
    pub fn shutdown(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Registry of open WebSocket sessions.
    pub fn sessions(&self) -> Arc<SessionRegistry> {
        self.sessions.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn into_router(self) -> Router {
        let header_value = |value: &str, fallback: &'static str| {
            HeaderValue::from_str(value).unwrap_or_else(|_| HeaderValue::from_static(fallback))
        };
        let server_name = header_value(&self.config.http.server_name, "websrv");
        let charset = header_value(&self.config.http.encoding, "utf-8");
        let request_timeout = Duration::from_secs(self.config.timeouts.request_secs);
        let poll_interval = poll_interval(self.config.websocket.poll_frequency_hz);

        let state = AppState {
            inner: Arc::new(ServerState {
                root_dir: self.config.http.root_dir.as_ref().map(PathBuf::from),
                config: self.config,
                webservices: self.webservices,
                websockets: self.websockets,
                resource_paths: self.resource_paths,
                mime: self.mime,
                sessions: self.sessions,
                shutdown: self.shutdown,
                poll_interval,
            }),
        };

        Router::new()
            .fallback(dispatch)
            .with_state(state)
            .layer(SetResponseHeaderLayer::if_not_present(header::SERVER, server_name))
            .layer(SetResponseHeaderLayer::if_not_present(
                header::ACCESS_CONTROL_ALLOW_ORIGIN,
                HeaderValue::from_static("*"),
            ))
            .layer(SetResponseHeaderLayer::if_not_present(header::ACCEPT_CHARSET, charset))
            .layer(TimeoutLayer::new(request_timeout))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// Run the server on an already bound listener until shutdown is triggered.
    pub async fn run(self, listener: TcpListener) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            webservices = self.webservices.len(),
            protocols = ?self.websockets.names(),
            "HTTP server starting"
        );

        let shutdown = self.shutdown.clone();
        let app = self
            .into_router()
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run the server with TLS termination until shutdown is triggered.
    pub async fn run_tls(self, addr: SocketAddr, tls: &TlsConfig) -> Result<(), ServerError> {
        let rustls = load_tls_config(Path::new(&tls.cert_path), Path::new(&tls.key_path))
            .await
            .map_err(ServerError::Tls)?;

        tracing::info!(address = %addr, "HTTPS server starting");

        let handle = axum_server::Handle::new();
        let grace = Duration::from_secs(self.config.timeouts.shutdown_secs);
        let shutdown = self.shutdown.clone();
        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            shutdown.wait().await;
            shutdown_handle.graceful_shutdown(Some(grace));
        });

        let app = self
            .into_router()
            .into_make_service_with_connect_info::<SocketAddr>();
        axum_server::bind_rustls(addr, rustls)
            .handle(handle)
            .serve(app)
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }

    /// Bind the configured address and serve, with TLS when configured.
    pub async fn serve(self) -> Result<(), ServerError> {
        let bind_address = self.config.listener.bind_address.clone();
        let addr: SocketAddr = bind_address
            .parse()
            .map_err(|_| ServerError::BindAddress(bind_address))?;

        if let Some(tls) = self.config.listener.tls.clone() {
            return self.run_tls(addr, &tls).await;
        }

        let listener = TcpListener::bind(addr).await?;
        self.run(listener).await
    }
}

/// Handler poll period for `hz`, falling back to the default rate when `hz`
/// is not a positive number.
fn poll_interval(hz: f64) -> Duration {
    let hz = if hz.is_finite() && hz > 0.0 {
        hz.min(MAX_POLL_FREQUENCY_HZ)
    } else {
        tracing::warn!(hz, "Invalid WebSocket poll frequency, using default");
        DEFAULT_POLL_FREQUENCY_HZ
    };
    Duration::from_secs_f64(1.0 / hz)
}

/// Single entry point for every request.
async fn dispatch(State(state): State<AppState>, request: Request) -> Response {
    let start = Instant::now();
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    tracing::debug!(
        request_id = %request_id(&request),
        method = %method,
        path = %path,
        "Dispatching request"
    );

    let (response, service) = if is_websocket_upgrade(request.headers()) {
        (websocket_upgrade(&state, request, peer).await, "websocket".to_string())
    } else {
        serve_http(&state, request, peer).await
    };

    metrics::record_request(&method, response.status().as_u16(), &service, start);
    response
}

async fn serve_http(state: &AppState, request: Request, peer: Option<SocketAddr>) -> (Response, String) {
    let inner = &state.inner;

    let Some(request_type) = RequestType::from_method(request.method()) else {
        let response = (
            StatusCode::METHOD_NOT_ALLOWED,
            [(header::ALLOW, "GET, POST, PUT, DELETE")],
        )
            .into_response();
        return (response, "none".to_string());
    };

    // Decoded once; resource resolution still refuses `..` afterwards.
    let path = match percent_decode_str(request.uri().path()).decode_utf8() {
        Ok(path) => path.into_owned(),
        Err(e) => {
            tracing::debug!(path = %request.uri().path(), error = %e, "Path is not UTF-8 once decoded");
            return (not_found(inner).await, "none".to_string());
        }
    };

    if request_type == RequestType::Get {
        if let Some(root) = &inner.root_dir {
            if let Some(file) = resolve_resource_path(root, &path, &inner.resource_paths).await {
                return (serve_file(inner, &file).await, "static".to_string());
            }
        }
    }

    if let Some((service_name, rest)) = split_service_path(&path) {
        if let Some(service) = inner.webservices.get(service_name) {
            if service.has_entry_point(rest, request_type) {
                let response = serve_webservice(inner, service, rest, request_type, request, peer).await;
                return (response, service_name.to_string());
            }
            tracing::debug!(service = %service_name, path = %rest, method = %request_type, "No entry point");
        }
    }

    (not_found(inner).await, "none".to_string())
}

async fn serve_webservice(
    inner: &ServerState,
    service: &WebService,
    entry_path: &str,
    request_type: RequestType,
    request: Request,
    peer: Option<SocketAddr>,
) -> Response {
    let (parts, body) = request.into_parts();

    let mut http_request = HttpRequest::new(parts.uri.path(), request_type)
        .with_uri_args(HttpRequest::parse_uri_args(parts.uri.query()));
    if let Some(peer) = peer {
        http_request.set_client_ip(peer.ip().to_string());
    }

    // GET and DELETE bodies are never handed to entry points.
    if request_type.accepts_body() {
        let max = inner.config.limits.max_body_size;
        let declared = match declared_length(&parts.headers) {
            Ok(len) => len,
            Err(response) => return response,
        };
        if declared > max {
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
        if declared > 0 {
            match axum::body::to_bytes(body, max).await {
                Ok(bytes) => http_request.set_content(bytes.to_vec()),
                Err(e) => {
                    tracing::warn!(service = %service.name(), error = %e, "Failed to read request body");
                    return (StatusCode::BAD_REQUEST, "Failed to read request body").into_response();
                }
            }
        }
    }

    let mut response = HttpResponse::new();
    response
        .http_header_mut()
        .set_server(&inner.config.http.server_name)
        .set_accept_charset(&inner.config.http.encoding);
    service.call(entry_path, &http_request, &mut response);

    tracing::debug!(
        service = %service.name(),
        path = %entry_path,
        method = %request_type,
        status = %response.status(),
        "Webservice served"
    );
    response.into_response()
}

/// POST and PUT must announce their body size up front.
#[allow(clippy::result_large_err)]
fn declared_length(headers: &HeaderMap) -> Result<usize, Response> {
    let Some(value) = headers.get(header::CONTENT_LENGTH) else {
        return Err((StatusCode::LENGTH_REQUIRED, "Content-Length header required").into_response());
    };
    value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .ok_or_else(|| (StatusCode::BAD_REQUEST, "Content-Length header has no number").into_response())
}

async fn serve_file(inner: &ServerState, path: &Path) -> Response {
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            let content_type = HttpHeader::build_content_type(
                &inner.mime.get(resource::extension(path)),
                &inner.config.http.encoding,
            );
            (StatusCode::OK, [(header::CONTENT_TYPE, content_type)], bytes).into_response()
        }
        Err(e) => {
            tracing::error!(path = ?path, error = %e, "Failed to read static resource");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read resource").into_response()
        }
    }
}

async fn not_found(inner: &ServerState) -> Response {
    let content_type =
        HttpHeader::build_content_type(&inner.mime.get("html"), &inner.config.http.encoding);

    if let (Some(root), Some(page)) = (&inner.root_dir, &inner.config.http.not_found_path) {
        if let Some(file) = resolve_resource_path(root, page, &BTreeSet::new()).await {
            match tokio::fs::read(&file).await {
                Ok(bytes) => {
                    let content_type = HttpHeader::build_content_type(
                        &inner.mime.get(resource::extension(&file)),
                        &inner.config.http.encoding,
                    );
                    return (StatusCode::NOT_FOUND, [(header::CONTENT_TYPE, content_type)], bytes)
                        .into_response();
                }
                Err(e) => tracing::warn!(path = ?file, error = %e, "Failed to read 404 page"),
            }
        }
    }

    (
        StatusCode::NOT_FOUND,
        [(header::CONTENT_TYPE, content_type)],
        DEFAULT_NOT_FOUND_PAGE,
    )
        .into_response()
}

fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false)
}

async fn websocket_upgrade(state: &AppState, request: Request, peer: Option<SocketAddr>) -> Response {
    let inner = &state.inner;
    let offered = offered_protocols(request.headers());
    let selected = inner
        .websockets
        .negotiate(&offered, inner.config.websocket.default_protocol.as_deref());

    let Some((protocol, handler)) =
        selected.and_then(|p| inner.websockets.get(&p).map(|h| (p, h)))
    else {
        tracing::warn!(offered = ?offered, supported = ?inner.websockets.names(), "No WebSocket protocol matched");
        return (StatusCode::BAD_REQUEST, "No supported WebSocket protocol").into_response();
    };

    let (mut parts, _body) = request.into_parts();
    let upgrade = match WebSocketUpgrade::from_request_parts(&mut parts, state).await {
        Ok(upgrade) => upgrade,
        Err(rejection) => return rejection.into_response(),
    };

    let info = SessionInfo {
        id: SessionId::new(),
        protocol: protocol.clone(),
        peer,
    };
    tracing::info!(session = %info.id, protocol = %protocol, peer = ?peer, "WebSocket upgrade");

    let registry = inner.sessions.clone();
    let poll_interval = inner.poll_interval;
    let shutdown = inner.shutdown.clone();
    let mut response = upgrade
        .on_upgrade(move |socket| run_session(socket, info, handler, registry, poll_interval, shutdown));

    // Offers may span several header lines, so the selection is echoed here
    // rather than through `WebSocketUpgrade::protocols`, which reads only one.
    if !offered.is_empty() {
        if let Ok(value) = HeaderValue::from_str(&protocol) {
            response.headers_mut().insert(header::SEC_WEBSOCKET_PROTOCOL, value);
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use tower::ServiceExt;

    fn server() -> HttpServer {
        let mut server = HttpServer::new(ServerConfig::default());
        let mut ws = WebService::new("webservice");
        ws.get("get", |_req, resp| resp.set_plain_content("hello get world"));
        ws.post("post", |req, resp| {
            if req.has_content() {
                resp.set_plain_content(&req.content_str());
            } else {
                resp.set_status(StatusCode::BAD_REQUEST);
            }
        });
        ws.delete("delete", |req, resp| {
            resp.set_plain_content(&req.content().len().to_string());
        });
        server.add_webservice(ws);
        server
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_get_entry_point() {
        let app = server().into_router();
        let response = app
            .oneshot(Request::builder().uri("/webservice/get").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::SERVER], "websrv");
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(body_string(response).await, "hello get world");
    }

    #[tokio::test]
    async fn test_post_without_length_rejected() {
        let app = server().into_router();
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/webservice/post")
                    .body(Body::from("hello"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::LENGTH_REQUIRED);
    }

    #[tokio::test]
    async fn test_post_with_body() {
        let app = server().into_router();
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/webservice/post")
                    .header(header::CONTENT_LENGTH, "5")
                    .body(Body::from("hello"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "hello");
    }

    #[tokio::test]
    async fn test_post_bad_length() {
        let app = server().into_router();
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/webservice/post")
                    .header(header::CONTENT_LENGTH, "five")
                    .body(Body::from("hello"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_body_ignored() {
        let app = server().into_router();
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::DELETE)
                    .uri("/webservice/delete")
                    .header(header::CONTENT_LENGTH, "4")
                    .body(Body::from("body"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "0");
    }

    #[tokio::test]
    async fn test_unknown_paths_get_404_page() {
        for uri in ["/webservice/missing", "/nothing", "/webservice", "/other/get"] {
            let response = server()
                .into_router()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
            assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html; charset=utf-8");
            assert_eq!(body_string(response).await, DEFAULT_NOT_FOUND_PAGE);
        }
    }

    #[tokio::test]
    async fn test_wrong_method_falls_through() {
        let response = server()
            .into_router()
            .oneshot(
                Request::builder()
                    .method(Method::PUT)
                    .uri("/webservice/get")
                    .header(header::CONTENT_LENGTH, "0")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unsupported_method() {
        let response = server()
            .into_router()
            .oneshot(
                Request::builder()
                    .method(Method::PATCH)
                    .uri("/webservice/get")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_websocket_without_matching_protocol_rejected() {
        let response = server()
            .into_router()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(header::UPGRADE, "websocket")
                    .header(header::CONNECTION, "upgrade")
                    .header(header::SEC_WEBSOCKET_VERSION, "13")
                    .header(header::SEC_WEBSOCKET_KEY, "dGhlIHNhbXBsZSBub25jZQ==")
                    .header(header::SEC_WEBSOCKET_PROTOCOL, "chat")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_encoded_service_path() {
        let response = server()
            .into_router()
            .oneshot(Request::builder().uri("/webservice/g%65t").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "hello get world");

        let response = server()
            .into_router()
            .oneshot(Request::builder().uri("/webservice/%FF").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_webservice_uses_configured_charset() {
        let mut config = ServerConfig::default();
        config.http.encoding = "iso-8859-1".into();
        let mut server = HttpServer::new(config);
        let mut ws = WebService::new("webservice");
        ws.get("get", |_req, resp| resp.set_plain_content("hello get world"));
        server.add_webservice(ws);

        let response = server
            .into_router()
            .oneshot(Request::builder().uri("/webservice/get").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.headers()[header::ACCEPT_CHARSET], "iso-8859-1");
    }

    #[test]
    fn test_poll_interval_falls_back_on_bad_rates() {
        assert_eq!(poll_interval(10.0), Duration::from_millis(100));
        assert_eq!(poll_interval(0.0), Duration::from_millis(100));
        assert_eq!(poll_interval(-1.0), Duration::from_millis(100));
        assert_eq!(poll_interval(f64::NAN), Duration::from_millis(100));
        assert_eq!(poll_interval(f64::INFINITY), Duration::from_millis(100));
        assert_eq!(poll_interval(1e9), Duration::from_millis(1));
    }

    #[test]
    fn test_router_builds_with_zero_poll_rate() {
        let mut config = ServerConfig::default();
        config.websocket.poll_frequency_hz = 0.0;
        let _ = HttpServer::new(config).into_router();
    }

    #[test]
    fn test_resource_path_registration() {
        let mut server = server();
        assert!(server.add_resource_path("index.htm"));
        assert!(!server.add_resource_path("index.htm"));
        assert!(server.remove_resource_path("index.htm"));
        assert!(!server.remove_resource_path("index.htm"));
    }
}
