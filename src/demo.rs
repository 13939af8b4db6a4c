//! Demo endpoints served by the `websrv` binary and the integration tests.
//!
//! Two webservices expose the same four entry points under different
//! names (`webservice/get` and `web/some_get`, ...). The echo WebSocket
//! handler answers every client frame with one `hello world` frame.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::http::StatusCode;
use dashmap::DashMap;

use crate::http::websocket::{Frame, SessionId, SessionInfo, WebsocketHandler};
use crate::http::{HttpRequest, HttpResponse, WebService};

pub const GET_REPLY: &str = "hello get world";
pub const ECHO_REPLY: &str = "hello world";

/// Hit counters shared between the demo endpoints and whoever inspects them.
#[derive(Debug, Default)]
pub struct DemoCounters {
    pub get: AtomicUsize,
    pub post: AtomicUsize,
    pub put: AtomicUsize,
    pub delete: AtomicUsize,
    pub ws_opened: AtomicUsize,
    pub ws_frames: AtomicUsize,
    pub ws_closed: AtomicUsize,
    /// Text frames written by WebSocket clients, in arrival order.
    client_texts: Mutex<Vec<String>>,
}

impl DemoCounters {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn load(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn client_texts(&self) -> Vec<String> {
        self.client_texts
            .lock()
            .map(|texts| texts.clone())
            .unwrap_or_default()
    }

    fn record_text(&self, text: &str) {
        if let Ok(mut texts) = self.client_texts.lock() {
            texts.push(text.to_string());
        }
    }
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::SeqCst);
}

fn accept_body(kind: &str, request: &HttpRequest, response: &mut HttpResponse) {
    if request.has_content() {
        tracing::debug!(
            url = %request.url(),
            bytes = request.content().len(),
            json = request.content_as_json().is_some(),
            "{kind} body received"
        );
        response.set_plain_content(&format!("hello {kind} world"));
    } else {
        response.set_status(StatusCode::BAD_REQUEST);
    }
}

/// Webservice `name` with entry points `<prefix>get`, `<prefix>post`,
/// `<prefix>put` and `<prefix>delete`.
pub fn demo_webservice(name: &str, prefix: &str, counters: Arc<DemoCounters>) -> WebService {
    let mut service = WebService::new(name);

    let c = counters.clone();
    service.get(format!("{prefix}get"), move |_request, response| {
        bump(&c.get);
        response.set_plain_content(GET_REPLY);
    });

    let c = counters.clone();
    service.post(format!("{prefix}post"), move |request, response| {
        bump(&c.post);
        accept_body("post", request, response);
    });

    let c = counters.clone();
    service.put(format!("{prefix}put"), move |request, response| {
        bump(&c.put);
        accept_body("put", request, response);
    });

    service.delete(format!("{prefix}delete"), move |_request, response| {
        bump(&counters.delete);
        if let Err(e) = response.set_json_content(&["hello", "world"]) {
            tracing::error!(error = %e, "Failed to encode delete reply");
            response.set_status(StatusCode::INTERNAL_SERVER_ERROR);
        }
    });

    service
}

/// Answers each client frame with one `hello world` frame.
pub struct EchoHandler {
    counters: Arc<DemoCounters>,
    pending: DashMap<SessionId, usize>,
}

impl EchoHandler {
    pub fn new(counters: Arc<DemoCounters>) -> Self {
        Self {
            counters,
            pending: DashMap::new(),
        }
    }
}

impl WebsocketHandler for EchoHandler {
    fn on_open(&self, session: &SessionInfo) {
        bump(&self.counters.ws_opened);
        self.pending.insert(session.id, 0);
    }

    fn on_read(&self, session: &SessionInfo, frame: &Frame) -> bool {
        bump(&self.counters.ws_frames);
        if let Frame::Text(text) = frame {
            tracing::info!(session = %session.id, protocol = %session.protocol, text = %text, "Client wrote");
            self.counters.record_text(text);
        }
        *self.pending.entry(session.id).or_insert(0) += 1;
        true
    }

    fn on_write(&self, session: &SessionInfo) -> Option<Frame> {
        let mut pending = self.pending.get_mut(&session.id)?;
        if *pending == 0 {
            return None;
        }
        *pending -= 1;
        Some(Frame::text(ECHO_REPLY))
    }

    fn on_close(&self, session: &SessionInfo) {
        self.pending.remove(&session.id);
        bump(&self.counters.ws_closed);
    }
}
