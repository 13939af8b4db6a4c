//! WebSocket sub-protocol negotiation and session handling.
//!
//! # Data Flow
//! ```text
//! Upgrade request ──→ negotiate(Sec-WebSocket-Protocol) ──→ handler for selected protocol
//!                                                         │
//!   inbound frames ──→ on_read ──┐                        ▼
//!   poll tick      ──→ on_write ─┴──→ session loop ──→ on_close
//! ```
//!
//! # Design Decisions
//! - Selection follows client preference: the first offered protocol the server knows
//! - No match rejects the handshake; the connection is never upgraded
//! - One handler instance serves every session of its protocol
//! - Ping/pong is answered by the protocol library

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::http::HeaderMap;
use dashmap::DashMap;

use crate::lifecycle::Shutdown;
use crate::observability::metrics;

/// Global counter for session IDs; only uniqueness is needed.
static SESSION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a WebSocket session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    pub fn new() -> Self {
        Self(SESSION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ws-{}", self.0)
    }
}

/// What a handler knows about the session it is serving.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub id: SessionId,
    pub protocol: String,
    pub peer: Option<SocketAddr>,
}

/// Application-level frame exchanged with handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

impl Frame {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Text(s) => s.len(),
            Self::Binary(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Frame> for Message {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Text(s) => Message::Text(s.into()),
            Frame::Binary(b) => Message::Binary(b.into()),
        }
    }
}

/// Callbacks for one WebSocket protocol.
pub trait WebsocketHandler: Send + Sync {
    fn on_open(&self, session: &SessionInfo);

    /// Returning false closes the session.
    fn on_read(&self, session: &SessionInfo, frame: &Frame) -> bool;

    /// Polled periodically; a returned frame is sent to the client.
    fn on_write(&self, session: &SessionInfo) -> Option<Frame>;

    fn on_close(&self, session: &SessionInfo);
}

/// Protocols in registration order.
#[derive(Clone, Default)]
pub struct ProtocolTable {
    protocols: Vec<(String, Arc<dyn WebsocketHandler>)>,
}

impl ProtocolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a protocol. Re-registering a name replaces its handler.
    pub fn add(&mut self, name: impl Into<String>, handler: Arc<dyn WebsocketHandler>) {
        let name = name.into();
        match self.protocols.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = handler,
            None => self.protocols.push((name, handler)),
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn WebsocketHandler>> {
        self.protocols
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, h)| h.clone())
    }

    pub fn names(&self) -> Vec<&str> {
        self.protocols.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.protocols.is_empty()
    }

    /// Pick the protocol for a handshake.
    ///
    /// The first client offer the table knows wins. With no offer at all,
    /// `default` is used if registered.
    pub fn negotiate(&self, offered: &[String], default: Option<&str>) -> Option<String> {
        if offered.is_empty() {
            return default
                .filter(|d| self.get(d).is_some())
                .map(str::to_string);
        }
        offered.iter().find(|p| self.get(p).is_some()).cloned()
    }
}

/// Offered protocols from every `Sec-WebSocket-Protocol` header, in order.
pub fn offered_protocols(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(axum::http::header::SEC_WEBSOCKET_PROTOCOL)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Open sessions, keyed by ID.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionId, SessionInfo>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, info: SessionInfo) {
        metrics::session_opened(&info.protocol);
        self.sessions.insert(info.id, info);
    }

    pub fn remove(&self, id: SessionId) -> Option<SessionInfo> {
        let removed = self.sessions.remove(&id).map(|(_, info)| info);
        if let Some(info) = &removed {
            metrics::session_closed(&info.protocol);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Number of open sessions speaking `protocol`.
    pub fn count_protocol(&self, protocol: &str) -> usize {
        self.sessions
            .iter()
            .filter(|entry| entry.value().protocol == protocol)
            .count()
    }
}

/// Drive one upgraded connection until either side closes or shutdown fires.
pub async fn run_session(
    mut socket: WebSocket,
    info: SessionInfo,
    handler: Arc<dyn WebsocketHandler>,
    registry: Arc<SessionRegistry>,
    poll_interval: Duration,
    shutdown: Shutdown,
) {
    registry.insert(info.clone());
    tracing::debug!(session = %info.id, protocol = %info.protocol, "WebSocket opened");
    handler.on_open(&info);

    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    // Returns at once for sessions upgraded after shutdown fired.
    let stopped = shutdown.wait();
    tokio::pin!(stopped);

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let frame = match msg {
                    Some(Ok(Message::Text(text))) => Frame::Text(text.as_str().to_string()),
                    Some(Ok(Message::Binary(bytes))) => Frame::Binary(bytes.to_vec()),
                    Some(Ok(Message::Ping(_))) => continue,
                    Some(Ok(Message::Pong(_))) => {
                        tracing::debug!(session = %info.id, "Received pong");
                        continue;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::debug!(session = %info.id, close = ?frame, "Client closed WebSocket");
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(session = %info.id, error = %e, "WebSocket receive error");
                        break;
                    }
                    None => break,
                };
                metrics::record_frame("in");
                if !handler.on_read(&info, &frame) {
                    tracing::debug!(session = %info.id, "Handler refused frame, closing");
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
            }
            _ = ticker.tick() => {
                if let Some(frame) = handler.on_write(&info) {
                    if let Err(e) = socket.send(frame.into()).await {
                        tracing::warn!(session = %info.id, error = %e, "WebSocket send error");
                        break;
                    }
                    metrics::record_frame("out");
                }
            }
            _ = &mut stopped => {
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
        }
    }

    registry.remove(info.id);
    handler.on_close(&info);
    tracing::debug!(session = %info.id, protocol = %info.protocol, "WebSocket closed");
}
