//! HTTP and WebSocket client used to exercise a running server.
//!
//! # Responsibilities
//! - Describe the calls a client makes (`request.rs`)
//! - Send them with per-call options (`http.rs`)
//! - Open a WebSocket session with sub-protocol offers (`websocket.rs`)

pub mod http;
pub mod request;
pub mod websocket;

use thiserror::Error;
use tokio_tungstenite::tungstenite;

use crate::http::RequestType;

pub use self::http::{ClientResponse, FileSource, FileUpload, RequestOptions};
pub use self::request::{fixture_calls, ClientRequest, Mount, RequestBody};
pub use self::websocket::{SessionSummary, WebsocketClient};

/// Errors from client operations.
///
/// A non-2xx status is a normal response, not an error.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid URL '{0}'")]
    InvalidUrl(String),

    #[error("{0} requests cannot carry a body")]
    BodyNotAllowed(RequestType),

    #[error("basic auth and bearer token cannot both be set")]
    AuthConflict,

    #[error("invalid header value: {0}")]
    InvalidHeader(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
}
