//! WebSocket client with sub-protocol offers.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::client::ClientError;
use crate::http::websocket::Frame;

pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(5);

/// What happened during a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub protocol: Option<String>,
    pub frames_received: usize,
    /// Reason from the peer's close frame, or `idle timeout` when the client gave up.
    pub close_reason: Option<String>,
}

pub struct WebsocketClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    protocol: Option<String>,
    idle_timeout: Duration,
}

impl WebsocketClient {
    /// Open a connection offering `protocols` in preference order.
    ///
    /// Fails when the server rejects the handshake or answers with a
    /// protocol that was not offered.
    pub async fn connect(uri: &str, protocols: &[String]) -> Result<Self, ClientError> {
        let mut request = uri.into_client_request()?;
        if !protocols.is_empty() {
            let offer = protocols.join(", ");
            let value = HeaderValue::from_str(&offer).map_err(|_| ClientError::InvalidHeader(offer.clone()))?;
            request.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, value);
        }

        let (stream, response) = tokio_tungstenite::connect_async(request).await?;
        let protocol = response
            .headers()
            .get(SEC_WEBSOCKET_PROTOCOL)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        tracing::info!(
            uri = %uri,
            status = %response.status(),
            protocol = ?protocol,
            "WebSocket connected"
        );
        Ok(Self {
            stream,
            protocol,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        })
    }

    /// Close the session when nothing arrives for `timeout`.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Protocol selected by the server, if it echoed one.
    pub fn protocol(&self) -> Option<&str> {
        self.protocol.as_deref()
    }

    /// Send `greeting`, then hand every inbound frame to `on_message` until
    /// the peer closes or the idle timeout elapses. `on_message` returning
    /// false closes the session from the client side.
    pub async fn run_session<F>(mut self, greeting: &str, mut on_message: F) -> Result<SessionSummary, ClientError>
    where
        F: FnMut(&Frame) -> bool,
    {
        self.stream.send(Message::text(greeting.to_string())).await?;

        let mut frames_received = 0;
        let mut close_reason = None;

        loop {
            let next = match tokio::time::timeout(self.idle_timeout, self.stream.next()).await {
                Ok(next) => next,
                Err(_) => {
                    tracing::debug!(timeout = ?self.idle_timeout, "WebSocket idle, closing");
                    close_reason = Some("idle timeout".to_string());
                    self.close().await;
                    break;
                }
            };

            let frame = match next {
                Some(Ok(Message::Text(text))) => Frame::Text(text.as_str().to_string()),
                Some(Ok(Message::Binary(data))) => Frame::Binary(data.to_vec()),
                Some(Ok(Message::Close(frame))) => {
                    close_reason = Some(frame.map(|f| f.reason.to_string()).unwrap_or_default());
                    tracing::debug!(reason = ?close_reason, "Server closed WebSocket");
                    // Keep polling so the close handshake completes.
                    continue;
                }
                Some(Ok(_)) => continue,
                Some(Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed)) | None => break,
                Some(Err(e)) if close_reason.is_some() => {
                    tracing::debug!(error = %e, "WebSocket ended after close frame");
                    break;
                }
                Some(Err(e)) => return Err(e.into()),
            };

            frames_received += 1;
            tracing::debug!(bytes = frame.len(), "WebSocket frame received");
            if !on_message(&frame) {
                self.close().await;
                break;
            }
        }

        Ok(SessionSummary {
            protocol: self.protocol,
            frames_received,
            close_reason,
        })
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            tracing::debug!(error = %e, "WebSocket close failed");
            return;
        }
        // Drain until the server acknowledges the close.
        while let Ok(Some(Ok(_))) = tokio::time::timeout(self.idle_timeout, self.stream.next()).await {}
    }
}
