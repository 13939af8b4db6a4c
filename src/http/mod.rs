//! HTTP and WebSocket server subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, request ID, dispatch)
//!     → websocket.rs (Upgrade: websocket → negotiated protocol handler)
//!     → resource.rs (GET of a file under the root directory)
//!     → webservice.rs (/<service>/<path> → entry point)
//!         request.rs in, response.rs out
//!     → 404 page
//! ```

pub mod header;
pub mod mime;
pub mod request;
pub mod request_id;
pub mod resource;
pub mod response;
pub mod server;
pub mod webservice;
pub mod websocket;

pub use header::HttpHeader;
pub use mime::Mime;
pub use request::{HttpRequest, RequestType};
pub use request_id::X_REQUEST_ID;
pub use response::HttpResponse;
pub use server::{HttpServer, ServerError};
pub use webservice::WebService;
pub use websocket::{Frame, SessionInfo, WebsocketHandler};
