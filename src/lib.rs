//! Embeddable HTTP + WebSocket server with webservices, static files
//! and sub-protocol negotiation, plus a matching client.

pub mod client;
pub mod config;
pub mod demo;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::schema::ServerConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
