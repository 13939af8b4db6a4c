//! Network layer.
//!
//! # Responsibilities
//! - TLS termination (rustls via axum-server) when certificate and key are configured
//!
//! Plain TCP listening is handled by `tokio::net::TcpListener` + `axum::serve`.

pub mod tls;

pub use tls::load_tls_config;
