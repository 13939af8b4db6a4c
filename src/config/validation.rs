//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referenced files and directories exist
//! - Validate value ranges (timeouts > 0, poll frequency bounded)
//! - Check WebSocket protocol names are usable in a handshake header
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ServerConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid bind address '{0}'")]
    BindAddress(String),

    #[error("encoding must not be empty")]
    EmptyEncoding,

    #[error("server name '{0}' is not a valid header value")]
    ServerName(String),

    #[error("root dir does not exist: {0}")]
    RootDir(String),

    #[error("tls {kind} file does not exist: {path}")]
    TlsFile { kind: &'static str, path: String },

    #[error("poll frequency must be in (0, 1000] Hz, got {0}")]
    PollFrequency(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("invalid websocket protocol name '{0}'")]
    ProtocolName(String),

    #[error("duplicate websocket protocol '{0}'")]
    DuplicateProtocol(String),

    #[error("default protocol '{0}' is not registered")]
    UnknownDefaultProtocol(String),
}

/// A protocol name must survive a comma separated `Sec-WebSocket-Protocol` header.
pub fn is_valid_protocol_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_graphic() && !matches!(b, b',' | b'"' | b';'))
}

/// Validate a parsed configuration, collecting every error.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    if let Some(tls) = &config.listener.tls {
        if !Path::new(&tls.cert_path).is_file() {
            errors.push(ValidationError::TlsFile { kind: "certificate", path: tls.cert_path.clone() });
        }
        if !Path::new(&tls.key_path).is_file() {
            errors.push(ValidationError::TlsFile { kind: "key", path: tls.key_path.clone() });
        }
    }

    if config.http.encoding.trim().is_empty() {
        errors.push(ValidationError::EmptyEncoding);
    }

    if axum::http::HeaderValue::from_str(&config.http.server_name).is_err() {
        errors.push(ValidationError::ServerName(config.http.server_name.clone()));
    }

    if let Some(root) = &config.http.root_dir {
        if !Path::new(root).is_dir() {
            errors.push(ValidationError::RootDir(root.clone()));
        }
    }

    let freq = config.websocket.poll_frequency_hz;
    if !(freq > 0.0 && freq <= 1000.0) {
        errors.push(ValidationError::PollFrequency(freq.to_string()));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero("timeouts.request_secs"));
    }

    if config.limits.max_body_size == 0 {
        errors.push(ValidationError::Zero("limits.max_body_size"));
    }

    let mut seen = HashSet::new();
    for name in &config.websocket.protocols {
        if !is_valid_protocol_name(name) {
            errors.push(ValidationError::ProtocolName(name.clone()));
        } else if !seen.insert(name.as_str()) {
            errors.push(ValidationError::DuplicateProtocol(name.clone()));
        }
    }

    if let Some(default) = &config.websocket.default_protocol {
        if !seen.contains(default.as_str()) {
            errors.push(ValidationError::UnknownDefaultProtocol(default.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
