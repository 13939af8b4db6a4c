//! Webservice request model.
//!
//! # Responsibilities
//! - Map wire methods onto the four request types webservices serve
//! - Carry the path, query fragments, client address and body to entry points

use std::fmt;
use std::str::FromStr;

use axum::http::Method;
use serde_json::Value;
use thiserror::Error;

/// Request types a webservice entry point can be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RequestType {
    Get,
    Post,
    Put,
    Delete,
}

impl RequestType {
    pub const ALL: [RequestType; 4] = [Self::Get, Self::Post, Self::Put, Self::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }

    /// Map an HTTP method; anything other than GET/POST/PUT/DELETE yields `None`.
    pub fn from_method(method: &Method) -> Option<Self> {
        match *method {
            Method::GET => Some(Self::Get),
            Method::POST => Some(Self::Post),
            Method::PUT => Some(Self::Put),
            Method::DELETE => Some(Self::Delete),
            _ => None,
        }
    }

    pub fn method(&self) -> Method {
        match self {
            Self::Get => Method::GET,
            Self::Post => Method::POST,
            Self::Put => Method::PUT,
            Self::Delete => Method::DELETE,
        }
    }

    /// Whether requests of this type may carry a body.
    pub fn accepts_body(&self) -> bool {
        matches!(self, Self::Post | Self::Put)
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown request type '{0}'")]
pub struct UnknownRequestType(pub String);

impl FromStr for RequestType {
    type Err = UnknownRequestType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ty| ty.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownRequestType(s.to_string()))
    }
}

/// A request as seen by a webservice entry point.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    request_type: RequestType,
    url: String,
    uri_args: Vec<String>,
    client_ip: String,
    content: Vec<u8>,
}

impl HttpRequest {
    pub fn new(url: impl Into<String>, request_type: RequestType) -> Self {
        Self {
            request_type,
            url: url.into(),
            uri_args: Vec::new(),
            client_ip: String::new(),
            content: Vec::new(),
        }
    }

    /// Split a raw query string into its `&`-separated fragments.
    pub fn parse_uri_args(query: Option<&str>) -> Vec<String> {
        query
            .map(|q| {
                q.split('&')
                    .filter(|arg| !arg.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn with_uri_args(mut self, args: Vec<String>) -> Self {
        self.uri_args = args;
        self
    }

    pub fn set_client_ip(&mut self, ip: impl Into<String>) {
        self.client_ip = ip.into();
    }

    pub fn set_content(&mut self, content: impl Into<Vec<u8>>) {
        self.content = content.into();
    }

    pub fn has_content(&self) -> bool {
        !self.content.is_empty()
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn content_str(&self) -> String {
        String::from_utf8_lossy(&self.content).into_owned()
    }

    /// Body parsed as JSON; `None` when empty or malformed.
    pub fn content_as_json(&self) -> Option<Value> {
        if self.content.is_empty() {
            return None;
        }
        serde_json::from_slice(&self.content).ok()
    }

    pub fn request_type(&self) -> RequestType {
        self.request_type
    }

    pub fn type_str(&self) -> &'static str {
        self.request_type.as_str()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn uri_args(&self) -> &[String] {
        &self.uri_args
    }

    /// Value of the first `key=value` query fragment with the given key.
    pub fn uri_arg(&self, key: &str) -> Option<&str> {
        self.uri_args.iter().find_map(|arg| match arg.split_once('=') {
            Some((k, v)) if k == key => Some(v),
            None if arg == key => Some(""),
            _ => None,
        })
    }

    pub fn client_ip(&self) -> &str {
        &self.client_ip
    }
}
