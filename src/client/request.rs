//! Client request records and the fixture call table.

use std::fmt;
use std::str::FromStr;

use serde_json::{json, Value};

use crate::client::ClientError;
use crate::http::mime;
use crate::http::RequestType;

/// Body of a client request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Text(String),
}

impl RequestBody {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Json(_) => false,
            Self::Text(text) => text.is_empty(),
        }
    }

    /// Content type implied by the body kind.
    pub fn content_type(&self) -> Option<&'static str> {
        match self {
            Self::Empty => None,
            Self::Json(_) => Some(mime::APPLICATION_JSON),
            Self::Text(_) => Some(mime::TEXT_PLAIN),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Empty => Vec::new(),
            Self::Json(value) => value.to_string().into_bytes(),
            Self::Text(text) => text.clone().into_bytes(),
        }
    }
}

/// One call against a server: method, path relative to a base URL, body.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientRequest {
    method: RequestType,
    path: String,
    body: RequestBody,
    content_type: Option<String>,
}

impl ClientRequest {
    /// Build a request. GET and DELETE never carry a body.
    pub fn new(method: RequestType, path: impl Into<String>, body: RequestBody) -> Result<Self, ClientError> {
        if !method.accepts_body() && !body.is_empty() {
            return Err(ClientError::BodyNotAllowed(method));
        }
        Ok(Self {
            method,
            path: path.into(),
            body,
            content_type: None,
        })
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::bodyless(RequestType::Get, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::bodyless(RequestType::Delete, path)
    }

    pub fn post_json(path: impl Into<String>, value: Value) -> Self {
        Self::with_body(RequestType::Post, path, RequestBody::Json(value))
    }

    pub fn post_text(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self::with_body(RequestType::Post, path, RequestBody::Text(text.into()))
    }

    pub fn put_text(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self::with_body(RequestType::Put, path, RequestBody::Text(text.into()))
    }

    /// Override the content type derived from the body.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn method(&self) -> RequestType {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn body(&self) -> &RequestBody {
        &self.body
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type
            .as_deref()
            .or_else(|| self.body.content_type())
    }

    /// `path` appended to `base`, with exactly one slash between them.
    pub fn url(&self, base: &str) -> String {
        format!(
            "{}/{}",
            base.trim_end_matches('/'),
            self.path.trim_start_matches('/')
        )
    }

    fn bodyless(method: RequestType, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: RequestBody::Empty,
            content_type: None,
        }
    }

    fn with_body(method: RequestType, path: impl Into<String>, body: RequestBody) -> Self {
        Self {
            method,
            path: path.into(),
            body,
            content_type: None,
        }
    }
}

/// Where the fixture endpoints are mounted on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mount {
    /// `webservice/get`, `webservice/post`, ...
    #[default]
    WebService,
    /// `web/some_get`, `web/some_post`, ...
    Web,
}

impl Mount {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::WebService => "webservice/",
            Self::Web => "web/some_",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WebService => "webservice",
            Self::Web => "web",
        }
    }
}

impl fmt::Display for Mount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mount {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "webservice" => Ok(Self::WebService),
            "web" => Ok(Self::Web),
            other => Err(format!("unknown mount '{other}', expected 'webservice' or 'web'")),
        }
    }
}

/// The five endpoint calls: GET, POST json, POST text, PUT text, DELETE.
pub fn fixture_calls(mount: Mount) -> Vec<ClientRequest> {
    let prefix = mount.prefix();
    vec![
        ClientRequest::get(format!("{prefix}get")),
        ClientRequest::post_json(format!("{prefix}post"), json!({ "hello": "world" })),
        ClientRequest::post_text(format!("{prefix}post"), "hello world"),
        ClientRequest::put_text(format!("{prefix}put"), "hello world"),
        // DELETE announces text but never sends a body.
        ClientRequest::delete(format!("{prefix}delete")).with_content_type(mime::TEXT_PLAIN),
    ]
}
