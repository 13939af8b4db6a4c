//! Header map with typed accessors for the headers the server and client care about.

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};

/// Wrapper around [`HeaderMap`]. Names are case-insensitive; setting a header replaces it.
#[derive(Debug, Clone, Default)]
pub struct HttpHeader {
    headers: HeaderMap,
}

impl HttpHeader {
    pub fn new() -> Self {
        Self::default()
    }

    /// `type; charset=<charset>`, or just `type` for an empty charset.
    pub fn build_content_type(content_type: &str, charset: &str) -> String {
        if charset.is_empty() {
            content_type.to_string()
        } else {
            format!("{content_type}; charset={charset}")
        }
    }

    pub fn set_server(&mut self, name: &str) -> &mut Self {
        self.set(header::SERVER, name)
    }

    pub fn set_content_type(&mut self, content_type: &str) -> &mut Self {
        self.set(header::CONTENT_TYPE, content_type)
    }

    pub fn set_content_length(&mut self, len: usize) -> &mut Self {
        self.headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
        self
    }

    pub fn set_accept_charset(&mut self, charset: &str) -> &mut Self {
        self.set(header::ACCEPT_CHARSET, charset)
    }

    pub fn set_accept(&mut self, mime_type: &str) -> &mut Self {
        self.set(header::ACCEPT, mime_type)
    }

    /// Set a header by name. Invalid names or values are logged and ignored.
    pub fn set_header(&mut self, name: &str, value: &str) -> &mut Self {
        match HeaderName::from_bytes(name.as_bytes()) {
            Ok(name) => self.set(name, value),
            Err(_) => {
                tracing::warn!(header = %name, "Ignoring invalid header name");
                self
            }
        }
    }

    fn set(&mut self, name: HeaderName, value: &str) -> &mut Self {
        match HeaderValue::from_str(value) {
            Ok(value) => {
                self.headers.insert(name, value);
            }
            Err(_) => tracing::warn!(header = %name, "Ignoring invalid header value"),
        }
        self
    }

    pub fn remove(&mut self, name: &str) -> &mut Self {
        self.headers.remove(name);
        self
    }

    /// Parse a raw `Name: value` line (as received in a response head).
    pub fn add_header_from_line(&mut self, line: &str) -> bool {
        let line = line.trim_end_matches(['\r', '\n']);
        let Some((name, value)) = line.split_once(": ") else {
            return false;
        };
        if name.is_empty() || value.is_empty() {
            return false;
        }
        let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) else {
            return false;
        };
        self.headers.insert(name, value);
        true
    }

    /// Value of a header as text, if present and valid UTF-8.
    pub fn find(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Declared body length; 0 when absent or not a number.
    pub fn content_length(&self) -> usize {
        self.find(header::CONTENT_LENGTH.as_str())
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.find(header::CONTENT_TYPE.as_str())
    }

    pub fn accept_charset(&self) -> Option<&str> {
        self.find(header::ACCEPT_CHARSET.as_str())
    }

    pub fn server(&self) -> Option<&str> {
        self.find(header::SERVER.as_str())
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn into_inner(self) -> HeaderMap {
        self.headers
    }
}

impl From<HeaderMap> for HttpHeader {
    fn from(headers: HeaderMap) -> Self {
        Self { headers }
    }
}
