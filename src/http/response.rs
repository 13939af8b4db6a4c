//! Webservice response model.
//!
//! # Responsibilities
//! - Collect status, headers and body written by an entry point
//! - Pick a default content type from the kind of content set
//! - Convert into a wire response with an exact Content-Length

use axum::body::Body;
use axum::http::{header, HeaderValue, Response, StatusCode};
use axum::response::IntoResponse;
use serde::Serialize;

use crate::http::header::HttpHeader;
use crate::http::mime::{self, Mime};

/// Response filled in by a webservice entry point.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    status: StatusCode,
    header: HttpHeader,
    content: Vec<u8>,
}

impl HttpResponse {
    pub fn new() -> Self {
        let mut header = HttpHeader::new();
        header.set_accept_charset("utf-8");
        Self {
            status: StatusCode::OK,
            header,
            content: Vec::new(),
        }
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_content_type(&mut self, content_type: &str) {
        self.header.set_content_type(content_type);
    }

    pub fn set_content_type_from_extension(&mut self, mime: &Mime, ext: &str) {
        self.set_content_type(&mime.get(ext));
    }

    pub fn set_header(&mut self, name: &str, value: &str) {
        self.header.set_header(name, value);
    }

    pub fn set_plain_content(&mut self, text: &str) {
        self.set_default_content_type(mime::TEXT_PLAIN);
        self.set_content(text.as_bytes());
    }

    /// Serialize `value` as the body. A serialization failure leaves the response untouched.
    pub fn set_json_content<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        self.set_default_content_type(mime::APPLICATION_JSON);
        self.content = body;
        Ok(())
    }

    pub fn set_byte_content(&mut self, data: &[u8]) {
        self.set_default_content_type(mime::APPLICATION_OCTET);
        self.set_content(data);
    }

    pub fn set_content(&mut self, data: &[u8]) {
        self.content = data.to_vec();
    }

    /// Turn this response into a redirect. Status must be 301, 302, 303 or 304;
    /// anything else becomes 301.
    pub fn send_redirect(&mut self, location: &str, status: StatusCode) {
        self.status = match status {
            StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::NOT_MODIFIED => status,
            _ => StatusCode::MOVED_PERMANENTLY,
        };
        self.header.set_header(header::LOCATION.as_str(), location);
        self.header.set_content_type(mime::TEXT_HTML);
        self.content.clear();
    }

    /// Empty body with the given status.
    pub fn no_content(&mut self, status: StatusCode) {
        self.status = status;
        self.header.set_content_type(mime::TEXT_HTML);
        self.content.clear();
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn http_header(&self) -> &HttpHeader {
        &self.header
    }

    pub fn http_header_mut(&mut self) -> &mut HttpHeader {
        &mut self.header
    }

    fn set_default_content_type(&mut self, content_type: &str) {
        if self.header.content_type().is_none() {
            self.set_content_type(content_type);
        }
    }
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl IntoResponse for HttpResponse {
    fn into_response(self) -> axum::response::Response {
        let len = self.content.len();
        let mut response = Response::new(Body::from(self.content));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.header.into_inner();
        response
            .headers_mut()
            .insert(header::CONTENT_LENGTH, HeaderValue::from(len));
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let resp = HttpResponse::new();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.http_header().accept_charset(), Some("utf-8"));
        assert!(resp.content().is_empty());
    }

    #[test]
    fn test_plain_content_sets_type_once() {
        let mut resp = HttpResponse::new();
        resp.set_plain_content("hello get world");
        assert_eq!(resp.http_header().content_type(), Some("text/plain"));
        assert_eq!(resp.content(), b"hello get world");

        resp.set_byte_content(&[1, 2, 3]);
        assert_eq!(resp.http_header().content_type(), Some("text/plain"));
    }

    #[test]
    fn test_explicit_type_wins() {
        let mut resp = HttpResponse::new();
        resp.set_content_type_from_extension(&Mime::new(), "html");
        resp.set_plain_content("<p>hi</p>");
        assert_eq!(resp.http_header().content_type(), Some("text/html"));
    }

    #[test]
    fn test_json_content() {
        let mut resp = HttpResponse::new();
        resp.set_json_content(&json!(["hello", "world"])).unwrap();
        assert_eq!(resp.http_header().content_type(), Some("application/json"));
        assert_eq!(resp.content(), br#"["hello","world"]"#);
    }

    #[test]
    fn test_redirect() {
        let mut resp = HttpResponse::new();
        resp.set_plain_content("gone");
        resp.send_redirect("/index.html", StatusCode::SEE_OTHER);
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.http_header().find("location"), Some("/index.html"));
        assert!(resp.content().is_empty());

        resp.send_redirect("/", StatusCode::OK);
        assert_eq!(resp.status(), StatusCode::MOVED_PERMANENTLY);
    }

    #[test]
    fn test_no_content() {
        let mut resp = HttpResponse::new();
        resp.no_content(StatusCode::NO_CONTENT);
        let wire = resp.into_response();
        assert_eq!(wire.status(), StatusCode::NO_CONTENT);
        assert_eq!(wire.headers()[header::CONTENT_LENGTH], "0");
    }

    #[test]
    fn test_into_response_sets_length() {
        let mut resp = HttpResponse::new();
        resp.set_status(StatusCode::CREATED);
        resp.set_plain_content("abc");

        let wire = resp.into_response();
        assert_eq!(wire.status(), StatusCode::CREATED);
        assert_eq!(wire.headers()[header::CONTENT_LENGTH], "3");
        assert_eq!(wire.headers()[header::CONTENT_TYPE], "text/plain");
    }
}
