//! Named webservices with per-method entry points.
//!
//! A webservice is mounted under its name: a request for `/<name>/<path>`
//! is dispatched to the entry point registered for `(method, path)`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::http::request::{HttpRequest, RequestType};
use crate::http::response::HttpResponse;

/// Entry point callback.
pub type EntryPoint = Arc<dyn Fn(&HttpRequest, &mut HttpResponse) + Send + Sync>;

pub struct WebService {
    name: String,
    entry_points: BTreeMap<(RequestType, String), EntryPoint>,
}

impl WebService {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entry_points: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register `handler` for `(request_type, path)`, replacing any previous one.
    pub fn set_entry_point<F>(&mut self, path: impl Into<String>, request_type: RequestType, handler: F) -> &mut Self
    where
        F: Fn(&HttpRequest, &mut HttpResponse) + Send + Sync + 'static,
    {
        let path = path.into();
        if self
            .entry_points
            .insert((request_type, path.clone()), Arc::new(handler))
            .is_some()
        {
            tracing::debug!(service = %self.name, method = %request_type, path = %path, "Entry point replaced");
        }
        self
    }

    pub fn get<F>(&mut self, path: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(&HttpRequest, &mut HttpResponse) + Send + Sync + 'static,
    {
        self.set_entry_point(path, RequestType::Get, handler)
    }

    pub fn post<F>(&mut self, path: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(&HttpRequest, &mut HttpResponse) + Send + Sync + 'static,
    {
        self.set_entry_point(path, RequestType::Post, handler)
    }

    pub fn put<F>(&mut self, path: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(&HttpRequest, &mut HttpResponse) + Send + Sync + 'static,
    {
        self.set_entry_point(path, RequestType::Put, handler)
    }

    pub fn delete<F>(&mut self, path: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(&HttpRequest, &mut HttpResponse) + Send + Sync + 'static,
    {
        self.set_entry_point(path, RequestType::Delete, handler)
    }

    pub fn has_entry_point(&self, path: &str, request_type: RequestType) -> bool {
        self.entry_points
            .contains_key(&(request_type, path.to_string()))
    }

    /// Invoke the entry point for the request's type at `path`.
    /// Returns false when nothing is registered there.
    pub fn call(&self, path: &str, request: &HttpRequest, response: &mut HttpResponse) -> bool {
        match self
            .entry_points
            .get(&(request.request_type(), path.to_string()))
        {
            Some(handler) => {
                handler(request, response);
                true
            }
            None => false,
        }
    }

    /// Registered `(type, path)` pairs in a stable order.
    pub fn entry_points(&self) -> Vec<(RequestType, &str)> {
        self.entry_points
            .keys()
            .map(|(ty, path)| (*ty, path.as_str()))
            .collect()
    }
}

impl fmt::Debug for WebService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebService")
            .field("name", &self.name)
            .field("entry_points", &self.entry_points())
            .finish()
    }
}

/// Split `/<service>/<rest>` into `(service, rest)`. Paths without a second segment never match.
pub fn split_service_path(path: &str) -> Option<(&str, &str)> {
    let path = path.strip_prefix('/').unwrap_or(path);
    let (service, rest) = path.split_once('/')?;
    if service.is_empty() {
        return None;
    }
    Some((service, rest))
}
