//! HTTP request helpers with per-call options.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{redirect, Client, Method, RequestBuilder, StatusCode};
use serde_json::Value;
use url::Url;

use crate::client::request::ClientRequest;
use crate::client::ClientError;
use crate::http::HttpHeader;

/// Where an uploaded file's bytes come from.
#[derive(Debug, Clone)]
pub enum FileSource {
    Path(PathBuf),
    Data(Vec<u8>),
}

/// A file sent as one multipart form part.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub form_name: String,
    /// Defaults to the file name of a `Path` source.
    pub file_name: Option<String>,
    pub source: FileSource,
}

/// Options applied to a single request.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub verbose: bool,
    pub follow_location: bool,
    pub timeout: Duration,
    pub ssl_verify: bool,
    /// Query parameters, appended in key order.
    pub parameters: BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
    pub user_agent: Option<String>,
    pub form_parameters: BTreeMap<String, String>,
    pub file: Option<FileUpload>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            verbose: false,
            follow_location: false,
            timeout: Duration::from_secs(10),
            ssl_verify: false,
            parameters: BTreeMap::new(),
            headers: BTreeMap::new(),
            username: None,
            password: None,
            token: None,
            user_agent: None,
            form_parameters: BTreeMap::new(),
            file: None,
        }
    }
}

impl RequestOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_form_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.form_parameters.insert(name.into(), value.into());
        self
    }

    pub fn with_file(mut self, file: FileUpload) -> Self {
        self.file = Some(file);
        self
    }

    /// Username and password, when both are non-empty.
    fn basic_auth(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => Some((user, pass)),
            _ => None,
        }
    }

    fn bearer_token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }

    /// At most one authentication method may be configured.
    pub fn check_auth(&self) -> Result<(), ClientError> {
        if self.basic_auth().is_some() && self.bearer_token().is_some() {
            return Err(ClientError::AuthConflict);
        }
        Ok(())
    }

    fn has_multipart(&self) -> bool {
        self.file.is_some() || !self.form_parameters.is_empty()
    }
}

/// Response as seen by the client.
#[derive(Debug, Clone)]
pub struct ClientResponse {
    status: StatusCode,
    header: HttpHeader,
    content: Vec<u8>,
}

impl ClientResponse {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn http_header(&self) -> &HttpHeader {
        &self.header
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header.content_type()
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.content).into_owned()
    }

    pub fn json(&self) -> Option<Value> {
        serde_json::from_slice(&self.content).ok()
    }
}

/// Parse `url`, assuming `http://` when no scheme is given.
pub fn normalize_url(url: &str) -> Result<Url, ClientError> {
    let candidate = if url.contains("://") {
        url.to_string()
    } else {
        format!("http://{url}")
    };
    Url::parse(&candidate).map_err(|_| ClientError::InvalidUrl(url.to_string()))
}

fn build_client(options: &RequestOptions) -> Result<Client, ClientError> {
    let policy = if options.follow_location {
        redirect::Policy::default()
    } else {
        redirect::Policy::none()
    };

    let mut builder = Client::builder()
        .timeout(options.timeout)
        .redirect(policy)
        .danger_accept_invalid_certs(!options.ssl_verify)
        .connection_verbose(options.verbose);
    if let Some(agent) = &options.user_agent {
        builder = builder.user_agent(agent.clone());
    }
    Ok(builder.build()?)
}

fn prepare(method: Method, url: &str, options: &RequestOptions) -> Result<RequestBuilder, ClientError> {
    options.check_auth()?;

    let mut url = normalize_url(url)?;
    if !options.parameters.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in &options.parameters {
            pairs.append_pair(key, value);
        }
    }

    let client = build_client(options)?;
    let mut builder = client.request(method, url);

    if let Some((user, pass)) = options.basic_auth() {
        builder = builder.basic_auth(user, Some(pass));
    }
    if let Some(token) = options.bearer_token() {
        builder = builder.bearer_auth(token);
    }
    for (name, value) in &options.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    Ok(builder)
}

async fn multipart_form(options: &RequestOptions) -> Result<Form, ClientError> {
    let mut form = Form::new();
    for (name, value) in &options.form_parameters {
        form = form.text(name.clone(), value.clone());
    }

    if let Some(file) = &options.file {
        let (data, default_name) = match &file.source {
            FileSource::Data(data) => (data.clone(), None),
            FileSource::Path(path) => (
                tokio::fs::read(path).await?,
                path.file_name().map(|n| n.to_string_lossy().into_owned()),
            ),
        };
        let mut part = Part::bytes(data);
        if let Some(name) = file.file_name.clone().or(default_name) {
            part = part.file_name(name);
        }
        form = form.part(file.form_name.clone(), part);
    }
    Ok(form)
}

async fn execute(builder: RequestBuilder) -> Result<ClientResponse, ClientError> {
    let response = builder.send().await?;
    let status = response.status();
    let header = HttpHeader::from(response.headers().clone());
    let content = response.bytes().await?.to_vec();

    tracing::debug!(status = %status, bytes = content.len(), "Response received");
    Ok(ClientResponse {
        status,
        header,
        content,
    })
}

pub async fn get(url: &str, options: &RequestOptions) -> Result<ClientResponse, ClientError> {
    tracing::debug!(method = "GET", url = %url, "Sending request");
    execute(prepare(Method::GET, url, options)?).await
}

/// POST `body`, or a multipart form when form parameters or a file are set.
pub async fn post(url: &str, body: &[u8], options: &RequestOptions) -> Result<ClientResponse, ClientError> {
    tracing::debug!(method = "POST", url = %url, bytes = body.len(), "Sending request");
    let builder = prepare(Method::POST, url, options)?;
    let builder = if options.has_multipart() {
        if !body.is_empty() {
            tracing::warn!(url = %url, "Raw body ignored in favor of multipart form");
        }
        builder.multipart(multipart_form(options).await?)
    } else {
        builder.body(body.to_vec())
    };
    execute(builder).await
}

pub async fn put(url: &str, body: &[u8], options: &RequestOptions) -> Result<ClientResponse, ClientError> {
    tracing::debug!(method = "PUT", url = %url, bytes = body.len(), "Sending request");
    execute(prepare(Method::PUT, url, options)?.body(body.to_vec())).await
}

/// PUT the contents of the file at `path`.
pub async fn put_file(url: &str, path: &Path, options: &RequestOptions) -> Result<ClientResponse, ClientError> {
    let data = tokio::fs::read(path).await?;
    put(url, &data, options).await
}

pub async fn del(url: &str, options: &RequestOptions) -> Result<ClientResponse, ClientError> {
    tracing::debug!(method = "DELETE", url = %url, "Sending request");
    execute(prepare(Method::DELETE, url, options)?).await
}

/// Send a request record against `base`.
pub async fn send(request: &ClientRequest, base: &str, options: &RequestOptions) -> Result<ClientResponse, ClientError> {
    let url = request.url(base);
    let body = request.body().to_bytes();
    tracing::debug!(method = %request.method(), url = %url, bytes = body.len(), "Sending request");

    let mut builder = prepare(request.method().method(), &url, options)?;
    if let Some(content_type) = request.content_type() {
        builder = builder.header(reqwest::header::CONTENT_TYPE, content_type);
    }
    if request.method().accepts_body() {
        builder = builder.body(body);
    }
    execute(builder).await
}
