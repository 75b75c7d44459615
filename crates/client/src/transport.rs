//! HTTP transport used by the session manager.
//!
//! The session manager talks to the backend through [`HttpTransport`] so the
//! refresh/retry logic can be driven by a scripted fake in tests. The
//! production implementation is [`ReqwestTransport`].
//!
//! Non-2xx statuses are ordinary [`ApiResponse`]s; only failures to complete
//! the exchange at all are [`TransportError`]s.

use std::future::Future;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{Span, debug, instrument};
use url::Url;
use uuid::Uuid;

pub use reqwest::{Method, StatusCode};

use crate::config::ClientConfig;

/// Header carrying a per-call correlation ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Errors completing an HTTP exchange.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The HTTP client failed (connection refused, timeout, TLS, ...).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The request path could not be joined onto the base URL.
    #[error("invalid request path '{path}': {source}")]
    InvalidPath {
        path: String,
        #[source]
        source: url::ParseError,
    },

    /// The backend could not be reached for another reason.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// An outbound API call.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    body: Option<serde_json::Value>,
    headers: Vec<(String, String)>,
    bearer: Option<SecretString>,
}

impl ApiRequest {
    /// Create a request for `path`, relative to the API base URL.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            headers: Vec::new(),
            bearer: None,
        }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body.
    #[must_use]
    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Add an extra header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Copy of this request carrying `token` as its bearer credential.
    #[must_use]
    pub fn with_bearer(&self, token: Option<&SecretString>) -> Self {
        Self {
            bearer: token.cloned(),
            ..self.clone()
        }
    }

    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub const fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    #[must_use]
    pub const fn bearer(&self) -> Option<&SecretString> {
        self.bearer.as_ref()
    }
}

/// A completed API call, whatever its status.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    body: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(alias = "message")]
    error: String,
}

impl ApiResponse {
    #[must_use]
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.body
    }

    /// Deserialize the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns `serde_json::Error` if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }

    /// Human-readable failure reason.
    ///
    /// Uses the backend's `{"error": "..."}` body when present, else the raw
    /// body, else the status reason phrase.
    #[must_use]
    pub fn error_message(&self) -> String {
        if let Ok(body) = serde_json::from_str::<ErrorBody>(&self.body) {
            return body.error;
        }
        let text = self.body.trim();
        if text.is_empty() {
            self.status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        } else {
            text.to_string()
        }
    }
}

/// Something that can complete an [`ApiRequest`].
pub trait HttpTransport: Send + Sync + 'static {
    /// Perform the call. Non-2xx statuses are returned as responses.
    fn send(
        &self,
        request: ApiRequest,
    ) -> impl Future<Output = Result<ApiResponse, TransportError>> + Send;
}

// =============================================================================
// ReqwestTransport
// =============================================================================

/// [`HttpTransport`] over `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: Url,
}

impl ReqwestTransport {
    /// Create a transport for the configured API base URL.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Http` if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("dislion-client/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_http_client(client, &config.api_url))
    }

    /// Use a custom HTTP client (for connection pool reuse).
    #[must_use]
    pub fn with_http_client(client: reqwest::Client, base_url: &Url) -> Self {
        Self {
            client,
            base_url: directory_url(base_url),
        }
    }

    /// Resolve an API path against the base URL, keeping any base path prefix.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::InvalidPath` if the result is not a valid URL.
    pub fn resolve(&self, path: &str) -> Result<Url, TransportError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|source| TransportError::InvalidPath {
                path: path.to_string(),
                source,
            })
    }
}

/// Ensure the base URL ends in `/` so joins append instead of replacing.
fn directory_url(url: &Url) -> Url {
    let mut url = url.clone();
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

impl HttpTransport for ReqwestTransport {
    #[instrument(
        skip_all,
        fields(method = %request.method(), path = request.path(), request_id)
    )]
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = self.resolve(request.path())?;
        let request_id = Uuid::new_v4().to_string();
        Span::current().record("request_id", request_id.as_str());

        let mut builder = self
            .client
            .request(request.method().clone(), url)
            .header(REQUEST_ID_HEADER, request_id.as_str());

        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(token) = request.bearer() {
            builder = builder.bearer_auth(token.expose_secret());
        }
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(status = status.as_u16(), "API call completed");

        Ok(ApiResponse::new(status, body))
    }
}
