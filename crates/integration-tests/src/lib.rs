//! Integration tests for the Dislion storefront client.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p dislion-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `session_refresh` - Token refresh, retry and expiry behavior
//! - `wishlist_persistence` - Wishlist and session sharing a state file
//! - `catalog_client` - Catalog calls, caching and settings fallbacks
//!
//! No backend is needed: [`ScriptedTransport`] answers every call from a
//! closure and records what was sent.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use dislion_client::transport::{ApiRequest, ApiResponse, HttpTransport, StatusCode, TransportError};
use dislion_client::{ClientConfig, KeyValueStore, SessionManager};
use secrecy::ExposeSecret;
use url::Url;

/// How the scripted backend answers a call.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Respond with a status and JSON body.
    Respond(StatusCode, serde_json::Value),
    /// Respond after a delay.
    Delayed(Duration, StatusCode, serde_json::Value),
    /// Fail as if the backend were unreachable.
    Fail,
    /// Never answer.
    Hang,
}

impl Reply {
    #[must_use]
    pub fn ok(body: serde_json::Value) -> Self {
        Self::Respond(StatusCode::OK, body)
    }

    /// A backend error in its `{"error": "..."}` shape.
    #[must_use]
    pub fn error(status: StatusCode, message: &str) -> Self {
        Self::Respond(status, serde_json::json!({ "error": message }))
    }
}

type Responder = dyn Fn(&ApiRequest) -> Reply + Send + Sync;

/// An [`HttpTransport`] driven by a closure.
///
/// Clones share the request log, so a test can keep one clone for
/// inspection after handing another to the session.
#[derive(Clone)]
pub struct ScriptedTransport {
    responder: Arc<Responder>,
    sent: Arc<Mutex<Vec<ApiRequest>>>,
}

impl ScriptedTransport {
    pub fn new(responder: impl Fn(&ApiRequest) -> Reply + Send + Sync + 'static) -> Self {
        Self {
            responder: Arc::new(responder),
            sent: Arc::default(),
        }
    }

    /// Every request sent so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of requests sent to `path`.
    #[must_use]
    pub fn count(&self, path: &str) -> usize {
        self.requests().iter().filter(|r| r.path() == path).count()
    }

    /// Bearer tokens carried by the requests to `path`, in order.
    #[must_use]
    pub fn bearers(&self, path: &str) -> Vec<Option<String>> {
        self.requests()
            .iter()
            .filter(|r| r.path() == path)
            .map(|r| r.bearer().map(|t| t.expose_secret().to_string()))
            .collect()
    }
}

impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let reply = (self.responder)(&request);
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);

        // Let concurrent callers interleave as they would on a real network
        tokio::task::yield_now().await;

        match reply {
            Reply::Respond(status, body) => Ok(ApiResponse::new(status, body.to_string())),
            Reply::Delayed(delay, status, body) => {
                tokio::time::sleep(delay).await;
                Ok(ApiResponse::new(status, body.to_string()))
            }
            Reply::Fail => Err(TransportError::Unavailable("connection refused".to_string())),
            Reply::Hang => std::future::pending().await,
        }
    }
}

/// Client configuration for tests: a local URL and a short revoke budget.
#[must_use]
pub fn test_config() -> ClientConfig {
    let mut config = ClientConfig::new(
        Url::parse("http://localhost:4000").expect("Failed to parse test API URL"),
    );
    config.revoke_timeout = Duration::from_millis(50);
    config.catalog_cache_ttl = Duration::from_secs(60);
    config
}

/// A session over `transport` persisting into `storage`.
pub fn session(
    transport: &ScriptedTransport,
    storage: Arc<dyn KeyValueStore>,
) -> SessionManager<ScriptedTransport> {
    SessionManager::init(transport.clone(), storage, &test_config())
}

/// A fresh state file path in a unique temporary directory.
#[must_use]
pub fn temp_state_file() -> PathBuf {
    std::env::temp_dir()
        .join(format!("dislion-it-{}", uuid::Uuid::new_v4()))
        .join("state.json")
}
