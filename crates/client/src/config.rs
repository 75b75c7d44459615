//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `DISLION_API_URL` - Backend base URL (default: `http://localhost:4000`)
//! - `DISLION_STATE_FILE` - Durable storage file (default: `.dislion/state.json`)
//! - `DISLION_REQUEST_TIMEOUT_SECS` - Per-request timeout (default: 30)
//! - `DISLION_REVOKE_TIMEOUT_SECS` - Budget for the logout revoke call (default: 5)
//! - `DISLION_CATALOG_CACHE_SECS` - Catalog cache TTL (default: 300)
//! - `DISLION_WHATSAPP_FALLBACK` - Contact number used when the backend has none
//!   (default: 573007571199)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Default backend URL for local development.
pub const DEFAULT_API_URL: &str = "http://localhost:4000";

/// Contact number used when the backend has none configured.
pub const DEFAULT_WHATSAPP_NUMBER: &str = "573007571199";

/// Route the UI navigates to once the session is gone.
pub const LOGIN_ROUTE: &str = "/login";

const DEFAULT_STATE_FILE: &str = ".dislion/state.json";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_REVOKE_TIMEOUT_SECS: u64 = 5;
const DEFAULT_CATALOG_CACHE_SECS: u64 = 300;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base URL; API paths are joined onto it
    pub api_url: Url,
    /// JSON file used as durable client storage
    pub state_file: PathBuf,
    /// Timeout applied to every HTTP call
    pub request_timeout: Duration,
    /// Budget for the fire-and-forget logout revoke call
    pub revoke_timeout: Duration,
    /// How long catalog reads stay cached
    pub catalog_cache_ttl: Duration,
    /// Contact number used when the backend has none configured
    pub whatsapp_fallback: String,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

impl ClientConfig {
    /// Configuration for `api_url` with every other setting at its default.
    #[must_use]
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            revoke_timeout: Duration::from_secs(DEFAULT_REVOKE_TIMEOUT_SECS),
            catalog_cache_ttl: Duration::from_secs(DEFAULT_CATALOG_CACHE_SECS),
            whatsapp_fallback: DEFAULT_WHATSAPP_NUMBER.to_string(),
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_url = parse_api_url(
            "DISLION_API_URL",
            &lookup("DISLION_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        )?;

        let mut config = Self::new(api_url);
        if let Some(path) = non_empty(lookup("DISLION_STATE_FILE")) {
            config.state_file = PathBuf::from(path);
        }
        config.request_timeout = get_secs(
            &lookup,
            "DISLION_REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?;
        config.revoke_timeout = get_secs(
            &lookup,
            "DISLION_REVOKE_TIMEOUT_SECS",
            DEFAULT_REVOKE_TIMEOUT_SECS,
        )?;
        config.catalog_cache_ttl = get_secs(
            &lookup,
            "DISLION_CATALOG_CACHE_SECS",
            DEFAULT_CATALOG_CACHE_SECS,
        )?;
        if let Some(number) = non_empty(lookup("DISLION_WHATSAPP_FALLBACK")) {
            if !number.chars().any(|c| c.is_ascii_digit()) {
                return Err(ConfigError::InvalidEnvVar(
                    "DISLION_WHATSAPP_FALLBACK".to_string(),
                    "must contain a phone number".to_string(),
                ));
            }
            config.whatsapp_fallback = number;
        }
        config.sentry_dsn = non_empty(lookup("SENTRY_DSN"));
        config.sentry_environment = non_empty(lookup("SENTRY_ENVIRONMENT"));

        Ok(config)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Parse the backend URL; only absolute http(s) URLs are usable off-browser.
fn parse_api_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}

/// Get a duration in whole seconds with a default value.
fn get_secs(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
) -> Result<Duration, ConfigError> {
    let Some(raw) = non_empty(lookup(key)) else {
        return Ok(Duration::from_secs(default));
    };
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}
