use thiserror::Error;

use crate::transport::{StatusCode, TransportError};

/// Errors raised by the session manager.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A refresh was attempted with no refresh token stored.
    #[error("No refresh token available, sign in again")]
    NoRefreshToken,

    /// The backend refused the refresh token (expired, revoked or reused).
    #[error("Refresh rejected ({status}): {detail}")]
    RefreshRejected { status: StatusCode, detail: String },

    /// The backend could not be reached. The session is left untouched.
    #[error("Network failure: {0}")]
    Network(#[from] TransportError),

    /// The call was rejected with 401 and could not be recovered.
    #[error("Unauthorized: {detail}")]
    Unauthorized { detail: String },

    /// The backend refused the credentials.
    #[error("Login rejected ({status}): {message}")]
    LoginRejected { status: StatusCode, message: String },

    /// A non-2xx response on an ordinary call.
    #[error("Request failed ({status}): {message}")]
    Api { status: StatusCode, message: String },

    /// A 2xx response did not have the expected shape.
    #[error("Unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl SessionError {
    /// Whether the failure means the user must sign in again.
    ///
    /// Network failures are transient and return `false`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::NoRefreshToken | Self::RefreshRejected { .. })
    }

    /// Whether the failure is an authorization failure of any kind.
    #[must_use]
    pub const fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Self::NoRefreshToken
                | Self::RefreshRejected { .. }
                | Self::Unauthorized { .. }
                | Self::LoginRejected { .. }
        )
    }
}
