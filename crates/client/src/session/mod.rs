//! Session manager: access/refresh token lifecycle and authenticated calls.
//!
//! A [`SessionManager`] is an explicit context object. It is built with
//! [`SessionManager::init`], which rehydrates the session from durable
//! storage, and torn down with [`SessionManager::dispose`]. Clones share the
//! same session.
//!
//! # Refresh
//!
//! [`SessionManager::request`] attaches the current access token. On a 401 it
//! refreshes once and retries once. Refreshes are single-flight: a Tokio mutex
//! gates the exchange and every session change bumps an epoch, so concurrent
//! 401s under the same epoch produce a single refresh whose result they all
//! reuse. A refresh that finishes after a logout or login is discarded.
//!
//! Terminal refresh failures ([`SessionError::is_terminal`]) clear the session
//! and fire the expiry callback exactly once. Network failures propagate and
//! leave the session in place.

mod error;

pub use error::SessionError;

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::runtime::Handle;
use tracing::{debug, info, instrument, warn};

use dislion_core::UserRecord;

use crate::config::{ClientConfig, LOGIN_ROUTE};
use crate::storage::{KeyValueStore, keys, read_json, write_json};
use crate::transport::{ApiRequest, ApiResponse, HttpTransport, StatusCode};

/// Auth endpoint paths, relative to the API base URL.
pub mod endpoints {
    pub const LOGIN: &str = "/api/users/login";
    pub const REFRESH: &str = "/api/users/refresh-token";
    pub const LOGOUT: &str = "/api/users/logout";
    pub const CHANGE_PASSWORD: &str = "/api/users/change-password";
}

/// Access and refresh token, always held together.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: SecretString,
    pub refresh: SecretString,
}

impl TokenPair {
    #[must_use]
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: SecretString::from(access.into()),
            refresh: SecretString::from(refresh.into()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    token: String,
    refresh_token: String,
    user: UserRecord,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
    refresh_token: String,
}

#[derive(Debug, Default)]
struct SessionState {
    tokens: Option<TokenPair>,
    user: Option<UserRecord>,
    /// Bumped on every login, rotation, logout and expiry.
    epoch: u64,
}

type ExpiryCallback = Arc<dyn Fn() + Send + Sync>;

/// Authenticated identity plus an HTTP wrapper that hides transient 401s.
pub struct SessionManager<T> {
    inner: Arc<SessionInner<T>>,
}

struct SessionInner<T> {
    transport: T,
    storage: Arc<dyn KeyValueStore>,
    revoke_timeout: Duration,
    state: Mutex<SessionState>,
    refresh_gate: tokio::sync::Mutex<()>,
    on_expired: Mutex<Option<ExpiryCallback>>,
}

impl<T> Clone for SessionManager<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for SessionManager<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("SessionManager")
            .field("authenticated", &state.tokens.is_some())
            .field("user", &state.user.as_ref().map(|u| u.id))
            .field("epoch", &state.epoch)
            .finish_non_exhaustive()
    }
}

impl<T: HttpTransport> SessionManager<T> {
    /// Build a session context and rehydrate it from `storage`.
    ///
    /// Never fails: unreadable or inconsistent stored state is logged and
    /// treated as signed out.
    pub fn init(transport: T, storage: Arc<dyn KeyValueStore>, config: &ClientConfig) -> Self {
        let (tokens, user) = rehydrate(storage.as_ref());
        debug!(
            authenticated = tokens.is_some(),
            user_id = ?user.as_ref().map(|u| u.id),
            "Session rehydrated"
        );

        Self {
            inner: Arc::new(SessionInner {
                transport,
                storage,
                revoke_timeout: config.revoke_timeout,
                state: Mutex::new(SessionState {
                    tokens,
                    user,
                    epoch: 0,
                }),
                refresh_gate: tokio::sync::Mutex::new(()),
                on_expired: Mutex::new(None),
            }),
        }
    }

    /// Drop the expiry callback and the in-memory session.
    ///
    /// Durable storage is left as is, so a later `init` restores the session.
    pub fn dispose(&self) {
        *self.callback_slot() = None;
        let mut state = self.state();
        state.tokens = None;
        state.user = None;
        state.epoch += 1;
    }

    /// Register the callback fired when the session expires irrecoverably.
    ///
    /// Replaces any previously registered callback.
    pub fn set_expiry_callback(&self, callback: impl Fn() + Send + Sync + 'static) {
        *self.callback_slot() = Some(Arc::new(callback));
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state().tokens.is_some()
    }

    #[must_use]
    pub fn user(&self) -> Option<UserRecord> {
        self.state().user.clone()
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.state().user.as_ref().is_some_and(UserRecord::is_admin)
    }

    #[must_use]
    pub fn access_token(&self) -> Option<SecretString> {
        self.state().tokens.as_ref().map(|t| t.access.clone())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Store a freshly issued session in memory and durable storage.
    pub fn login(&self, tokens: TokenPair, user: UserRecord) {
        let mut state = self.state();
        self.persist_tokens(Some(&tokens));
        self.persist_user(Some(&user));
        info!(user_id = %user.id, role = %user.role, "Signed in");
        state.tokens = Some(tokens);
        state.user = Some(user);
        state.epoch += 1;
    }

    /// Authenticate against the backend and store the issued session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::LoginRejected` for bad credentials,
    /// `SessionError::Network` if the backend is unreachable.
    #[instrument(skip(self, password))]
    pub async fn sign_in(
        &self,
        identifier: &str,
        password: &SecretString,
    ) -> Result<UserRecord, SessionError> {
        let request = ApiRequest::post(endpoints::LOGIN).json(json!({
            "identifier": identifier,
            "password": password.expose_secret(),
        }));
        let response = self.inner.transport.send(request).await?;
        if !response.is_success() {
            return Err(SessionError::LoginRejected {
                status: response.status(),
                message: response.error_message(),
            });
        }

        let body: LoginResponse = response.json()?;
        self.login(TokenPair::new(body.token, body.refresh_token), body.user.clone());
        Ok(body.user)
    }

    /// End the session and return the route the UI must navigate to.
    ///
    /// The backend is asked to revoke the refresh token in the background,
    /// bounded by the configured revoke timeout. Local state is cleared
    /// immediately, whatever happens to that call.
    pub fn logout(&self) -> &'static str {
        if let Some(tokens) = self.clear() {
            self.spawn_revoke(tokens.refresh);
        }
        info!("Signed out");
        LOGIN_ROUTE
    }

    /// Like [`logout`](Self::logout), but waits for the revoke call (bounded
    /// by the revoke timeout) before returning.
    ///
    /// For short-lived processes that would otherwise exit before the
    /// background call is sent. Local state is cleared before the call starts.
    pub async fn sign_out(&self) -> &'static str {
        if let Some(tokens) = self.clear() {
            revoke(&self.inner, tokens.refresh).await;
        }
        info!("Signed out");
        LOGIN_ROUTE
    }

    fn spawn_revoke(&self, refresh_token: SecretString) {
        let Ok(handle) = Handle::try_current() else {
            debug!("No async runtime, skipping refresh token revocation");
            return;
        };

        let inner = Arc::clone(&self.inner);
        handle.spawn(async move { revoke(&inner, refresh_token).await });
    }

    /// Change the signed-in user's password.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Api` if the backend refuses the change.
    #[instrument(skip_all)]
    pub async fn change_password(
        &self,
        current: &SecretString,
        new: &SecretString,
    ) -> Result<(), SessionError> {
        let request = ApiRequest::put(endpoints::CHANGE_PASSWORD).json(json!({
            "currentPassword": current.expose_secret(),
            "newPassword": new.expose_secret(),
        }));
        let response = self.request(request).await?;
        ensure_success(&response)?;
        info!("Password changed");
        Ok(())
    }

    // =========================================================================
    // Refresh
    // =========================================================================

    /// Exchange the refresh token for a new pair and return the new access token.
    ///
    /// On failure the session is left untouched; clearing it is up to the
    /// caller.
    ///
    /// # Errors
    ///
    /// - `SessionError::NoRefreshToken` if nothing is stored
    /// - `SessionError::RefreshRejected` if the backend refuses the token
    /// - `SessionError::Network` if the backend is unreachable
    pub async fn refresh(&self) -> Result<SecretString, SessionError> {
        let _gate = self.inner.refresh_gate.lock().await;
        let epoch = self.state().epoch;
        self.exchange(epoch).await
    }

    /// Refresh on behalf of a call that saw 401 under `epoch`.
    async fn refresh_after(&self, epoch: u64) -> Result<SecretString, SessionError> {
        let _gate = self.inner.refresh_gate.lock().await;

        if let Some(current) = self.changed_since(epoch) {
            debug!("Session changed while waiting, reusing current token");
            return current;
        }

        match self.exchange(epoch).await {
            Err(e) if e.is_terminal() => {
                warn!(error = %e, "Session expired");
                self.expire();
                Err(e)
            }
            result => result,
        }
    }

    /// Current access token if the session moved past `epoch`.
    fn changed_since(&self, epoch: u64) -> Option<Result<SecretString, SessionError>> {
        let state = self.state();
        if state.epoch == epoch {
            return None;
        }
        Some(
            state
                .tokens
                .as_ref()
                .map(|t| t.access.clone())
                .ok_or_else(|| SessionError::Unauthorized {
                    detail: "session ended".to_string(),
                }),
        )
    }

    /// Run the refresh exchange. Must be called with the refresh gate held.
    #[instrument(skip(self))]
    async fn exchange(&self, epoch: u64) -> Result<SecretString, SessionError> {
        let refresh_token = self
            .state()
            .tokens
            .as_ref()
            .map(|t| t.refresh.clone())
            .ok_or(SessionError::NoRefreshToken)?;

        let request = ApiRequest::post(endpoints::REFRESH)
            .json(json!({ "refreshToken": refresh_token.expose_secret() }));
        let response = self.inner.transport.send(request).await?;
        if !response.is_success() {
            return Err(SessionError::RefreshRejected {
                status: response.status(),
                detail: response.error_message(),
            });
        }

        let body: RefreshResponse = response.json()?;
        let tokens = TokenPair::new(body.access_token, body.refresh_token);
        let access = tokens.access.clone();
        if self.rotate(epoch, tokens) {
            debug!("Token pair rotated");
            return Ok(access);
        }

        debug!("Session changed during refresh, discarding rotated pair");
        self.changed_since(epoch).unwrap_or(Err(SessionError::Unauthorized {
            detail: "session ended".to_string(),
        }))
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// Issue `request` with the current bearer token, refreshing and retrying
    /// once on 401.
    ///
    /// Every non-401 response is returned as is, success or not.
    ///
    /// # Errors
    ///
    /// - `SessionError::Unauthorized` if the call is still rejected after the
    ///   retry, or if the session could not be recovered (the expiry callback
    ///   has fired)
    /// - `SessionError::Network` for transport failures, including during the
    ///   refresh
    #[instrument(skip_all, fields(method = %request.method(), path = request.path()))]
    pub async fn request(&self, request: ApiRequest) -> Result<ApiResponse, SessionError> {
        let (token, epoch) = {
            let state = self.state();
            (state.tokens.as_ref().map(|t| t.access.clone()), state.epoch)
        };

        let response = self
            .inner
            .transport
            .send(request.with_bearer(token.as_ref()))
            .await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        debug!("Access token rejected, refreshing");
        let token = match self.refresh_after(epoch).await {
            Ok(token) => token,
            Err(e) if e.is_auth_failure() => {
                return Err(SessionError::Unauthorized {
                    detail: response.error_message(),
                });
            }
            Err(e) => return Err(e),
        };

        let retried = self
            .inner
            .transport
            .send(request.with_bearer(Some(&token)))
            .await?;
        if retried.status() == StatusCode::UNAUTHORIZED {
            warn!("Call rejected again after refresh");
            return Err(SessionError::Unauthorized {
                detail: retried.error_message(),
            });
        }
        Ok(retried)
    }

    /// `request`, requiring a 2xx answer.
    ///
    /// # Errors
    ///
    /// As [`Self::request`], plus `SessionError::Api` carrying the backend's
    /// message for non-2xx responses.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, SessionError> {
        let response = self.request(request).await?;
        ensure_success(&response)?;
        Ok(response)
    }

    /// `send` and decode the JSON body.
    ///
    /// # Errors
    ///
    /// As [`Self::send`], plus `SessionError::Decode` for unexpected bodies.
    pub async fn send_json<R: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<R, SessionError> {
        Ok(self.send(request).await?.json()?)
    }

    /// `GET path` and decode the JSON body.
    ///
    /// # Errors
    ///
    /// As [`Self::send_json`].
    pub async fn get_json<R: DeserializeOwned>(&self, path: &str) -> Result<R, SessionError> {
        self.send_json(ApiRequest::get(path)).await
    }

    // =========================================================================
    // State
    // =========================================================================

    /// Clear the session and fire the expiry callback.
    fn expire(&self) {
        self.clear();
        let callback = self.callback_slot().clone();
        if let Some(callback) = callback {
            callback();
        }
    }

    /// Clear memory and storage, returning the tokens that were held.
    fn clear(&self) -> Option<TokenPair> {
        let mut state = self.state();
        self.persist_tokens(None);
        self.persist_user(None);
        state.user = None;
        state.epoch += 1;
        state.tokens.take()
    }

    /// Install a rotated pair unless the session moved past `epoch`.
    fn rotate(&self, epoch: u64, tokens: TokenPair) -> bool {
        let mut state = self.state();
        if state.epoch != epoch {
            return false;
        }
        self.persist_tokens(Some(&tokens));
        state.tokens = Some(tokens);
        state.epoch += 1;
        true
    }

    /// Write or erase the token pair. A pair that cannot be written whole is
    /// erased so rehydration never sees a new access token beside a spent
    /// refresh token.
    fn persist_tokens(&self, tokens: Option<&TokenPair>) {
        let storage = self.inner.storage.as_ref();
        if let Some(tokens) = tokens {
            let written = storage
                .set(keys::TOKEN, tokens.access.expose_secret())
                .and_then(|()| storage.set(keys::REFRESH_TOKEN, tokens.refresh.expose_secret()));
            let Err(e) = written else {
                return;
            };
            warn!(error = %e, "Failed to persist session tokens, erasing stored pair");
        }
        for key in [keys::TOKEN, keys::REFRESH_TOKEN] {
            if let Err(e) = storage.remove(key) {
                warn!(key, error = %e, "Failed to erase session token");
            }
        }
    }

    fn persist_user(&self, user: Option<&UserRecord>) {
        let storage = self.inner.storage.as_ref();
        let result = match user {
            Some(user) => write_json(storage, keys::USER, user),
            None => storage.remove(keys::USER),
        };
        if let Err(e) = result {
            warn!(error = %e, "Failed to persist session user");
        }
    }
}

impl<T> SessionManager<T> {
    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn callback_slot(&self) -> MutexGuard<'_, Option<ExpiryCallback>> {
        self.inner
            .on_expired
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Best-effort refresh token revocation. Never fails.
async fn revoke<T: HttpTransport>(inner: &SessionInner<T>, refresh_token: SecretString) {
    let request = ApiRequest::post(endpoints::LOGOUT)
        .json(json!({ "refreshToken": refresh_token.expose_secret() }));
    match tokio::time::timeout(inner.revoke_timeout, inner.transport.send(request)).await {
        Ok(Ok(response)) if response.is_success() => debug!("Refresh token revoked"),
        Ok(Ok(response)) => debug!(
            status = response.status().as_u16(),
            "Backend refused refresh token revocation"
        ),
        Ok(Err(e)) => debug!(error = %e, "Refresh token revocation failed"),
        Err(_) => debug!("Refresh token revocation timed out"),
    }
}

fn ensure_success(response: &ApiResponse) -> Result<(), SessionError> {
    if response.is_success() {
        Ok(())
    } else {
        Err(SessionError::Api {
            status: response.status(),
            message: response.error_message(),
        })
    }
}

// =============================================================================
// Rehydration
// =============================================================================

fn read_token(storage: &dyn KeyValueStore, key: &str) -> Option<String> {
    match storage.get(key) {
        Ok(value) => value.filter(|v| !v.is_empty()),
        Err(e) => {
            warn!(key, error = %e, "Failed to read stored token");
            None
        }
    }
}

/// Load the stored session, repairing it when only half of it survived.
fn rehydrate(storage: &dyn KeyValueStore) -> (Option<TokenPair>, Option<UserRecord>) {
    let access = read_token(storage, keys::TOKEN);
    let refresh = read_token(storage, keys::REFRESH_TOKEN);

    let tokens = match (access, refresh) {
        (Some(access), Some(refresh)) => Some(TokenPair::new(access, refresh)),
        (None, None) => None,
        _ => {
            warn!("Stored session holds only one token, discarding it");
            for key in [keys::TOKEN, keys::REFRESH_TOKEN] {
                if let Err(e) = storage.remove(key) {
                    warn!(key, error = %e, "Failed to erase stored token");
                }
            }
            None
        }
    };

    let user = match read_json::<UserRecord>(storage, keys::USER) {
        Ok(user) => user,
        Err(e) => {
            warn!(error = %e, "Stored user is unreadable, ignoring it");
            None
        }
    };

    if tokens.is_none() && user.is_some() {
        debug!("Discarding stored user without tokens");
        if let Err(e) = storage.remove(keys::USER) {
            warn!(error = %e, "Failed to erase stored user");
        }
        return (None, None);
    }

    (tokens, user)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use dislion_core::{Role, UserId};

    use super::*;
    use crate::storage::{MemoryStore, StorageError};
    use crate::transport::TransportError;

    /// Replies with queued responses in order, recording every request.
    #[derive(Default)]
    struct QueueTransport {
        replies: Mutex<VecDeque<Result<ApiResponse, TransportError>>>,
        sent: Mutex<Vec<ApiRequest>>,
    }

    impl QueueTransport {
        fn with(replies: Vec<Result<ApiResponse, TransportError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                sent: Mutex::default(),
            }
        }
    }

    impl HttpTransport for QueueTransport {
        async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
            self.sent.lock().unwrap().push(request);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Unavailable("no reply queued".into())))
        }
    }

    fn ok(body: &str) -> Result<ApiResponse, TransportError> {
        Ok(ApiResponse::new(StatusCode::OK, body))
    }

    fn status(code: StatusCode) -> Result<ApiResponse, TransportError> {
        Ok(ApiResponse::new(code, r#"{"error":"denied"}"#))
    }

    fn admin() -> UserRecord {
        UserRecord::new(UserId::new(1), Role::Admin)
    }

    fn manager(
        storage: &Arc<MemoryStore>,
        replies: Vec<Result<ApiResponse, TransportError>>,
    ) -> SessionManager<QueueTransport> {
        let config = ClientConfig::new("http://localhost:4000".parse().unwrap());
        SessionManager::init(QueueTransport::with(replies), storage.clone(), &config)
    }

    fn sent_paths(session: &SessionManager<QueueTransport>) -> Vec<String> {
        session
            .inner
            .transport
            .sent
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.path().to_string())
            .collect()
    }

    #[test]
    fn test_init_rehydrates_stored_session() {
        let storage = Arc::new(MemoryStore::with_entries([
            ("token", "A1"),
            ("refreshToken", "R1"),
            ("user", r#"{"id":1,"role":"admin","name":"Ana"}"#),
        ]));
        let session = manager(&storage, vec![]);

        assert!(session.is_authenticated());
        assert!(session.is_admin());
        assert_eq!(session.access_token().unwrap().expose_secret(), "A1");
        assert_eq!(session.user().unwrap().extra["name"], "Ana");
    }

    #[test]
    fn test_init_discards_half_pair() {
        let storage = Arc::new(MemoryStore::with_entries([
            ("token", "A1"),
            ("user", r#"{"id":1,"role":"admin"}"#),
        ]));
        let session = manager(&storage, vec![]);

        assert!(!session.is_authenticated());
        assert!(session.user().is_none());
        assert!(!storage.contains_key("token"));
        assert!(!storage.contains_key("user"));
    }

    #[test]
    fn test_init_ignores_corrupt_user() {
        let storage = Arc::new(MemoryStore::with_entries([
            ("token", "A1"),
            ("refreshToken", "R1"),
            ("user", "{broken"),
        ]));
        let session = manager(&storage, vec![]);

        assert!(session.is_authenticated());
        assert!(session.user().is_none());
        assert!(!session.is_admin());
    }

    #[test]
    fn test_login_persists_all_fields() {
        let storage = Arc::new(MemoryStore::new());
        let session = manager(&storage, vec![]);

        session.login(TokenPair::new("A1", "R1"), admin());

        assert_eq!(storage.get("token").unwrap().as_deref(), Some("A1"));
        assert_eq!(storage.get("refreshToken").unwrap().as_deref(), Some("R1"));
        let stored: serde_json::Value =
            serde_json::from_str(&storage.get("user").unwrap().unwrap()).unwrap();
        assert_eq!(stored["role"], "admin");
    }

    #[test]
    fn test_logout_without_runtime_still_clears() {
        let storage = Arc::new(MemoryStore::new());
        let session = manager(&storage, vec![]);
        session.login(TokenPair::new("A1", "R1"), admin());

        assert_eq!(session.logout(), "/login");
        assert!(!session.is_authenticated());
        assert!(session.user().is_none());
        assert!(!storage.contains_key("token"));
        assert!(!storage.contains_key("refreshToken"));
        assert!(!storage.contains_key("user"));
    }

    #[tokio::test]
    async fn test_sign_out_revokes_refresh_token() {
        let storage = Arc::new(MemoryStore::new());
        let session = manager(&storage, vec![ok("")]);
        session.login(TokenPair::new("A1", "R1"), admin());

        assert_eq!(session.sign_out().await, "/login");

        assert!(!session.is_authenticated());
        let sent = session.inner.transport.sent.lock().unwrap();
        assert_eq!(sent[0].path(), endpoints::LOGOUT);
        assert_eq!(sent[0].body().unwrap()["refreshToken"], "R1");
    }

    #[tokio::test]
    async fn test_sign_out_ignores_revoke_failure() {
        let storage = Arc::new(MemoryStore::new());
        let session = manager(&storage, vec![]);
        session.login(TokenPair::new("A1", "R1"), admin());

        session.sign_out().await;

        assert!(!storage.contains_key("token"));
        assert!(!storage.contains_key("refreshToken"));
    }

    #[test]
    fn test_dispose_keeps_storage() {
        let storage = Arc::new(MemoryStore::new());
        let session = manager(&storage, vec![]);
        session.login(TokenPair::new("A1", "R1"), admin());

        session.dispose();

        assert!(!session.is_authenticated());
        assert!(storage.contains_key("token"));
        assert!(manager(&storage, vec![]).is_authenticated());
    }

    #[tokio::test]
    async fn test_refresh_without_token() {
        let storage = Arc::new(MemoryStore::new());
        let session = manager(&storage, vec![]);

        let result = session.refresh().await;
        assert!(matches!(result, Err(SessionError::NoRefreshToken)));
        assert!(sent_paths(&session).is_empty());
    }

    #[tokio::test]
    async fn test_refresh_rotates_pair() {
        let storage = Arc::new(MemoryStore::new());
        let session = manager(
            &storage,
            vec![ok(r#"{"accessToken":"A2","refreshToken":"R2"}"#)],
        );
        session.login(TokenPair::new("A1", "R1"), admin());

        let token = session.refresh().await.unwrap();

        assert_eq!(token.expose_secret(), "A2");
        assert_eq!(storage.get("token").unwrap().as_deref(), Some("A2"));
        assert_eq!(storage.get("refreshToken").unwrap().as_deref(), Some("R2"));

        let sent = session.inner.transport.sent.lock().unwrap();
        assert_eq!(sent[0].path(), endpoints::REFRESH);
        assert_eq!(sent[0].body().unwrap()["refreshToken"], "R1");
    }

    /// Memory store whose writes to one key fail once `failing` is set.
    struct FlakyStore {
        entries: MemoryStore,
        key: &'static str,
        failing: AtomicBool,
    }

    impl KeyValueStore for FlakyStore {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.entries.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            if key == self.key && self.failing.load(Ordering::SeqCst) {
                return Err(std::io::Error::other("disk full").into());
            }
            self.entries.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), StorageError> {
            self.entries.remove(key)
        }
    }

    #[tokio::test]
    async fn test_half_written_rotation_erases_stored_pair() {
        let storage = Arc::new(FlakyStore {
            entries: MemoryStore::new(),
            key: "refreshToken",
            failing: AtomicBool::new(false),
        });
        let config = ClientConfig::new("http://localhost:4000".parse().unwrap());
        let transport =
            QueueTransport::with(vec![ok(r#"{"accessToken":"A2","refreshToken":"R2"}"#)]);
        let session = SessionManager::init(transport, storage.clone(), &config);
        session.login(TokenPair::new("A1", "R1"), admin());

        storage.failing.store(true, Ordering::SeqCst);
        let token = session.refresh().await.unwrap();

        // The running session keeps the rotated pair
        assert_eq!(token.expose_secret(), "A2");
        assert!(session.is_authenticated());

        // Storage holds neither half, so a restart begins signed out
        assert!(storage.get("token").unwrap().is_none());
        assert!(storage.get("refreshToken").unwrap().is_none());
        let restored = SessionManager::init(QueueTransport::default(), storage, &config);
        assert!(!restored.is_authenticated());
    }

    #[tokio::test]
    async fn test_refresh_rejection_leaves_session() {
        let storage = Arc::new(MemoryStore::new());
        let session = manager(&storage, vec![status(StatusCode::UNAUTHORIZED)]);
        session.login(TokenPair::new("A1", "R1"), admin());

        let result = session.refresh().await;

        assert!(matches!(result, Err(SessionError::RefreshRejected { .. })));
        assert!(session.is_authenticated());
    }

    #[tokio::test]
    async fn test_request_attaches_bearer() {
        let storage = Arc::new(MemoryStore::new());
        let session = manager(&storage, vec![ok("[]")]);
        session.login(TokenPair::new("A1", "R1"), admin());

        let response = session.request(ApiRequest::get("/api/products")).await.unwrap();

        assert!(response.is_success());
        let sent = session.inner.transport.sent.lock().unwrap();
        assert_eq!(sent[0].bearer().unwrap().expose_secret(), "A1");
    }

    #[tokio::test]
    async fn test_anonymous_request_has_no_bearer() {
        let storage = Arc::new(MemoryStore::new());
        let session = manager(&storage, vec![ok("[]")]);

        session.request(ApiRequest::get("/api/products")).await.unwrap();

        let sent = session.inner.transport.sent.lock().unwrap();
        assert!(sent[0].bearer().is_none());
    }

    #[tokio::test]
    async fn test_request_passes_through_other_errors() {
        let storage = Arc::new(MemoryStore::new());
        let session = manager(&storage, vec![status(StatusCode::FORBIDDEN)]);
        session.login(TokenPair::new("A1", "R1"), admin());

        let response = session.request(ApiRequest::get("/api/settings/x")).await.unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(sent_paths(&session), vec!["/api/settings/x"]);
    }

    #[tokio::test]
    async fn test_expiry_callback_is_replaced() {
        let storage = Arc::new(MemoryStore::new());
        let session = manager(
            &storage,
            vec![status(StatusCode::UNAUTHORIZED), status(StatusCode::UNAUTHORIZED)],
        );
        session.login(TokenPair::new("A1", "R1"), admin());

        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&first);
        session.set_expiry_callback(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let counter = Arc::clone(&second);
        session.set_expiry_callback(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let result = session.request(ApiRequest::get("/api/export")).await;

        assert!(matches!(result, Err(SessionError::Unauthorized { .. })));
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_sign_in_stores_session() {
        let storage = Arc::new(MemoryStore::new());
        let session = manager(
            &storage,
            vec![ok(
                r#"{"token":"A1","refreshToken":"R1","user":{"id":7,"role":"admin","email":"a@b.co"}}"#,
            )],
        );

        let user = session
            .sign_in("a@b.co", &SecretString::from("secret"))
            .await
            .unwrap();

        assert_eq!(user.id, UserId::new(7));
        assert!(session.is_admin());
        assert_eq!(storage.get("token").unwrap().as_deref(), Some("A1"));
    }

    #[tokio::test]
    async fn test_sign_in_rejected() {
        let storage = Arc::new(MemoryStore::new());
        let session = manager(&storage, vec![status(StatusCode::UNAUTHORIZED)]);

        let result = session.sign_in("a@b.co", &SecretString::from("wrong")).await;

        assert!(
            matches!(result, Err(SessionError::LoginRejected { message, .. }) if message == "denied")
        );
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_typed_helpers_decode_or_report_status() {
        let storage = Arc::new(MemoryStore::new());
        let session = manager(
            &storage,
            vec![ok(r#"[{"id":1,"name":"Ropa"}]"#), status(StatusCode::CONFLICT)],
        );
        session.login(TokenPair::new("A1", "R1"), admin());

        let names: Vec<serde_json::Value> = session.get_json("/api/categories").await.unwrap();
        assert_eq!(names[0]["name"], "Ropa");

        let result = session
            .send_json::<serde_json::Value>(ApiRequest::post("/api/categories"))
            .await;
        assert!(matches!(
            result,
            Err(SessionError::Api { status, message })
                if status == StatusCode::CONFLICT && message == "denied"
        ));
        assert!(session.is_authenticated());
    }

    #[tokio::test]
    async fn test_change_password_reports_refusal() {
        let storage = Arc::new(MemoryStore::new());
        let session = manager(&storage, vec![status(StatusCode::BAD_REQUEST)]);
        session.login(TokenPair::new("A1", "R1"), admin());

        let result = session
            .change_password(&SecretString::from("old"), &SecretString::from("new"))
            .await;

        assert!(matches!(result, Err(SessionError::Api { status, .. }) if status == StatusCode::BAD_REQUEST));
        let sent = session.inner.transport.sent.lock().unwrap();
        assert_eq!(sent[0].body().unwrap()["currentPassword"], "old");
    }
}
