//! Session coordination: token attachment, refresh-on-401 and single-flight refresh.
//!
//! Every call goes through [`SessionCoordinator::request`], which attaches the
//! current access token. When a call fails with 401 and a refresh token is
//! held, the coordinator refreshes the session and retries the call once.
//! Concurrent callers that hit 401 while a refresh is pending await the same
//! refresh instead of starting their own.
//!
//! The token pair and the pending-refresh slot sit behind short-lived locks
//! that are never held across an `.await`.

use crate::config::ClientConfig;
use crate::error::{ApiError, ClientError, ClientResult, ErrorCode};
use crate::session_fsm::{AuthState, SessionInput, SessionMachine};
use crate::transport::{HttpSend, ReqwestSender, Transport, TransportCall};
use crate::types::{ApiEnvelope, AuthSession, RequestConfig};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use queek_storage::{default_storage, TokenStorage};
use reqwest::header::HeaderMap;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Callback type for session state change notifications.
pub type AuthStateCallback = Box<dyn Fn(AuthState) + Send + Sync>;

type SharedRefresh = Shared<BoxFuture<'static, ClientResult<AuthSession>>>;

struct PendingRefresh {
    id: u64,
    future: SharedRefresh,
}

#[derive(Default)]
struct TokenPair {
    access: Option<String>,
    refresh: Option<String>,
}

pub(crate) struct SessionInner {
    transport: Transport,
    access_storage: Arc<dyn TokenStorage>,
    refresh_storage: Arc<dyn TokenStorage>,
    access_key: String,
    refresh_key: String,
    platform: String,
    auth_prefix: String,
    /// Normalized refresh endpoint path, for loop prevention.
    refresh_path: String,
    tokens: Mutex<TokenPair>,
    pending_refresh: Mutex<Option<PendingRefresh>>,
    next_refresh_id: AtomicU64,
    fsm: Mutex<SessionMachine>,
    state_callback: Mutex<Option<Arc<dyn Fn(AuthState) + Send + Sync>>>,
}

/// Owns the session tokens and mediates every outbound call.
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct SessionCoordinator {
    pub(crate) inner: Arc<SessionInner>,
}

impl SessionCoordinator {
    /// Create a coordinator, loading any persisted tokens.
    ///
    /// Fails on invalid configuration or when the stored tokens cannot be read.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        config.validate()?;

        let http: Arc<dyn HttpSend> = match config.http {
            Some(http) => http,
            None => Arc::new(ReqwestSender::new(config.timeout)?),
        };
        let transport = Transport::new(
            &config.base_url,
            config.client_key,
            config.vendor_slug,
            http,
        );

        let access_storage = config.access_token_storage.unwrap_or_else(default_storage);
        let refresh_storage = config.refresh_token_storage.unwrap_or_else(default_storage);

        let access = access_storage.get(&config.access_token_storage_key)?;
        let refresh = refresh_storage.get(&config.refresh_token_storage_key)?;

        let auth_prefix = normalize_prefix(&config.auth_prefix);
        let refresh_path = normalize_path(&format!("{auth_prefix}/token/refresh"));

        let mut fsm = SessionMachine::new();
        if access.is_some() || refresh.is_some() {
            debug!("Restored session tokens from storage");
            let _ = fsm.consume(&SessionInput::Restore);
        }

        Ok(Self {
            inner: Arc::new(SessionInner {
                transport,
                access_storage,
                refresh_storage,
                access_key: config.access_token_storage_key,
                refresh_key: config.refresh_token_storage_key,
                platform: config.platform,
                auth_prefix,
                refresh_path,
                tokens: Mutex::new(TokenPair { access, refresh }),
                pending_refresh: Mutex::new(None),
                next_refresh_id: AtomicU64::new(1),
                fsm: Mutex::new(fsm),
                state_callback: Mutex::new(None),
            }),
        })
    }

    /// Perform a call with the current access token attached.
    ///
    /// A 401 triggers one refresh-and-retry when a refresh token is held,
    /// retry is not disabled for the call, and the call is not itself the
    /// refresh endpoint. If that refresh fails the session is cleared and
    /// [`ClientError::Unauthenticated`] is returned.
    pub async fn request<T: DeserializeOwned>(
        &self,
        config: RequestConfig,
    ) -> ClientResult<ApiEnvelope<T>> {
        let payload = self.request_with_auto_refresh(&config).await?;
        decode_envelope(payload)
    }

    /// Refresh the session now. Shares any refresh already in flight.
    ///
    /// Fails with `invalid_refresh_token` (401) without a network call when no
    /// refresh token is held. A failed explicit refresh leaves the session as is.
    pub async fn refresh(&self) -> ClientResult<AuthSession> {
        self.inner.refresh_shared().await
    }

    /// True iff an access or refresh token is held locally.
    pub fn is_authenticated(&self) -> bool {
        let tokens = self.inner.tokens.lock();
        tokens.access.is_some() || tokens.refresh.is_some()
    }

    /// Snapshot of the current access token.
    pub fn access_token(&self) -> Option<String> {
        self.inner.tokens.lock().access.clone()
    }

    /// Current session state as tracked by the state machine.
    pub fn auth_state(&self) -> AuthState {
        AuthState::from(self.inner.fsm.lock().state())
    }

    /// Set a callback to be notified of session state changes.
    pub fn set_state_callback(&self, callback: AuthStateCallback) {
        *self.inner.state_callback.lock() = Some(Arc::from(callback));
    }

    pub(crate) fn endpoint(&self, suffix: &str) -> String {
        format!("{}{}", self.inner.auth_prefix, suffix)
    }

    pub(crate) fn platform(&self) -> &str {
        &self.inner.platform
    }

    pub(crate) fn refresh_token(&self) -> Option<String> {
        self.inner.tokens.lock().refresh.clone()
    }

    /// Store the token pair of a successful login or registration.
    pub(crate) fn sign_in(&self, session: &AuthSession) {
        self.inner
            .persist_tokens(&session.access_token, &session.refresh_token);
        self.inner.transition(&SessionInput::SignIn);
    }

    pub(crate) fn sign_out(&self) {
        self.inner.clear_tokens();
    }

    pub(crate) async fn request_with_auto_refresh(
        &self,
        config: &RequestConfig,
    ) -> ClientResult<Option<Value>> {
        let error = match self.send_once(config).await {
            Ok(payload) => return Ok(payload),
            Err(error) => error,
        };

        if !self.should_refresh(&error, config) {
            return Err(error);
        }

        debug!(path = %config.path, "Access token rejected, refreshing session");

        if let Err(refresh_error) = self.inner.refresh_shared().await {
            warn!(
                path = %config.path,
                error = %refresh_error,
                "Session refresh failed, clearing session"
            );
            self.inner.clear_tokens();
            return Err(ClientError::unauthenticated(refresh_error));
        }

        // Single retry; a second 401 is returned as is.
        self.send_once(config).await
    }

    async fn send_once(&self, config: &RequestConfig) -> ClientResult<Option<Value>> {
        let access_token = self.access_token();
        self.inner
            .transport
            .send(TransportCall {
                method: config.method.clone(),
                path: &config.path,
                body: config.body.as_ref(),
                headers: &config.options.headers,
                access_token: access_token.as_deref(),
            })
            .await
    }

    fn should_refresh(&self, error: &ClientError, config: &RequestConfig) -> bool {
        config.retry_allowed()
            && error.is_unauthorized()
            && self.refresh_token().is_some()
            && !self.inner.is_refresh_path(&config.path)
    }
}

impl SessionInner {
    /// Join the pending refresh, or start one.
    fn refresh_shared(self: &Arc<Self>) -> SharedRefresh {
        let mut pending = self.pending_refresh.lock();

        if let Some(existing) = pending.as_ref() {
            debug!(refresh_id = existing.id, "Joining in-flight token refresh");
            return existing.future.clone();
        }

        let id = self.next_refresh_id.fetch_add(1, Ordering::Relaxed);
        let inner = Arc::clone(self);
        let future = async move {
            let outcome = inner.refresh_once().await;
            inner.settle_refresh(id);
            outcome
        }
        .boxed()
        .shared();

        *pending = Some(PendingRefresh {
            id,
            future: future.clone(),
        });

        future
    }

    fn settle_refresh(&self, id: u64) {
        let mut pending = self.pending_refresh.lock();
        if pending.as_ref().is_some_and(|p| p.id == id) {
            *pending = None;
        }
    }

    async fn refresh_once(&self) -> ClientResult<AuthSession> {
        let (access_token, refresh_token) = {
            let tokens = self.tokens.lock();
            (tokens.access.clone(), tokens.refresh.clone())
        };

        let Some(refresh_token) = refresh_token else {
            return Err(ApiError::new(
                "Refresh token is missing.",
                ErrorCode::InvalidRefreshToken,
                401,
            )
            .into());
        };

        self.transition(&SessionInput::RefreshStarted);

        let path = format!("{}/token/refresh", self.auth_prefix);
        let body = json!({
            "refresh_token": refresh_token,
            "platform": self.platform,
        });
        let headers = HeaderMap::new();

        let result = self
            .transport
            .send(TransportCall {
                method: Method::POST,
                path: &path,
                body: Some(&body),
                headers: &headers,
                access_token: access_token.as_deref(),
            })
            .await
            .and_then(decode_envelope::<AuthSession>);

        match result {
            Ok(envelope) => {
                let session = envelope.data;
                self.persist_tokens(&session.access_token, &session.refresh_token);
                self.transition(&SessionInput::RefreshSucceeded);
                info!(user_id = %session.user.id, "Session refreshed");
                Ok(session)
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                self.transition(&SessionInput::RefreshAbandoned);
                Err(e)
            }
        }
    }

    fn is_refresh_path(&self, path: &str) -> bool {
        normalize_path(path) == self.refresh_path
    }

    /// Replace the token pair. Storage failures are logged; the in-memory
    /// pair stays authoritative for this process.
    fn persist_tokens(&self, access: &str, refresh: &str) {
        {
            let mut tokens = self.tokens.lock();
            tokens.access = Some(access.to_string());
            tokens.refresh = Some(refresh.to_string());
        }

        if let Err(e) = self.access_storage.set(&self.access_key, access) {
            warn!(key = %self.access_key, error = %e, "Failed to persist access token");
        }
        if let Err(e) = self.refresh_storage.set(&self.refresh_key, refresh) {
            warn!(key = %self.refresh_key, error = %e, "Failed to persist refresh token");
        }
    }

    fn clear_tokens(&self) {
        {
            let mut tokens = self.tokens.lock();
            tokens.access = None;
            tokens.refresh = None;
        }

        if let Err(e) = self.access_storage.remove(&self.access_key) {
            warn!(key = %self.access_key, error = %e, "Failed to remove access token");
        }
        if let Err(e) = self.refresh_storage.remove(&self.refresh_key) {
            warn!(key = %self.refresh_key, error = %e, "Failed to remove refresh token");
        }

        self.transition(&SessionInput::SignOut);
    }

    /// Advance the state machine. Inputs that do not apply in the current
    /// state are ignored.
    fn transition(&self, input: &SessionInput) {
        let (old_state, new_state) = {
            let mut fsm = self.fsm.lock();
            let old_state = AuthState::from(fsm.state());
            if fsm.consume(input).is_err() {
                debug!(state = ?old_state, input = ?input, "Ignoring session transition");
                return;
            }
            (old_state, AuthState::from(fsm.state()))
        };

        if old_state != new_state {
            debug!(old_state = ?old_state, new_state = ?new_state, "Session state transition");
            let callback = self.state_callback.lock().clone();
            if let Some(callback) = callback {
                callback(new_state);
            }
        }
    }
}

impl fmt::Debug for SessionCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCoordinator")
            .field("transport", &self.inner.transport)
            .field("auth_prefix", &self.inner.auth_prefix)
            .field("state", &self.auth_state())
            .finish_non_exhaustive()
    }
}

/// Decode a 2xx payload. A missing or `null` payload (204, non-JSON or
/// malformed body) yields an empty envelope whose data is decoded from `null`.
pub(crate) fn decode_envelope<T: DeserializeOwned>(
    payload: Option<Value>,
) -> ClientResult<ApiEnvelope<T>> {
    let decode_error = |e: serde_json::Error| ClientError::Decode(Arc::new(e));
    match payload {
        Some(mut payload) if !payload.is_null() => {
            if let Some(object) = payload.as_object_mut() {
                object.entry("data").or_insert(Value::Null);
            }
            serde_json::from_value(payload).map_err(decode_error)
        }
        _ => Ok(ApiEnvelope {
            status: String::new(),
            message: String::new(),
            data: serde_json::from_value(Value::Null).map_err(decode_error)?,
        }),
    }
}

/// Lower-case, drop the query string and trailing slashes, force a leading slash.
fn normalize_path(path: &str) -> String {
    let lowered = path.trim().to_lowercase();
    let without_query = lowered.split('?').next().unwrap_or_default();
    let trimmed = without_query.trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_end_matches('/');
    if trimmed.is_empty() || trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}
