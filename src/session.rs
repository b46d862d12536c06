//! Session lifecycle: login, signup, refresh and logout.
//!
//! The [`SessionManager`] is the single owner of the client's tokens. It is
//! loaded from a [`TokenStore`] once at startup, mutated by login and refresh,
//! and cleared on logout or when the backend terminates the session. Every
//! change is written through to the store and published on a watch channel so
//! views can return to the login prompt.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use reqwest::Client as ReqwestClient;
use serde::Serialize;
use serde_json::json;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use url::Url;

use crate::client::{read_envelope, transport_error};
use crate::error::{Error, Result};
use crate::observability::{SESSION_FORCED_LOGOUTS, SESSION_REFRESH_FAILURES, SESSION_REFRESHES};
use crate::token_store::TokenStore;
use crate::types::{AuthState, Session, TokenResponse, User};

/// Owns the authentication tokens for one client.
pub struct SessionManager {
    http: ReqwestClient,
    base_url: Url,
    timeout: Duration,
    store: Arc<dyn TokenStore>,
    current: RwLock<Option<Session>>,
    refresh_lock: tokio::sync::Mutex<()>,
    state: watch::Sender<AuthState>,
}

impl SessionManager {
    /// Create a session manager and load any persisted session.
    pub async fn load(
        http: ReqwestClient,
        base_url: Url,
        timeout: Duration,
        store: Arc<dyn TokenStore>,
    ) -> Result<Self> {
        let session = store.load().await?;
        let initial = match &session {
            Some(session) => AuthState::LoggedIn(session.user.clone()),
            None => AuthState::LoggedOut,
        };
        debug!(authenticated = session.is_some(), "session loaded");
        let (state, _) = watch::channel(initial);
        Ok(Self {
            http,
            base_url,
            timeout,
            store,
            current: RwLock::new(session),
            refresh_lock: tokio::sync::Mutex::new(()),
            state,
        })
    }

    /// Log in with email and password.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
        let session = self
            .post_for_tokens("auth/login", &json!({"email": email, "password": password}))
            .await?;
        self.install(session.clone()).await?;
        info!(email, "logged in");
        Ok(session)
    }

    /// Create an account and log into it.
    pub async fn signup(&self, email: &str, password: &str, name: &str) -> Result<Session> {
        if name.trim().is_empty() {
            return Err(Error::validation(
                "a name is required to sign up",
                Some("name".to_string()),
            ));
        }
        let session = self
            .post_for_tokens(
                "auth/signup",
                &json!({"email": email, "password": password, "name": name}),
            )
            .await?;
        self.install(session.clone()).await?;
        info!(email, "signed up");
        Ok(session)
    }

    /// Log out.
    ///
    /// The server-side invalidation is best effort; local tokens are always cleared.
    pub async fn logout(&self) {
        if let Some(token) = self.access_token() {
            match self.base_url.join("auth/logout") {
                Ok(url) => {
                    let result = self
                        .http
                        .post(url)
                        .bearer_auth(token)
                        .json(&json!({}))
                        .send()
                        .await;
                    match result {
                        Ok(response) if !response.status().is_success() => {
                            warn!(status = %response.status(), "logout rejected; clearing local session anyway");
                        }
                        Ok(_) => {}
                        Err(err) => {
                            warn!(error = %err, "logout request failed; clearing local session anyway");
                        }
                    }
                }
                Err(err) => warn!(error = %err, "invalid logout url"),
            }
        }
        self.clear(AuthState::LoggedOut).await;
    }

    /// Exchange the stored refresh token for a new token pair.
    pub async fn refresh(&self) -> Result<Session> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    /// Refresh unless another task already replaced `stale_access_token`.
    ///
    /// Concurrent requests that fail with the same expired token share one refresh.
    pub async fn refresh_after(&self, stale_access_token: Option<&str>) -> Result<()> {
        let _guard = self.refresh_lock.lock().await;
        let current = self.access_token();
        if current.is_some() && current.as_deref() != stale_access_token {
            debug!("access token already refreshed by another request");
            return Ok(());
        }
        self.refresh_locked().await.map(|_| ())
    }

    async fn refresh_locked(&self) -> Result<Session> {
        let Some(refresh_token) = self.refresh_token() else {
            return Err(Error::authentication("no refresh token"));
        };
        SESSION_REFRESHES.click();
        debug!("refreshing access token");
        match self
            .post_for_tokens("auth/refresh", &json!({"refreshToken": refresh_token}))
            .await
        {
            Ok(session) => {
                self.install(session.clone()).await?;
                Ok(session)
            }
            Err(err) => {
                SESSION_REFRESH_FAILURES.click();
                warn!(error = %err, "token refresh failed");
                Err(err)
            }
        }
    }

    /// Terminate the session after the backend refused it.
    pub async fn expire(&self) {
        SESSION_FORCED_LOGOUTS.click();
        warn!("session expired; clearing tokens");
        self.clear(AuthState::Expired).await;
    }

    /// The current bearer token, if logged in.
    pub fn access_token(&self) -> Option<String> {
        self.read().as_ref().map(|s| s.access_token.clone())
    }

    fn refresh_token(&self) -> Option<String> {
        self.read()
            .as_ref()
            .map(|s| s.refresh_token.clone())
            .filter(|t| !t.is_empty())
    }

    /// The logged-in user, if the backend reported one.
    pub fn user(&self) -> Option<User> {
        self.read().as_ref().and_then(|s| s.user.clone())
    }

    /// Returns true if an access token is held.
    pub fn is_authenticated(&self) -> bool {
        self.read().is_some()
    }

    /// Observe authentication state changes.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    async fn install(&self, session: Session) -> Result<()> {
        self.store.save(&session).await?;
        let user = session.user.clone();
        *self.write() = Some(session);
        self.state.send_replace(AuthState::LoggedIn(user));
        Ok(())
    }

    async fn clear(&self, state: AuthState) {
        *self.write() = None;
        if let Err(err) = self.store.clear().await {
            warn!(error = %err, "failed to clear stored tokens");
        }
        self.state.send_replace(state);
    }

    async fn post_for_tokens<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Session> {
        let url = self.base_url.join(path)?;
        debug!(%url, "auth request");
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;
        let envelope = read_envelope(response).await.map_err(as_auth_error)?;
        let tokens: TokenResponse = envelope.into_data().map_err(as_auth_error)?;
        tokens
            .into_session()
            .ok_or_else(|| Error::authentication("token response is missing a token"))
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Option<Session>> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Option<Session>> {
        self.current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Rejections from the auth endpoints are credential problems, not generic request failures.
fn as_auth_error(err: Error) -> Error {
    match err {
        Error::Request { .. } | Error::NotFound { .. } | Error::Serialization { .. } => {
            Error::authentication(err.to_string())
        }
        other => other,
    }
}
