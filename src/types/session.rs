use serde::{Deserialize, Serialize};

use crate::types::User;

/// An authenticated session: the token pair plus the account it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    /// Bearer token attached to every authenticated request.
    pub access_token: String,

    /// Token exchanged for a fresh pair when the access token expires.
    pub refresh_token: String,

    /// The account, when the backend reported it.
    pub user: Option<User>,
}

/// Authentication state published to observers of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// A session is active.
    LoggedIn(Option<User>),

    /// The user logged out, or no session was ever established.
    LoggedOut,

    /// The session was terminated by the backend (failed refresh or revoked access).
    Expired,
}

impl AuthState {
    /// Returns true if a session is active.
    pub fn is_logged_in(&self) -> bool {
        matches!(self, AuthState::LoggedIn(_))
    }
}
