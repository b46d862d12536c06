use serde::{Deserialize, Serialize};

use crate::types::{Session, User};

/// Token payload returned by login, signup and refresh.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    /// Short-lived bearer token.
    #[serde(default)]
    pub access_token: Option<String>,

    /// Long-lived token used to obtain a new access token.
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// Usually "Bearer".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    /// Account id.
    #[serde(default)]
    pub user_id: Option<i64>,

    /// Account email.
    #[serde(default)]
    pub email: Option<String>,

    /// Account display name.
    #[serde(default)]
    pub name: Option<String>,
}

impl TokenResponse {
    /// Returns the user described by this response when all fields are present.
    pub fn user(&self) -> Option<User> {
        match (self.user_id, &self.email, &self.name) {
            (Some(id), Some(email), Some(name)) => Some(User::new(id, email, name)),
            _ => None,
        }
    }

    /// Converts this response into a session.
    ///
    /// Returns `None` when either token is missing or empty.
    pub fn into_session(self) -> Option<Session> {
        let user = self.user();
        let access_token = self.access_token.filter(|t| !t.is_empty())?;
        let refresh_token = self.refresh_token.filter(|t| !t.is_empty())?;
        Some(Session {
            access_token,
            refresh_token,
            user,
        })
    }
}
