use serde::{Deserialize, Serialize};

/// The authenticated account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    /// Backend user id.
    #[serde(rename = "userId")]
    pub id: i64,

    /// Login email.
    pub email: String,

    /// Display name.
    pub name: String,
}

impl User {
    /// Create a new user record.
    pub fn new(id: i64, email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
            name: name.into(),
        }
    }
}
