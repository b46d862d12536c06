//! Durable storage for session tokens.
//!
//! Tokens are stored under three keys, `accessToken`, `refreshToken` and
//! `user`, with the user kept as a JSON-encoded string. The layout matches what
//! the web client keeps in local storage, so a token file can be inspected or
//! seeded by hand.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use utf8path::Path;

use crate::error::{Error, Result};
use crate::types::{Session, User};

/// Persistence for the current session.
#[async_trait::async_trait]
pub trait TokenStore: Send + Sync {
    /// Load the stored session, if one is complete.
    async fn load(&self) -> Result<Option<Session>>;

    /// Replace the stored session.
    async fn save(&self, session: &Session) -> Result<()>;

    /// Remove all stored tokens.
    async fn clear(&self) -> Result<()>;
}

/// On-disk record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
struct StoredTokens {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user: Option<String>,
}

impl StoredTokens {
    fn from_session(session: &Session) -> Result<Self> {
        let user = session
            .user
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        Ok(Self {
            access_token: Some(session.access_token.clone()),
            refresh_token: Some(session.refresh_token.clone()),
            user,
        })
    }

    fn into_session(self) -> Option<Session> {
        let access_token = self.access_token.filter(|t| !t.is_empty())?;
        let refresh_token = self.refresh_token.unwrap_or_default();
        // A corrupt user entry should not log anybody out.
        let user = self
            .user
            .and_then(|raw| serde_json::from_str::<User>(&raw).ok());
        Some(Session {
            access_token,
            refresh_token,
            user,
        })
    }
}

/// Stores tokens in a JSON file.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: Path<'static>,
}

impl FileTokenStore {
    /// Create a store backed by `path`.  The file is created on first save.
    pub fn new(path: Path<'_>) -> Self {
        Self {
            path: path.into_owned(),
        }
    }

    /// The backing file.
    pub fn path(&self) -> &Path<'static> {
        &self.path
    }

    fn temp_path(&self) -> String {
        format!("{}.tmp", self.path.as_str())
    }
}

#[async_trait::async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self) -> Result<Option<Session>> {
        let content = match tokio::fs::read_to_string(self.path.as_str()).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(Error::io(
                    format!("failed to read token file {}", self.path.as_str()),
                    err,
                ));
            }
        };
        let stored: StoredTokens = serde_json::from_str(&content).map_err(|err| {
            Error::serialization("failed to parse token file", Some(Box::new(err)))
        })?;
        Ok(stored.into_session())
    }

    async fn save(&self, session: &Session) -> Result<()> {
        let stored = StoredTokens::from_session(session)?;
        let content = serde_json::to_string_pretty(&stored)?;
        if let Some(parent) = std::path::Path::new(self.path.as_str()).parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| Error::io("failed to create token directory", err))?;
        }
        let temp = self.temp_path();
        // A leftover temp file would keep its old permissions.
        let _ = tokio::fs::remove_file(&temp).await;
        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create_new(true);
        // Tokens are credentials: owner read/write only.
        #[cfg(unix)]
        options.mode(0o600);
        let mut file = options
            .open(&temp)
            .await
            .map_err(|err| Error::io("failed to create token file", err))?;
        file.write_all(content.as_bytes())
            .await
            .map_err(|err| Error::io("failed to write token file", err))?;
        file.flush()
            .await
            .map_err(|err| Error::io("failed to write token file", err))?;
        drop(file);
        tokio::fs::rename(&temp, self.path.as_str())
            .await
            .map_err(|err| Error::io("failed to replace token file", err))
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(self.path.as_str()).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(Error::io("failed to remove token file", err)),
        }
    }
}

/// Keeps tokens in memory only.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    stored: Mutex<Option<StoredTokens>>,
}

impl MemoryTokenStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-seeded with a session.
    pub fn with_session(session: &Session) -> Result<Self> {
        Ok(Self {
            stored: Mutex::new(Some(StoredTokens::from_session(session)?)),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<StoredTokens>> {
        self.stored
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait::async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self) -> Result<Option<Session>> {
        Ok(self.lock().clone().and_then(StoredTokens::into_session))
    }

    async fn save(&self, session: &Session) -> Result<()> {
        *self.lock() = Some(StoredTokens::from_session(session)?);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.lock() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn session() -> Session {
        Session {
            access_token: "access-1".to_string(),
            refresh_token: "refresh-1".to_string(),
            user: Some(User::new(1, "lee@example.com", "Lee")),
        }
    }

    fn temp_file(name: &str) -> String {
        let dir = std::env::temp_dir().join(format!(
            "docweave-token-store-{}-{name}",
            std::process::id()
        ));
        dir.join("session.json").to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn file_store_round_trip_and_layout() {
        let path = temp_file("round-trip");
        let store = FileTokenStore::new(Path::from(path.as_str()));
        assert_eq!(store.load().await.unwrap(), None);

        store.save(&session()).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(session()));

        let raw: Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["accessToken"], "access-1");
        assert_eq!(raw["refreshToken"], "refresh-1");
        let user: Value = serde_json::from_str(raw["user"].as_str().unwrap()).unwrap();
        assert_eq!(user, json!({"userId": 1, "email": "lee@example.com", "name": "Lee"}));

        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
        store.clear().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn file_store_is_private_to_owner() {
        use std::os::unix::fs::PermissionsExt;

        let path = temp_file("permissions");
        let store = FileTokenStore::new(Path::from(path.as_str()));
        store.save(&session()).await.unwrap();
        // A second save replaces the file and must stay private too.
        store.save(&session()).await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o077, 0, "mode {mode:o}");
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn corrupt_user_keeps_tokens() {
        let path = temp_file("corrupt-user");
        std::fs::create_dir_all(std::path::Path::new(&path).parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            r#"{"accessToken":"a","refreshToken":"r","user":"not json"}"#,
        )
        .unwrap();
        let store = FileTokenStore::new(Path::from(path.as_str()));
        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.access_token, "a");
        assert!(loaded.user.is_none());
    }

    #[tokio::test]
    async fn memory_store_without_access_token_is_empty() {
        let store = MemoryTokenStore::new();
        assert_eq!(store.load().await.unwrap(), None);
        store.save(&session()).await.unwrap();
        assert!(store.load().await.unwrap().is_some());
        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
    }
}
