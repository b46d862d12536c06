//! Client configuration.
//!
//! Defaults suit a backend on `localhost:8080`. A YAML file can override any
//! field, and the `DOCWEAVE_API_URL` environment variable overrides the base URL.

use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::error::{Error, Result};
use crate::reveal::Revealer;

/// Base URL used when nothing else is configured.
pub const DEFAULT_API_URL: &str = "http://localhost:8080/api/";

/// Environment variable that overrides the base URL.
pub const API_URL_ENV: &str = "DOCWEAVE_API_URL";

/// How an answer reaches the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Wait for the full answer, then reveal it a few characters at a time.
    Reveal(Revealer),
    /// Append fragments as the backend streams them.
    Stream,
}

impl Default for Delivery {
    fn default() -> Self {
        Delivery::Reveal(Revealer::default())
    }
}

/// Settings shared by the gateway, the session and the room store.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// API root; relative endpoint paths are joined onto it.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Interval between background message polls.
    pub poll_interval: Duration,
    /// How long the "done" upload status is shown.
    pub done_clear_delay: Duration,
    /// Answer delivery mode.
    pub delivery: Delivery,
    /// Token file; `None` keeps tokens in memory.
    pub token_path: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(3),
            done_clear_delay: Duration::from_secs(3),
            delivery: Delivery::default(),
            token_path: None,
        }
    }
}

/// On-disk form of [`ClientConfig`]; every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    base_url: Option<String>,
    timeout_secs: Option<u64>,
    poll_interval_ms: Option<u64>,
    done_clear_delay_ms: Option<u64>,
    stream: Option<bool>,
    reveal_chunk_chars: Option<usize>,
    reveal_tick_ms: Option<u64>,
    token_path: Option<String>,
}

impl ClientConfig {
    /// Default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults with the environment override applied.
    pub fn from_env() -> Self {
        Self::new().with_env_overrides()
    }

    /// Load a YAML file over the defaults, then apply the environment override.
    pub fn from_yaml_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::io(format!("failed to read config {path}"), e))?;
        Ok(Self::from_yaml_str(&content)?.with_env_overrides())
    }

    /// Parse YAML over the defaults.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let file: ConfigFile = if content.trim().is_empty() {
            ConfigFile::default()
        } else {
            serde_yaml::from_str(content)?
        };
        let mut config = Self::default();
        if let Some(base_url) = file.base_url {
            config.base_url = base_url;
        }
        if let Some(secs) = file.timeout_secs {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = file.poll_interval_ms {
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = file.done_clear_delay_ms {
            config.done_clear_delay = Duration::from_millis(ms);
        }
        config.token_path = file.token_path;
        config.delivery = if file.stream.unwrap_or(false) {
            Delivery::Stream
        } else {
            let defaults = Revealer::default();
            Delivery::Reveal(Revealer::new(
                file.reveal_chunk_chars.unwrap_or(defaults.chunk_chars()),
                file.reveal_tick_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.tick()),
            ))
        };
        Ok(config)
    }

    fn with_env_overrides(self) -> Self {
        match std::env::var(API_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => self.with_base_url(url),
            _ => self,
        }
    }

    /// Sets the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the poll interval.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Sets how long the done status is shown.
    pub fn with_done_clear_delay(mut self, delay: Duration) -> Self {
        self.done_clear_delay = delay;
        self
    }

    /// Sets the delivery mode.
    pub fn with_delivery(mut self, delivery: Delivery) -> Self {
        self.delivery = delivery;
        self
    }

    /// Sets the token file.
    pub fn with_token_path(mut self, token_path: impl Into<String>) -> Self {
        self.token_path = Some(token_path.into());
        self
    }

    /// The parsed base URL, always ending in `/` so relative paths join beneath it.
    pub fn api_url(&self) -> Result<Url> {
        let mut url = Url::parse(self.base_url.trim())?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }
}

/// `~/.docweave/session.json` under the platform home directory.
pub fn default_token_path() -> String {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".docweave")
        .join("session.json")
        .to_string_lossy()
        .into_owned()
}

/// Expand a leading `~/` to the platform home directory.
pub fn expand_home(path: &str) -> String {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest).to_string_lossy().into_owned(),
        _ => path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ClientConfig::new();
        assert_eq!(config.base_url, DEFAULT_API_URL);
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.poll_interval, Duration::from_secs(3));
        assert_eq!(config.done_clear_delay, Duration::from_secs(3));
        assert_eq!(config.delivery, Delivery::Reveal(Revealer::default()));
        assert!(config.token_path.is_none());
    }

    #[test]
    fn token_path_lives_under_home() {
        let path = default_token_path();
        assert!(path.ends_with("session.json"));
        if let Some(home) = dirs::home_dir() {
            assert!(std::path::Path::new(&path).starts_with(&home));
            assert!(std::path::Path::new(&path).is_absolute());
        }
    }

    #[test]
    fn expand_home_only_touches_tilde_prefix() {
        assert_eq!(expand_home("/tmp/a.pdf"), "/tmp/a.pdf");
        assert_eq!(expand_home("docs/~/a.pdf"), "docs/~/a.pdf");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(
                std::path::PathBuf::from(expand_home("~/docs/a.pdf")),
                home.join("docs/a.pdf")
            );
        }
    }

    #[test]
    fn api_url_gets_trailing_slash() {
        let config = ClientConfig::new().with_base_url("http://example.com/api");
        let url = config.api_url().unwrap();
        assert_eq!(url.as_str(), "http://example.com/api/");
        assert_eq!(
            url.join("doc/rooms").unwrap().as_str(),
            "http://example.com/api/doc/rooms"
        );
    }

    #[test]
    fn invalid_base_url() {
        let config = ClientConfig::new().with_base_url("not a url");
        assert!(config.api_url().is_err());
    }

    #[test]
    fn yaml_overrides() {
        let config = ClientConfig::from_yaml_str(
            "base_url: http://docs.internal:9000/api/\n\
             timeout_secs: 5\n\
             poll_interval_ms: 500\n\
             reveal_chunk_chars: 4\n\
             reveal_tick_ms: 10\n\
             token_path: /tmp/tokens.json\n",
        )
        .unwrap();
        assert_eq!(config.base_url, "http://docs.internal:9000/api/");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.done_clear_delay, Duration::from_secs(3));
        assert_eq!(
            config.delivery,
            Delivery::Reveal(Revealer::new(4, Duration::from_millis(10)))
        );
        assert_eq!(config.token_path.as_deref(), Some("/tmp/tokens.json"));
    }

    #[test]
    fn yaml_stream_delivery() {
        let config = ClientConfig::from_yaml_str("stream: true\n").unwrap();
        assert_eq!(config.delivery, Delivery::Stream);
    }

    #[test]
    fn yaml_empty_is_default() {
        assert_eq!(ClientConfig::from_yaml_str("").unwrap(), ClientConfig::new());
    }

    #[test]
    fn yaml_unknown_field_rejected() {
        assert!(ClientConfig::from_yaml_str("colour: blue\n").is_err());
    }
}
