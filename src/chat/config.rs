//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and resolves the
//! arguments, an optional YAML file and the environment into one configuration.

use std::time::Duration;

use arrrg_derive::CommandLine;

use crate::config::{ClientConfig, Delivery, default_token_path};
use crate::error::Result;
use crate::reveal::Revealer;

/// Command-line arguments for the docweave-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Backend API root.
    #[arrrg(optional, "Backend API root (default: http://localhost:8080/api/)", "URL")]
    pub api_url: Option<String>,

    /// YAML configuration file.
    #[arrrg(optional, "YAML configuration file", "PATH")]
    pub config: Option<String>,

    /// Where the session tokens are kept.
    #[arrrg(optional, "Session token file (default: ~/.docweave/session.json)", "PATH")]
    pub token_file: Option<String>,

    /// Stream answers instead of revealing them.
    #[arrrg(flag, "Stream answers as they are generated")]
    pub stream: bool,

    /// Characters revealed per tick.
    #[arrrg(optional, "Characters revealed per tick (default: 2)", "CHARS")]
    pub reveal_chunk: Option<u32>,

    /// Milliseconds between reveal ticks.
    #[arrrg(optional, "Milliseconds between reveal ticks (default: 20)", "MS")]
    pub reveal_tick_ms: Option<u32>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Resolved configuration for a chat session.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Settings for the client and room store.
    pub client: ClientConfig,

    /// Token file backing the session.
    pub token_path: String,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    pub fn new() -> Self {
        Self {
            client: ClientConfig::new(),
            token_path: default_token_path(),
            use_color: true,
        }
    }

    /// Resolve arguments over the config file and environment.
    ///
    /// Flags win over the environment, which wins over the file.
    pub fn from_args(args: ChatArgs) -> Result<Self> {
        let mut client = match &args.config {
            Some(path) => ClientConfig::from_yaml_file(path)?,
            None => ClientConfig::from_env(),
        };
        if let Some(url) = args.api_url {
            client = client.with_base_url(url);
        }
        if args.stream {
            client = client.with_delivery(Delivery::Stream);
        } else if args.reveal_chunk.is_some() || args.reveal_tick_ms.is_some() {
            let current = match client.delivery {
                Delivery::Reveal(revealer) => revealer,
                Delivery::Stream => Revealer::default(),
            };
            let chunk = args
                .reveal_chunk
                .map(|c| c as usize)
                .unwrap_or(current.chunk_chars());
            let tick = args
                .reveal_tick_ms
                .map(|ms| Duration::from_millis(ms as u64))
                .unwrap_or(current.tick());
            client = client.with_delivery(Delivery::Reveal(Revealer::new(chunk, tick)));
        }
        let token_path = args
            .token_file
            .or_else(|| client.token_path.clone())
            .unwrap_or_else(default_token_path);
        Ok(Self {
            client,
            token_path,
            use_color: !args.no_color,
        })
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}
