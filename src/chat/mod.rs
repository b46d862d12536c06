//! Terminal chat over DocWeave rooms.
//!
//! This module provides the pieces of the `docweave-chat` REPL built on top of
//! the client library:
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`commands`]: Slash command parsing
//! - [`view`]: Text layouts for rooms, headers and conversations

mod commands;
mod config;
mod view;

pub use crate::render::{PlainTextRenderer, Renderer};
pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig};
pub use view::{format_header, format_history, format_rooms, format_user};
