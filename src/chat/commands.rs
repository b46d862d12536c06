//! Slash command parsing for the chat application.
//!
//! This module handles parsing of special commands that start with `/`,
//! allowing users to manage rooms and the session without asking a question.

use crate::types::RoomId;

/// A parsed chat command.
///
/// These commands drive the room store and are never sent as questions.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// List rooms, most recent first.
    Rooms,

    /// Open a room by id.
    Open(RoomId),

    /// Leave the current room so the next upload starts a new one.
    New,

    /// Upload a PDF into the current room, or into a new room.
    Upload(String),

    /// Delete a room by id.
    Delete(RoomId),

    /// Reprint the current room's conversation.
    History,

    /// Show the current room and document status.
    Status,

    /// Show the logged-in user.
    WhoAmI,

    /// Log out and return to the login prompt.
    Logout,

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a valid command,
/// or `None` if it should be treated as a question.
///
/// # Examples
///
/// ```
/// # use docweave::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/open 3").is_some());
/// assert!(parse_command("What is this document about?").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();

    if !input.starts_with('/') {
        return None;
    }

    let mut parts = input[1..].splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "rooms" | "ls" => ChatCommand::Rooms,
        "open" => parse_room_command(argument, ChatCommand::Open, "/open"),
        "new" => ChatCommand::New,
        "upload" => match argument {
            Some(path) => ChatCommand::Upload(path.to_string()),
            None => ChatCommand::Invalid("/upload requires a path to a PDF".to_string()),
        },
        "delete" | "rm" => parse_room_command(argument, ChatCommand::Delete, "/delete"),
        "history" => ChatCommand::History,
        "status" => ChatCommand::Status,
        "whoami" => ChatCommand::WhoAmI,
        "logout" => ChatCommand::Logout,
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        _ => ChatCommand::Invalid(format!("Unknown command: /{command}")),
    };

    Some(result)
}

fn parse_room_command<F>(argument: Option<&str>, ctor: F, name: &str) -> ChatCommand
where
    F: Fn(RoomId) -> ChatCommand,
{
    match argument {
        Some(arg) => match arg.parse::<RoomId>() {
            Ok(id) if id > 0 => ctor(id),
            _ => ChatCommand::Invalid(format!("{name} expects a room id, got '{arg}'")),
        },
        None => ChatCommand::Invalid(format!("{name} requires a room id")),
    }
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Commands:
  /rooms              List your rooms
  /open <id>          Open a room
  /new                Leave the current room; the next upload starts a new one
  /upload <path>      Upload a PDF into the current room (or a new room)
  /delete <id>        Delete a room (asks for confirmation)
  /history            Show the current conversation
  /status             Show the current room and document status
  /whoami             Show who is logged in
  /logout             Log out
  /help               Show this help message
  /quit               Exit

Anything else is asked as a question about the current room's documents.
Press Ctrl+C while an answer is printing to show the rest at once.
The login prompt does not hide the password as it is typed."#
}
