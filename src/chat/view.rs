//! Text layouts for the terminal view.

use std::fmt::Write;

use crate::render::normalize_list_spacing;
use crate::types::{Message, Role, Room, RoomId, UploadStatus, User};

/// The room list, marking the active room.
pub fn format_rooms(rooms: &[Room], current: Option<RoomId>) -> String {
    if rooms.is_empty() {
        return "No rooms yet. Use /upload <path> to start one.".to_string();
    }
    let mut out = String::new();
    for room in rooms {
        let marker = if Some(room.id) == current { '*' } else { ' ' };
        let _ = write!(out, "{marker} [{}] {}", room.id, room.title);
        if let Some(created_at) = room.created_at {
            let _ = write!(
                out,
                "  ({}-{:02}-{:02})",
                created_at.year(),
                u8::from(created_at.month()),
                created_at.day()
            );
        }
        out.push('\n');
    }
    out.pop();
    out
}

/// Header line: room title and processing badge.
pub fn format_header(room: Option<&Room>, status: UploadStatus) -> String {
    let title = room.map(|r| r.title.as_str()).unwrap_or("DocWeave");
    match status {
        UploadStatus::Idle => format!("== {title} =="),
        UploadStatus::Uploading => format!("== {title} == [Processing Document...]"),
        UploadStatus::Done => format!("== {title} == [Ready]"),
    }
}

/// A conversation, one block per message.
pub fn format_history(messages: &[Message]) -> String {
    if messages.is_empty() {
        return "No messages yet. Ask a question about the uploaded documents.".to_string();
    }
    let blocks: Vec<String> = messages
        .iter()
        .map(|message| {
            let label = match message.role {
                Role::User => "you>",
                Role::Ai => "ai>",
            };
            let content = if message.is_ai() {
                normalize_list_spacing(&message.content)
            } else {
                message.content.clone()
            };
            format!("{label} {content}")
        })
        .collect();
    blocks.join("\n\n")
}

/// A one-line description of the logged-in user.
pub fn format_user(user: Option<&User>) -> String {
    match user {
        Some(user) => format!("{} <{}> (id {})", user.name, user.email, user.id),
        None => "Logged in (no profile reported)".to_string(),
    }
}
