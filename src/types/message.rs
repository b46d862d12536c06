use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Author of a chat message.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    /// The person asking questions.
    User,

    /// The document assistant.
    Ai,
}

impl Role {
    /// Wire representation of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Ai => "ai",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        match s.to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "ai" | "assistant" => Ok(Role::Ai),
            _ => Err(serde::de::Error::unknown_variant(&s, &["user", "ai"])),
        }
    }
}

/// A single entry in a room's conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Who wrote the message.
    pub role: Role,

    /// Markdown text.
    #[serde(default)]
    pub content: String,

    /// True while the answer is still being revealed or streamed.
    #[serde(skip)]
    pub is_streaming: bool,
}

impl Message {
    /// A finished user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            is_streaming: false,
        }
    }

    /// A finished AI message.
    pub fn ai(content: impl Into<String>) -> Self {
        Self {
            role: Role::Ai,
            content: content.into(),
            is_streaming: false,
        }
    }

    /// An empty AI message awaiting its answer.
    pub fn pending_ai() -> Self {
        Self {
            role: Role::Ai,
            content: String::new(),
            is_streaming: true,
        }
    }

    /// Returns true if this message was written by the assistant.
    pub fn is_ai(&self) -> bool {
        self.role == Role::Ai
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn roles_are_case_insensitive() {
        let messages: Vec<Message> = serde_json::from_value(json!([
            {"role": "user", "content": "hi"},
            {"role": "AI", "content": "hello"},
            {"role": "Assistant", "content": "again"}
        ]))
        .unwrap();
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].role, Role::Ai);
        assert_eq!(messages[2].role, Role::Ai);
        assert!(messages.iter().all(|m| !m.is_streaming));
    }

    #[test]
    fn unknown_role_is_an_error() {
        let result = serde_json::from_value::<Message>(json!({"role": "system", "content": ""}));
        assert!(result.is_err());
    }

    #[test]
    fn streaming_flag_is_not_serialized() {
        let value = serde_json::to_value(Message::pending_ai()).unwrap();
        assert_eq!(value, json!({"role": "ai", "content": ""}));
    }
}
