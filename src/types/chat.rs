use serde::{Deserialize, Serialize};

/// Body of a chat request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatRequest {
    /// The user's question.
    pub message: String,
}

impl ChatRequest {
    /// Create a chat request.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A complete, non-streamed answer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatResponse {
    /// Echo of the question.
    #[serde(default)]
    pub question: String,

    /// The answer in markdown.
    #[serde(default)]
    pub answer: String,
}
