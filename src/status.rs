//! Document-processing status derived from the conversation.
//!
//! The backend has no status endpoint for document ingestion. Instead it
//! posts AI messages announcing when analysis starts, completes or fails, and
//! the client recognises those announcements. The recognition lives behind
//! [`StatusInference`] so a structured status field can replace it later.

use crate::types::Message;

/// What the latest message says about document processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingSignal {
    /// Ingestion has begun.
    Starting,
    /// Ingestion finished and the document can be queried.
    Complete,
    /// Ingestion failed.
    Failed,
}

/// Derives a processing signal from the last message of a room.
pub trait StatusInference: Send + Sync {
    /// Inspect `message`; `None` means it carries no processing signal.
    fn infer(&self, message: &Message) -> Option<ProcessingSignal>;
}

/// Recognises the backend's fixed announcement phrases.
#[derive(Debug, Clone)]
pub struct MarkerInference {
    starting: Vec<String>,
    complete: Vec<String>,
    failed: Vec<String>,
}

impl MarkerInference {
    /// Recognise custom phrases.
    pub fn new(
        starting: impl IntoIterator<Item = impl Into<String>>,
        complete: impl IntoIterator<Item = impl Into<String>>,
        failed: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            starting: starting.into_iter().map(Into::into).collect(),
            complete: complete.into_iter().map(Into::into).collect(),
            failed: failed.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for MarkerInference {
    fn default() -> Self {
        Self::new(
            ["분석을 시작합니다", "Document analysis started"],
            ["분석이 완료되었습니다", "Document analysis complete"],
            ["오류가 발생했습니다", "Document analysis failed"],
        )
    }
}

fn contains_any(content: &str, phrases: &[String]) -> bool {
    phrases.iter().any(|p| content.contains(p.as_str()))
}

impl StatusInference for MarkerInference {
    fn infer(&self, message: &Message) -> Option<ProcessingSignal> {
        if !message.is_ai() {
            return None;
        }
        // Start, then complete, then failure; the first match wins.
        if contains_any(&message.content, &self.starting) {
            Some(ProcessingSignal::Starting)
        } else if contains_any(&message.content, &self.complete) {
            Some(ProcessingSignal::Complete)
        } else if contains_any(&message.content, &self.failed) {
            Some(ProcessingSignal::Failed)
        } else {
            None
        }
    }
}
