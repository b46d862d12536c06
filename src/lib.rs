// Public modules
pub mod chat;
pub mod client;
pub mod config;
pub mod error;
pub mod observability;
pub mod render;
pub mod reveal;
pub mod session;
pub mod sse;
pub mod status;
pub mod store;
pub mod token_store;
pub mod types;
pub mod utils;

// Re-exports
pub use client::{AnswerStream, DocWeave, cancellable, collect_answer};
pub use config::{ClientConfig, Delivery};
pub use error::{Error, Result};
pub use observability::register_biometrics;
pub use render::{PlainTextRenderer, Renderer, normalize_list_spacing};
pub use reveal::Revealer;
pub use session::SessionManager;
pub use status::{MarkerInference, ProcessingSignal, StatusInference};
pub use store::{FAILURE_WARNING, GUARDRAIL_WARNING, RoomPhase, RoomStore};
pub use token_store::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use types::*;
