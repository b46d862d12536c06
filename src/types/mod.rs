// Public modules
pub mod chat;
pub mod envelope;
pub mod message;
pub mod notice;
pub mod room;
pub mod session;
pub mod token_response;
pub mod upload;
pub mod upload_status;
pub mod user;

// Re-exports
pub use chat::{ChatRequest, ChatResponse};
pub use envelope::{Envelope, ErrorDetail};
pub use message::{Message, Role};
pub use notice::{Notice, NoticeLevel};
pub use room::{Room, RoomId};
pub use session::{AuthState, Session};
pub use token_response::TokenResponse;
pub use upload::Upload;
pub use upload_status::UploadStatus;
pub use user::User;
