/// Severity of a [`Notice`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum NoticeLevel {
    /// Something finished well.
    Success,

    /// Neutral information.
    Info,

    /// Something went wrong.
    Error,
}

/// A transient, user-visible notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Severity.
    pub level: NoticeLevel,

    /// Text shown to the user.
    pub text: String,
}

impl Notice {
    /// A success notice.
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            text: text.into(),
        }
    }

    /// An informational notice.
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            text: text.into(),
        }
    }

    /// An error notice.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }
}
