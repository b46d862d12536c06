use std::fmt;

/// Progress of document processing, as shown in the header badge.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum UploadStatus {
    /// Nothing to report.
    #[default]
    Idle,

    /// A document is being analyzed.
    Uploading,

    /// Analysis just finished.
    Done,
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadStatus::Idle => f.write_str("idle"),
            UploadStatus::Uploading => f.write_str("uploading"),
            UploadStatus::Done => f.write_str("done"),
        }
    }
}
