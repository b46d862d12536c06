use bytes::Bytes;
use reqwest::multipart::{Form, Part};

use crate::error::{Error, Result};

const PDF_MIME: &str = "application/pdf";

fn check_extension(file_name: &str) -> Result<()> {
    if file_name.to_ascii_lowercase().ends_with(".pdf") {
        Ok(())
    } else {
        Err(Error::validation(
            format!("{file_name} is not a PDF file"),
            Some("file".to_string()),
        ))
    }
}

/// A document ready to be sent as the `file` part of a multipart request.
///
/// The bytes are reference-counted so the form can be rebuilt cheaply when a
/// request is replayed after a token refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    file_name: String,
    bytes: Bytes,
}

impl Upload {
    /// Create an upload from in-memory bytes.
    ///
    /// Only PDF files are accepted by the backend, so anything without a `.pdf`
    /// extension is rejected up front.
    pub fn from_bytes(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Result<Self> {
        let file_name = file_name.into();
        check_extension(&file_name)?;
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(Error::validation(
                format!("{file_name} is empty"),
                Some("file".to_string()),
            ));
        }
        Ok(Self { file_name, bytes })
    }

    /// Read an upload from disk.
    pub async fn from_path(path: &utf8path::Path<'_>) -> Result<Self> {
        let file_name = path
            .as_str()
            .rsplit('/')
            .next()
            .unwrap_or(path.as_str())
            .to_string();
        check_extension(&file_name)?;
        let bytes = tokio::fs::read(path.as_str())
            .await
            .map_err(|e| Error::io(format!("failed to read {}", path.as_str()), e))?;
        Self::from_bytes(file_name, bytes)
    }

    /// The file name sent to the backend.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false; empty uploads are rejected on construction.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Build a fresh multipart form for one request attempt.
    pub fn to_form(&self) -> Result<Form> {
        let part = Part::bytes(self.bytes.to_vec())
            .file_name(self.file_name.clone())
            .mime_str(PDF_MIME)
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build multipart body: {e}"),
                    Some(Box::new(e)),
                )
            })?;
        Ok(Form::new().part("file", part))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_pdf_regardless_of_case() {
        let upload = Upload::from_bytes("Report.PDF", b"%PDF-1.4".to_vec()).unwrap();
        assert_eq!(upload.file_name(), "Report.PDF");
        assert_eq!(upload.len(), 8);
        assert!(upload.to_form().is_ok());
    }

    #[test]
    fn rejects_other_extensions_and_empty_files() {
        let err = Upload::from_bytes("notes.txt", b"hello".to_vec()).unwrap_err();
        assert!(err.is_validation());

        let err = Upload::from_bytes("empty.pdf", Vec::new()).unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let path = utf8path::Path::from("/definitely/not/here.pdf");
        let err = Upload::from_path(&path).await.unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
