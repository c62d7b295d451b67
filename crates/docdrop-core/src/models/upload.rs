use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ModelObject;

/// Opaque single-use token authorizing one file upload against one attachment.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ticket(String);

impl Ticket {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Tickets grant write access; keep them out of logs.
impl fmt::Debug for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ticket(<{} chars>)", self.0.len())
    }
}

/// File metadata the service expects back when the upload is committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetFileInfo {
    pub file_name: String,
    #[serde(default)]
    pub is_text: bool,
    #[serde(rename = "namedReferencedName", alias = "namedReferenceName", default)]
    pub named_reference_name: String,
}

/// A file supplied by the caller. Content is reference counted so upload
/// tasks share the caller's buffer.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub content: Bytes,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// One file to upload into one attachment placeholder.
#[derive(Debug, Clone)]
pub struct UploadTask {
    /// Attachment (dataset) that receives the file.
    pub attachment: ModelObject,
    /// Object the attachment hangs off; failed attachments are removed from it.
    pub container: ModelObject,
    pub file_info: DatasetFileInfo,
    pub ticket: Ticket,
    pub source: SourceFile,
}

/// Transport-level result of an upload request.
///
/// `status == 0` means no HTTP response was received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResponse {
    pub status: u16,
    pub status_text: String,
}

impl UploadResponse {
    pub fn new(status: u16, status_text: impl Into<String>) -> Self {
        Self {
            status,
            status_text: status_text.into(),
        }
    }

    pub fn ok() -> Self {
        Self::new(200, "OK")
    }

    /// Response standing in for a request that never got an HTTP answer.
    pub fn transport_failure(reason: impl Into<String>) -> Self {
        Self::new(0, reason)
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_debug_hides_value() {
        let ticket = Ticket::new("secret-ticket-value");
        let debug = format!("{:?}", ticket);
        assert!(!debug.contains("secret"));
        assert_eq!(
            serde_json::to_value(&ticket).unwrap(),
            serde_json::json!("secret-ticket-value")
        );
    }

    #[test]
    fn dataset_file_info_accepts_both_reference_spellings() {
        let a: DatasetFileInfo = serde_json::from_value(serde_json::json!({
            "fileName": "a.pdf", "isText": false, "namedReferenceName": "PDF_Reference"
        }))
        .unwrap();
        let b: DatasetFileInfo = serde_json::from_value(serde_json::json!({
            "fileName": "a.pdf", "isText": false, "namedReferencedName": "PDF_Reference"
        }))
        .unwrap();
        assert_eq!(a, b);
        let out = serde_json::to_value(&a).unwrap();
        assert_eq!(out["namedReferencedName"], "PDF_Reference");
    }

    #[test]
    fn only_200_counts_as_success() {
        assert!(UploadResponse::ok().is_success());
        assert!(!UploadResponse::new(201, "Created").is_success());
        assert!(!UploadResponse::transport_failure("timeout").is_success());
        assert_eq!(UploadResponse::transport_failure("timeout").status, 0);
    }
}
