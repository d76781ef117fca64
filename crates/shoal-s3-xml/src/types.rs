//! The shapes exchanged with the storage service during a multipart upload.

use chrono::{DateTime, Utc};

/// One uploaded chunk, confirmed by the service.
///
/// Sequence numbers are caller-assigned, 1-based, unique within a session,
/// and need not be contiguous; the integrity tag is the opaque `ETag` the
/// service returned for the part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    /// Caller-assigned sequence number.
    pub number: u32,
    /// Server-issued integrity tag. Non-empty for any successfully
    /// uploaded part.
    pub etag: String,
    /// Part size in bytes.
    pub size: u64,
}

/// One `(sequence number, integrity tag)` pair of the completion manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    /// Sequence number of the uploaded part.
    pub part_number: u32,
    /// Integrity tag returned when the part was uploaded.
    pub etag: String,
}

/// The `CompleteMultipartUpload` request body.
///
/// The service rejects or mis-assembles an unsorted manifest, so the parts
/// are ordered by ascending sequence number at construction, whatever order
/// the caller supplied.
#[derive(Debug, Clone)]
pub struct CompleteMultipartUpload {
    /// Manifest entries, ascending by part number.
    pub parts: Vec<CompletedPart>,
}

impl CompleteMultipartUpload {
    /// Build the manifest from the caller's view of uploaded parts.
    #[must_use]
    pub fn from_parts(parts: &[Part]) -> Self {
        let mut manifest: Vec<CompletedPart> = parts
            .iter()
            .map(|part| CompletedPart {
                part_number: part.number,
                etag: part.etag.clone(),
            })
            .collect();
        manifest.sort_by_key(|entry| entry.part_number);
        Self { parts: manifest }
    }
}

/// Response to `InitiateMultipartUpload`.
#[derive(Debug, Clone, Default)]
pub struct InitiateMultipartUploadResult {
    /// Opaque token identifying the new session.
    pub upload_id: String,
}

/// One in-progress session as reported by `ListMultipartUploads`.
#[derive(Debug, Clone, Default)]
pub struct UploadSummary {
    /// Object key the session targets.
    pub key: String,
    /// Opaque session token.
    pub upload_id: String,
    /// When the session was initiated, when the service reports it.
    pub initiated: Option<DateTime<Utc>>,
}

/// One page of `ListMultipartUploads`.
#[derive(Debug, Clone, Default)]
pub struct ListMultipartUploadsResult {
    /// Key marker addressing the next page.
    pub next_key_marker: Option<String>,
    /// Upload-id marker addressing the next page.
    pub next_upload_id_marker: Option<String>,
    /// Whether more pages follow.
    pub is_truncated: bool,
    /// Sessions on this page.
    pub uploads: Vec<UploadSummary>,
    /// Key prefixes grouped under the requested delimiter.
    pub common_prefixes: Vec<String>,
}

/// One page of `ListParts`.
#[derive(Debug, Clone, Default)]
pub struct ListPartsResult {
    /// Part-number marker addressing the next page.
    pub next_part_number_marker: Option<String>,
    /// Whether more pages follow.
    pub is_truncated: bool,
    /// Parts on this page, in whatever order the service chose.
    pub parts: Vec<Part>,
}

/// The service's error document.
#[derive(Debug, Clone, Default)]
pub struct ErrorResponse {
    /// Service error code, e.g. `NoSuchUpload`.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Request id echoed by the service.
    pub request_id: Option<String>,
}
