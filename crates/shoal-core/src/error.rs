//! Error types for the shoal client stack.
//!
//! Every operation surfaces one of the variants of [`ShoalError`]; the
//! detail carried by [`ServiceError`] (HTTP status, service error code,
//! message) is what callers branch on to tell an absent upload apart from a
//! genuine failure.

use std::fmt;

use http::StatusCode;

/// An error document returned by the storage service.
///
/// Decoded from the XML body of a non-2xx response (or, for multipart
/// completion, from a 2xx body whose root element is `Error`).
#[derive(Debug, Clone)]
pub struct ServiceError {
    /// HTTP status of the response that carried the error.
    pub status: StatusCode,
    /// Service error code, e.g. `NoSuchUpload` or `InternalError`.
    pub code: String,
    /// Human-readable message from the service.
    pub message: String,
    /// Request id echoed by the service, when present.
    pub request_id: Option<String>,
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "service error {} (status {}): {}",
            self.code, self.status, self.message
        )
    }
}

impl std::error::Error for ServiceError {}

/// A failure at the transport collaborator boundary.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The underlying connection or socket failed.
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    /// The endpoint could not be reached.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The transport gave up waiting for the response.
    #[error("request timed out")]
    Timeout,

    /// The request was cancelled by the transport. Never retried.
    #[error("request cancelled")]
    Cancelled,
}

/// Top-level error type for client operations.
#[derive(Debug, thiserror::Error)]
pub enum ShoalError {
    /// The request never produced a response.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The service answered with an error document.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// A part upload returned success but no integrity tag. Raised without
    /// retry: the response has already been received, retrying cannot
    /// change it.
    #[error("part {part_number} upload succeeded with no ETag")]
    MissingEtag {
        /// Sequence number of the offending part.
        part_number: u32,
    },

    /// The part payload could not be rewound (or re-read) before an
    /// attempt, so the same bytes cannot be replayed. Aborts the attempt
    /// immediately; retrying without a reliable replay would upload
    /// different bytes under the same part number.
    #[error("failed to replay part payload: {0}")]
    Payload(#[source] std::io::Error),

    /// A request body could not be encoded.
    #[error("failed to encode request body: {0}")]
    Encode(String),

    /// The response body could not be decoded.
    #[error("malformed service response: {0}")]
    Decode(String),
}

impl ShoalError {
    /// The service error code carried by this error, if it is one.
    #[must_use]
    pub fn service_code(&self) -> Option<&str> {
        match self {
            Self::Service(err) => Some(&err.code),
            _ => None,
        }
    }

    /// Whether this error carries the given service error code.
    #[must_use]
    pub fn is_code(&self, code: &str) -> bool {
        self.service_code() == Some(code)
    }
}

/// Convenience result type for client operations.
pub type ShoalResult<T> = Result<T, ShoalError>;
