//! The error-classification collaborator.
//!
//! Given a failed attempt, the classifier decides whether the attempt loop
//! may spend budget on a retry, and recognizes the "no such upload"
//! condition that discovery treats as an empty result rather than a
//! failure.

use std::fmt;

use crate::error::{ShoalError, TransportError};

/// Classifies errors for the retry loops and for absence detection.
pub trait ErrorClassifier: Send + Sync + fmt::Debug {
    /// Whether a fresh attempt could plausibly succeed where this one
    /// failed.
    fn is_retryable(&self, error: &ShoalError) -> bool;

    /// Whether this error reports that the referenced multipart upload does
    /// not exist.
    fn is_no_such_upload(&self, error: &ShoalError) -> bool;
}

/// Service error codes that indicate a transient condition.
///
/// `NoSuchUpload` is listed because a session that was just initiated can
/// be reported absent while the service catches up; callers that want
/// absence treated as an empty result special-case it via
/// [`ErrorClassifier::is_no_such_upload`] before the retry loop sees it.
const RETRYABLE_CODES: &[&str] = &[
    "InternalError",
    "SlowDown",
    "ServiceUnavailable",
    "RequestTimeout",
    "NoSuchUpload",
];

/// The production classifier.
///
/// Transport I/O, connect failures, and timeouts are retryable within the
/// attempt budget; a cancelled request is surfaced immediately. Service
/// errors retry on 5xx statuses, throttling, and the transient codes S3 is
/// known to emit. Local integrity and rewind failures never retry.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultClassifier;

impl ErrorClassifier for DefaultClassifier {
    fn is_retryable(&self, error: &ShoalError) -> bool {
        match error {
            ShoalError::Transport(err) => !matches!(err, TransportError::Cancelled),
            ShoalError::Service(err) => {
                err.status.is_server_error()
                    || err.status == http::StatusCode::TOO_MANY_REQUESTS
                    || RETRYABLE_CODES.contains(&err.code.as_str())
            }
            ShoalError::MissingEtag { .. }
            | ShoalError::Payload(_)
            | ShoalError::Encode(_)
            | ShoalError::Decode(_) => false,
        }
    }

    fn is_no_such_upload(&self, error: &ShoalError) -> bool {
        error.is_code("NoSuchUpload")
    }
}
