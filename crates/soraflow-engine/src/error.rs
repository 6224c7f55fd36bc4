//! Engine error taxonomy
//!
//! Every failure the engine surfaces carries the operation label and
//! resource context it happened under, so callers can render an actionable
//! message without the engine logging anything on their behalf.

use std::time::Duration;
use thiserror::Error;

/// Error returned by a single remote API call.
///
/// Carries the provider's machine-readable error code, which the retry
/// classifier consults against the policy's transient set.
#[derive(Error, Debug, Clone)]
#[error("{code}: {message}")]
pub struct ApiError {
    /// Machine-readable error code (e.g. "InternalError")
    pub code: String,

    /// Human-readable message from the provider
    pub message: String,

    /// HTTP status of the response, if the error came from one
    pub status: Option<u16>,

    /// Provider-assigned request id, when the response carried one
    pub request_id: Option<String>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            status: None,
            request_id: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Whether this is the provider's distinguished "not found" condition.
    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }
}

/// Engine errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Resource absent. Read treats this as clear state, delete as success;
    /// every other operation surfaces it.
    #[error("{op}: resource not found")]
    NotFound {
        op: String,
        #[source]
        source: ApiError,
    },

    /// Transient errors kept coming until the retry deadline elapsed.
    #[error("{op}: retry deadline of {deadline:?} elapsed after {attempts} attempts: {source}")]
    DeadlineElapsed {
        op: String,
        deadline: Duration,
        attempts: u32,
        #[source]
        source: ApiError,
    },

    /// Permanent remote error, surfaced without retrying.
    #[error("{op}: {source}")]
    Remote {
        op: String,
        #[source]
        source: ApiError,
    },

    /// The status probe observed a status in the declared failure set.
    #[error("{op}: provider reported failure status {status:?}")]
    ConvergenceFailed { op: String, status: String },

    /// The wait deadline elapsed while the status was in neither the target
    /// nor the failure set. Distinct from [`EngineError::ConvergenceFailed`]:
    /// "we gave up waiting" is not "the provider reported failure".
    #[error("{op}: gave up waiting after {waited:?} (last status: {last_status:?})")]
    ConvergenceTimedOut {
        op: String,
        waited: Duration,
        last_status: Option<String>,
    },

    /// A list endpoint repeated a cursor without ending the listing. A
    /// contract breach by the remote API; always fatal, never retried.
    #[error("{op}: pagination marker {marker:?} did not advance")]
    CursorStalled { op: String, marker: String },

    /// A derived rule identity could not be decoded.
    #[error("invalid rule identity: {reason}")]
    InvalidIdentity { reason: String },
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_detection() {
        let err = ApiError::new("NoSuchResource", "server i-123 does not exist").with_status(404);
        assert!(err.is_not_found());

        let err = ApiError::new("InternalError", "try again").with_status(500);
        assert!(!err.is_not_found());

        // Codes alone do not mark absence; the provider signals it via 404
        let err = ApiError::new("NoSuchResource", "no status attached");
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_error_context_in_message() {
        let err = EngineError::ConvergenceFailed {
            op: "create server i-123".to_string(),
            status: "CreateFailed".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("create server i-123"));
        assert!(message.contains("CreateFailed"));
    }
}
