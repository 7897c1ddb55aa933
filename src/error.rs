//! Error types for the test request workflow.

use thiserror::Error;

use crate::request::{RequestId, RequestStatus};
use crate::users::{Operation, Role};

/// Result type alias using the covtrack error type.
pub type Result<T> = std::result::Result<T, CovtrackError>;

/// Main error type for the workflow engine.
///
/// Every failure is non-retriable from the engine's point of view and carries
/// a human-readable reason that is preserved verbatim up to the boundary.
#[derive(Error, Debug)]
pub enum CovtrackError {
    /// No test request with the given id exists
    #[error("Invalid ID: no test request with id {0}")]
    NotFound(RequestId),

    /// Request is in an invalid status for the requested operation
    #[error("Invalid state transition: request {0} is in status '{1}', expected '{2}'")]
    InvalidState(RequestId, RequestStatus, RequestStatus),

    /// Payload failed field-level validation
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The acting user's role does not permit the operation
    #[error("Access denied: role '{0}' may not perform '{1}'")]
    AccessDenied(Role, Operation),

    /// The request changed underneath a transition; nothing was written
    #[error("Conflicting update: request {0} was modified concurrently")]
    Conflict(RequestId),

    /// General error from anyhow
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
