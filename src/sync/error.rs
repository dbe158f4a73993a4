//! Errors surfaced to callers of the client core

use crate::remote::RemoteError;
use crate::workflow::WorkflowError;

/// Outcome of a failed client operation
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Input breaks one or more rules; every violation is listed
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// Illegal workflow move or the actor's role does not allow it
    #[error("Forbidden: {0}")]
    ForbiddenTransition(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Only returned by explicit connectivity checks; regular operations
    /// fall back to local data instead
    #[error("Remote service unavailable: {0}")]
    RemoteUnavailable(String),

    /// Only returned by an explicit flush; background persistence failures
    /// are logged
    #[error("Local store write failed: {0}")]
    Persistence(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<WorkflowError> for SyncError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::Validation(errors) => SyncError::Validation(errors),
            WorkflowError::ForbiddenTransition(msg) => SyncError::ForbiddenTransition(msg),
            WorkflowError::NotFound(what) => SyncError::NotFound(what),
        }
    }
}

impl From<RemoteError> for SyncError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Unavailable(reason) => SyncError::RemoteUnavailable(reason),
            RemoteError::Rejected {
                status,
                message,
                details,
            } => match status {
                400 | 422 => {
                    if details.is_empty() {
                        SyncError::Validation(vec![message])
                    } else {
                        SyncError::Validation(details)
                    }
                }
                401 => SyncError::Authentication(message),
                403 => SyncError::ForbiddenTransition(message),
                404 => SyncError::NotFound(message),
                _ => SyncError::Internal(anyhow::anyhow!(
                    "Remote service returned {}: {}",
                    status,
                    message
                )),
            },
        }
    }
}
