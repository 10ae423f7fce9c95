use crate::command_executor::ExecError;
use thiserror::Error;

/// Failure taxonomy of orchestrator operations.
///
/// Connectivity classifications (`network_error`, `ntp_unreachable`,
/// `ntp_sync_failed`) are not errors; they are returned as data by the
/// connectivity diagnostic.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// The request itself is malformed. No command has been issued.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The host is not in a state the operation can start from. Never retried.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// A mandatory mutation command failed. Not retried, the caller has to resubmit.
    #[error("failed to {action}: {source}")]
    Apply {
        action: String,
        #[source]
        source: ExecError,
    },

    /// Mutations succeeded but the resulting state never settled.
    #[error("failed to verify {target} after {attempts} attempts: {reason}")]
    PostValidation {
        target: String,
        attempts: u32,
        reason: String,
    },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl NetworkError {
    pub fn apply(action: impl Into<String>, source: ExecError) -> Self {
        NetworkError::Apply {
            action: action.into(),
            source,
        }
    }
}

pub type NetworkResult<T> = Result<T, NetworkError>;
