//! Error types for submission and tracking

use nbrun_client::ClientError;
use nbrun_core::domain::naming::NamingError;
use thiserror::Error;

/// Result type alias for tracker operations
pub type Result<T> = std::result::Result<T, RunError>;

/// Errors surfaced by the submitter, poller and tracker
///
/// Throttling never shows up here: it is retried until the call succeeds or
/// fails for another reason.
#[derive(Debug, Error)]
pub enum RunError {
    /// The service rejected the job; the run never started
    #[error("Failed to submit notebook '{notebook}': {source}")]
    Submission {
        notebook: String,
        #[source]
        source: ClientError,
    },

    /// A describe, list or stop call failed
    #[error("Remote query failed ({query}): {source}")]
    RemoteQuery {
        query: String,
        #[source]
        source: ClientError,
    },

    /// The job name could not be derived
    #[error("Invalid job name: {0}")]
    Naming(#[from] NamingError),

    /// The submission is missing information needed before any remote call
    #[error("Invalid submission: {0}")]
    InvalidRequest(String),

    /// The tracker's refresh task is no longer running
    #[error("Tracker task has stopped")]
    TrackerStopped,
}

impl RunError {
    pub(crate) fn remote(query: impl Into<String>, source: ClientError) -> Self {
        Self::RemoteQuery {
            query: query.into(),
            source,
        }
    }
}
