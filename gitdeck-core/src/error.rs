//! Error types for gitdeck

use thiserror::Error;

use crate::backend::BackendError;

/// Result type alias for gitdeck operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for gitdeck operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// User input rejected before any backend call was made
    #[error("Invalid input: {0}")]
    Validation(String),

    /// A version-control primitive failed
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Synchronous refusal returned by `Orchestrator::submit`.
///
/// A rejection means the request never became an operation: no busy flag is
/// held, no handle exists, and nothing was logged against an operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Another operation is still running against the same working copy
    #[error("an operation is already running for '{0}'")]
    RepositoryBusy(String),

    /// The target path is not a usable git working copy
    #[error("not a git repository: {0}")]
    NotARepository(String),

    /// The operation needs a remote and none is configured
    #[error("no remote configured for '{0}'")]
    NoRemoteConfigured(String),

    /// Commit requested while the working copy has no changes
    #[error("nothing to commit in '{0}'")]
    NothingToCommit(String),

    /// Request parameters failed validation
    #[error("{0}")]
    InvalidInput(String),
}
