//! gitdeck core - repository operation orchestration
//!
//! This crate owns the operation orchestrator (per-repository mutual
//! exclusion, one execution unit per in-flight operation, a single ordered
//! notification channel), the clone-with-branch-fallback and
//! merge-conflict-resolution state machines, the version control backend
//! they drive, and the durable repository registry.

pub mod backend;
mod clone_flow;
pub mod config;
pub mod conflicts;
pub mod error;
pub mod ops;
pub mod orchestrator;
pub mod registry;

pub use backend::{
    BackendError, BackendErrorKind, CommitInfo, FileState, GitBackend, LogFilter, MergeOutcome,
    RemoteInfo, ResolveSide, StatusEntry, VcsBackend,
};
pub use config::Config;
pub use conflicts::{ConflictBegin, ConflictEntry, ConflictSession, ConflictSessionState, Resolution};
pub use error::{Error, Rejection, Result};
pub use ops::{OperationAction, OperationKind, OperationRequest};
pub use orchestrator::{
    LogEvent, Notification, NotificationPayload, OperationHandle, OperationId, OperationOutcome,
    OperationState, Orchestrator, Severity,
};
pub use registry::{Registry, RepositoryHandle};
