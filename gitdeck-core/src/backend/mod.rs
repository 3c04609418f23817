//! Version control backend abstraction
//!
//! The orchestrator only ever talks to a [`VcsBackend`]. Every method is a
//! blocking primitive that runs to completion or failure; execution units
//! call them from `spawn_blocking` workers so the coordinating context is
//! never blocked.

mod git;

#[cfg(test)]
pub(crate) mod fake;

pub use git::GitBackend;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured failure kind for a backend primitive.
///
/// Callers branch on the kind, never on the message text. The only place
/// allowed to inspect raw git output is the backend implementation itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// The requested branch does not exist upstream
    BranchNotFound,
    /// Non-force delete of a branch with unmerged commits
    UnmergedBranch,
    /// Commit attempted while conflict entries remain in the index
    UnresolvedConflicts,
    /// A merge stopped on conflicts; the merge state is left in place
    MergeConflicts,
    /// The operation needs a remote and none is configured
    NoRemote,
    /// The path is not a git repository
    NotARepository,
    /// Anything else; the message carries the backend's own wording
    Other,
}

/// Failure raised by a backend primitive
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct BackendError {
    /// Structured kind for fallback/recovery decisions
    pub kind: BackendErrorKind,
    /// Human-readable message, surfaced verbatim in log events
    pub message: String,
}

impl BackendError {
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Other, message)
    }
}

impl From<git2::Error> for BackendError {
    fn from(e: git2::Error) -> Self {
        BackendError::other(format!("Git error: {}", e.message()))
    }
}

/// Which side of a three-way conflict to keep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveSide {
    /// Keep the current branch's version
    Ours,
    /// Keep the incoming branch's version
    Theirs,
}

impl std::fmt::Display for ResolveSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolveSide::Ours => write!(f, "ours"),
            ResolveSide::Theirs => write!(f, "theirs"),
        }
    }
}

/// How a merge completed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Nothing to do, the branch is already merged
    UpToDate,
    /// HEAD moved forward without a merge commit
    FastForward,
    /// A merge commit was created
    Merged,
}

/// State of one path reported by `status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileState {
    Added,
    Modified,
    Deleted,
    Renamed,
    Untracked,
    Conflicted,
}

impl std::fmt::Display for FileState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FileState::Added => "added",
            FileState::Modified => "modified",
            FileState::Deleted => "deleted",
            FileState::Renamed => "renamed",
            FileState::Untracked => "untracked",
            FileState::Conflicted => "conflicted",
        };
        write!(f, "{}", s)
    }
}

/// One entry of the working copy status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    pub path: PathBuf,
    pub state: FileState,
}

/// Information about a git remote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteInfo {
    /// Name of the remote (e.g., "origin")
    pub name: String,
    /// URL of the remote
    pub url: String,
}

/// One commit returned by `log`
#[derive(Debug, Clone)]
pub struct CommitInfo {
    /// Full commit id
    pub id: String,
    pub author: String,
    pub email: String,
    pub time: DateTime<Utc>,
    /// First line of the commit message
    pub summary: String,
}

/// Filters for reading history
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    /// Keep commits whose author name contains this string
    pub author: Option<String>,
    /// Keep commits whose message contains this string
    pub message: Option<String>,
    /// Stop after this many matching commits (0 = unlimited)
    pub limit: usize,
}

/// Blocking version-control primitives.
///
/// Each method takes the working copy path so the backend stays stateless;
/// implementations open the repository per call. Methods must be safe to
/// call from any thread.
pub trait VcsBackend: Send + Sync {
    /// Clone `url` into `path`, optionally checking out a specific branch.
    ///
    /// A missing upstream branch fails with [`BackendErrorKind::BranchNotFound`];
    /// the partially created directory is the caller's to clean up.
    fn clone_repo(&self, url: &str, path: &Path, branch: Option<&str>)
        -> Result<(), BackendError>;

    /// Cheap local probe used by Submit preconditions
    fn is_repository(&self, path: &Path) -> bool;

    fn current_branch(&self, path: &Path) -> Result<String, BackendError>;

    /// Whether tracked files carry uncommitted changes (untracked files do
    /// not count)
    fn is_dirty(&self, path: &Path) -> Result<bool, BackendError>;

    fn stash_save(&self, path: &Path, message: &str) -> Result<(), BackendError>;

    fn fetch(&self, path: &Path, remote: &str) -> Result<(), BackendError>;

    fn list_branches(&self, path: &Path) -> Result<Vec<String>, BackendError>;

    fn create_branch(&self, path: &Path, name: &str) -> Result<(), BackendError>;

    fn checkout(&self, path: &Path, name: &str) -> Result<(), BackendError>;

    /// Delete a local branch. Non-force deletion of a branch with unmerged
    /// commits fails with [`BackendErrorKind::UnmergedBranch`].
    fn delete_branch(&self, path: &Path, name: &str, force: bool) -> Result<(), BackendError>;

    fn stage(&self, path: &Path, file: &Path) -> Result<(), BackendError>;

    /// Create a commit from the index. Fails with
    /// [`BackendErrorKind::UnresolvedConflicts`] while conflict entries
    /// remain.
    fn commit(&self, path: &Path, message: &str) -> Result<(), BackendError>;

    /// Merge `branch` into the current branch. A conflicted merge leaves the
    /// merge state in place and fails with
    /// [`BackendErrorKind::MergeConflicts`].
    fn merge(&self, path: &Path, branch: &str) -> Result<MergeOutcome, BackendError>;

    fn push(&self, path: &Path, remote: &str, refspec: &str) -> Result<(), BackendError>;

    fn delete_remote_branch(&self, path: &Path, remote: &str, name: &str)
        -> Result<(), BackendError>;

    fn tag(
        &self,
        path: &Path,
        name: &str,
        message: Option<&str>,
        target: Option<&str>,
    ) -> Result<(), BackendError>;

    /// Deduplicated list of paths left unmerged by a failed merge
    fn list_unmerged(&self, path: &Path) -> Result<Vec<PathBuf>, BackendError>;

    /// Materialize one side of a conflict in the worktree and stage it
    fn resolve_with(&self, path: &Path, file: &Path, side: ResolveSide)
        -> Result<(), BackendError>;

    /// Abort the in-progress merge and restore the pre-merge working copy
    fn abort_merge(&self, path: &Path) -> Result<(), BackendError>;

    fn status(&self, path: &Path) -> Result<Vec<StatusEntry>, BackendError>;

    fn log(&self, path: &Path, filter: &LogFilter) -> Result<Vec<CommitInfo>, BackendError>;

    fn list_remotes(&self, path: &Path) -> Result<Vec<RemoteInfo>, BackendError>;
}

/// Pick the remote operations should talk to: the preferred name when
/// present, otherwise the first configured remote.
pub fn default_remote<'a>(remotes: &'a [RemoteInfo], preferred: &str) -> Option<&'a RemoteInfo> {
    remotes
        .iter()
        .find(|r| r.name == preferred)
        .or_else(|| remotes.first())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_remote_prefers_origin() {
        let remotes = vec![
            RemoteInfo {
                name: "upstream".to_string(),
                url: "https://example.com/upstream.git".to_string(),
            },
            RemoteInfo {
                name: "origin".to_string(),
                url: "https://example.com/origin.git".to_string(),
            },
        ];
        assert_eq!(
            default_remote(&remotes, "origin").map(|r| r.name.as_str()),
            Some("origin")
        );
        assert_eq!(
            default_remote(&remotes, "upstream").map(|r| r.name.as_str()),
            Some("upstream")
        );
    }

    #[test]
    fn test_default_remote_falls_back_to_first() {
        let remotes = vec![RemoteInfo {
            name: "upstream".to_string(),
            url: "https://example.com/upstream.git".to_string(),
        }];
        assert_eq!(
            default_remote(&remotes, "origin").map(|r| r.name.as_str()),
            Some("upstream")
        );
        assert!(default_remote(&[], "origin").is_none());
    }

    #[test]
    fn test_backend_error_display() {
        let err = BackendError::new(BackendErrorKind::BranchNotFound, "branch 'x' not found");
        assert_eq!(err.to_string(), "branch 'x' not found");
        assert_eq!(err.kind, BackendErrorKind::BranchNotFound);
    }
}
