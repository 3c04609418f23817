//! Operation requests
//!
//! One request describes one user-initiated action against one working
//! copy. Each action variant carries exactly its own parameters; the
//! orchestrator maps the variant to a fixed sequence of backend calls.

use std::path::PathBuf;

use crate::registry::RepositoryHandle;

/// The kind of an operation, independent of its parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Clone,
    Commit,
    CreateBranch,
    SwitchBranch,
    DeleteBranch,
    Merge,
    Pull,
    Push,
    Tag,
    ResolveConflicts,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OperationKind::Clone => "clone",
            OperationKind::Commit => "commit",
            OperationKind::CreateBranch => "create-branch",
            OperationKind::SwitchBranch => "switch-branch",
            OperationKind::DeleteBranch => "delete-branch",
            OperationKind::Merge => "merge",
            OperationKind::Pull => "pull",
            OperationKind::Push => "push",
            OperationKind::Tag => "tag",
            OperationKind::ResolveConflicts => "resolve-conflicts",
        };
        write!(f, "{}", s)
    }
}

/// What to do, with kind-specific parameters
#[derive(Debug, Clone)]
pub enum OperationAction {
    /// Clone the repository's remote into `target_dir`, preferring `branch`
    Clone { target_dir: PathBuf, branch: String },
    /// Stage the selected files, then commit them
    Commit { files: Vec<PathBuf>, message: String },
    /// Create a branch off the current HEAD, optionally switching to it
    CreateBranch { name: String, switch: bool },
    /// Check out another branch; `stash` sets aside uncommitted changes
    /// first instead of failing
    SwitchBranch { name: String, stash: bool },
    /// Delete a local branch, optionally its remote counterpart too
    DeleteBranch {
        name: String,
        force: bool,
        remote: bool,
    },
    /// Merge a branch into the current one
    Merge { branch: String },
    /// Fetch from the default remote, then merge the upstream of the
    /// current branch
    Pull,
    /// Push the current branch to the default remote
    Push,
    /// Create a tag (annotated when `message` is set) on `target` or HEAD,
    /// optionally push it
    Tag {
        name: String,
        message: Option<String>,
        target: Option<String>,
        push: bool,
    },
}

impl OperationAction {
    pub fn kind(&self) -> OperationKind {
        match self {
            OperationAction::Clone { .. } => OperationKind::Clone,
            OperationAction::Commit { .. } => OperationKind::Commit,
            OperationAction::CreateBranch { .. } => OperationKind::CreateBranch,
            OperationAction::SwitchBranch { .. } => OperationKind::SwitchBranch,
            OperationAction::DeleteBranch { .. } => OperationKind::DeleteBranch,
            OperationAction::Merge { .. } => OperationKind::Merge,
            OperationAction::Pull => OperationKind::Pull,
            OperationAction::Push => OperationKind::Push,
            OperationAction::Tag { .. } => OperationKind::Tag,
        }
    }

    /// Check user-supplied input before any backend call is made.
    ///
    /// The presentation layer calls this while a form is still open; the
    /// orchestrator re-checks at Submit so an invalid request can never
    /// become an operation.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            OperationAction::Clone { target_dir, .. } => {
                if target_dir.as_os_str().is_empty() {
                    return Err("clone target directory must not be empty".to_string());
                }
            }
            OperationAction::Commit { files, message } => {
                if files.is_empty() {
                    return Err("select at least one file to commit".to_string());
                }
                if message.trim().is_empty() {
                    return Err("commit message must not be empty".to_string());
                }
            }
            OperationAction::CreateBranch { name, .. }
            | OperationAction::SwitchBranch { name, .. }
            | OperationAction::DeleteBranch { name, .. } => {
                if name.trim().is_empty() {
                    return Err("branch name must not be empty".to_string());
                }
            }
            OperationAction::Merge { branch } => {
                if branch.trim().is_empty() {
                    return Err("branch name must not be empty".to_string());
                }
            }
            OperationAction::Tag { name, .. } => {
                if name.trim().is_empty() {
                    return Err("tag name must not be empty".to_string());
                }
            }
            OperationAction::Pull | OperationAction::Push => {}
        }
        Ok(())
    }
}

/// One user-initiated action, consumed exactly once by the orchestrator
#[derive(Debug, Clone)]
pub struct OperationRequest {
    /// The working copy the action targets. For Clone this carries the
    /// name and remote URL to clone from; the target directory lives in
    /// the action.
    pub repository: RepositoryHandle,
    pub action: OperationAction,
}

impl OperationRequest {
    pub fn new(repository: RepositoryHandle, action: OperationAction) -> Self {
        Self { repository, action }
    }

    pub fn kind(&self) -> OperationKind {
        self.action.kind()
    }
}
