//! Merge conflict resolution workflow
//!
//! A [`ConflictSession`] is obtained from
//! [`Orchestrator::begin_conflict_resolution`](crate::orchestrator::Orchestrator::begin_conflict_resolution)
//! and holds the repository's busy flag for its whole life. Files can be
//! resolved any number of times before finalization; the last applied
//! strategy wins. Finalizing delegates the zero-conflicts check to the
//! backend's commit primitive, whose failure re-enters the presenting
//! state instead of ending the workflow.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::backend::{BackendError, BackendErrorKind, ResolveSide, VcsBackend};
use crate::orchestrator::{BusyGuard, OperationHandle, OperationState, Reporter};

/// Strategy applied to one conflicted file so far
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Unresolved,
    Ours,
    Theirs,
}

impl From<ResolveSide> for Resolution {
    fn from(side: ResolveSide) -> Self {
        match side {
            ResolveSide::Ours => Resolution::Ours,
            ResolveSide::Theirs => Resolution::Theirs,
        }
    }
}

/// One file reported unmerged when the workflow began
#[derive(Debug, Clone)]
pub struct ConflictEntry {
    pub path: PathBuf,
    pub resolution: Resolution,
}

/// Workflow state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictSessionState {
    /// Conflicted files are listed and can be resolved
    Presenting,
    /// The merge was committed; terminal
    Merged,
    /// The merge was aborted; terminal
    Aborted,
}

/// How beginning conflict resolution turned out
pub enum ConflictBegin {
    /// No unmerged files: informational success, no session entered
    Clean(Arc<OperationHandle>),
    /// Listing the conflicts failed; the operation is already terminal
    Failed(Arc<OperationHandle>),
    /// Conflicts found; drive the session to a terminal state
    Session(ConflictSession),
}

/// An in-progress conflict resolution over one working copy
pub struct ConflictSession {
    backend: Arc<dyn VcsBackend>,
    repo_path: PathBuf,
    entries: Vec<ConflictEntry>,
    state: ConflictSessionState,
    reporter: Reporter,
    _busy: BusyGuard,
}

impl ConflictSession {
    pub(crate) fn new(
        backend: Arc<dyn VcsBackend>,
        repo_path: PathBuf,
        unmerged: Vec<PathBuf>,
        reporter: Reporter,
        busy: BusyGuard,
    ) -> Self {
        let entries = unmerged
            .into_iter()
            .map(|path| ConflictEntry {
                path,
                resolution: Resolution::Unresolved,
            })
            .collect();
        Self {
            backend,
            repo_path,
            entries,
            state: ConflictSessionState::Presenting,
            reporter,
            _busy: busy,
        }
    }

    pub fn state(&self) -> ConflictSessionState {
        self.state
    }

    pub fn entries(&self) -> &[ConflictEntry] {
        &self.entries
    }

    /// The tracked operation this session reports through
    pub fn handle(&self) -> &Arc<OperationHandle> {
        self.reporter.handle()
    }

    fn ensure_presenting(&self) -> Result<(), BackendError> {
        if self.state != ConflictSessionState::Presenting {
            return Err(BackendError::other(
                "The conflict resolution workflow already finished",
            ));
        }
        Ok(())
    }

    /// Keep one side of a conflicted file. May be called again for the same
    /// file; the last applied strategy wins at finalization.
    pub async fn resolve(&mut self, file: &Path, side: ResolveSide) -> Result<(), BackendError> {
        self.ensure_presenting()?;

        let index = self
            .entries
            .iter()
            .position(|e| e.path == file)
            .ok_or_else(|| {
                BackendError::other(format!("'{}' is not a conflicted file", file.display()))
            })?;

        let backend = Arc::clone(&self.backend);
        let repo_path = self.repo_path.clone();
        let target = file.to_path_buf();
        let result =
            tokio::task::spawn_blocking(move || backend.resolve_with(&repo_path, &target, side))
                .await
                .unwrap_or_else(|e| Err(BackendError::other(format!("Operation crashed: {}", e))));

        match result {
            Ok(()) => {
                self.entries[index].resolution = side.into();
                self.reporter.info(format!(
                    "Resolved '{}' keeping the {} version",
                    file.display(),
                    side
                ));
                Ok(())
            }
            Err(err) => {
                self.reporter.error(err.to_string());
                Err(err)
            }
        }
    }

    /// Commit the merge. Returns `Ok(true)` when the merge was finalized;
    /// `Ok(false)` when the backend still sees unresolved conflicts, in
    /// which case the session stays open for further resolving.
    pub async fn finalize(&mut self, message: &str) -> Result<bool, BackendError> {
        self.ensure_presenting()?;

        self.reporter.info("Finalizing merge...");
        let backend = Arc::clone(&self.backend);
        let repo_path = self.repo_path.clone();
        let commit_message = message.to_string();
        let result =
            tokio::task::spawn_blocking(move || backend.commit(&repo_path, &commit_message))
                .await
                .unwrap_or_else(|e| Err(BackendError::other(format!("Operation crashed: {}", e))));

        match result {
            Ok(()) => {
                self.state = ConflictSessionState::Merged;
                self.reporter.success("Merge finalized successfully");
                self.reporter.finish(OperationState::Succeeded);
                Ok(true)
            }
            Err(err) if err.kind == BackendErrorKind::UnresolvedConflicts => {
                self.reporter.warning(format!(
                    "Cannot finalize yet: {}",
                    err.message
                ));
                Ok(false)
            }
            Err(err) => {
                self.reporter.error(err.to_string());
                Err(err)
            }
        }
    }

    /// Abort the merge, discarding every resolution and restoring the
    /// working copy to its pre-merge state.
    pub async fn abort(&mut self) -> Result<(), BackendError> {
        self.ensure_presenting()?;

        let backend = Arc::clone(&self.backend);
        let repo_path = self.repo_path.clone();
        let result = tokio::task::spawn_blocking(move || backend.abort_merge(&repo_path))
            .await
            .unwrap_or_else(|e| Err(BackendError::other(format!("Operation crashed: {}", e))));

        match result {
            Ok(()) => {
                self.state = ConflictSessionState::Aborted;
                self.reporter
                    .info("Merge aborted; working copy restored to its pre-merge state");
                self.reporter.finish(OperationState::Aborted);
                Ok(())
            }
            Err(err) => {
                self.reporter.error(err.to_string());
                Err(err)
            }
        }
    }
}

impl Drop for ConflictSession {
    fn drop(&mut self) {
        // Closing the session without finalizing or aborting leaves the
        // merge in progress; only the operation tracking ends here.
        if self.state == ConflictSessionState::Presenting {
            self.reporter
                .info("Conflict resolution closed; the merge is still in progress");
            self.reporter.finish(OperationState::Aborted);
        }
    }
}
