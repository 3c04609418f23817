//! Operation orchestrator
//!
//! Owns one busy flag per working copy, launches each accepted request on
//! its own blocking execution unit, and serializes every operation's
//! notifications onto a single channel. At most one non-terminal operation
//! exists per repository at any time; that invariant is the point of this
//! module.

mod execute;
mod handle;

pub use handle::{
    LogEvent, Notification, NotificationPayload, OperationHandle, OperationId, OperationOutcome,
    OperationState, Severity,
};
pub(crate) use handle::Reporter;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::backend::{BackendError, VcsBackend};
use crate::conflicts::{ConflictBegin, ConflictSession};
use crate::error::Rejection;
use crate::ops::{OperationAction, OperationKind, OperationRequest};
use crate::registry::RepositoryHandle;

/// Key busy flags by canonical path so two spellings of the same working
/// copy cannot slip past each other. A path that does not exist yet (a
/// clone target) is keyed through its canonicalized parent.
fn canonical_key(path: &Path) -> PathBuf {
    if let Ok(canonical) = std::fs::canonicalize(path) {
        return canonical;
    }
    if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
        if let Ok(parent) = std::fs::canonicalize(parent) {
            return parent.join(name);
        }
    }
    path.to_path_buf()
}

/// Holds one repository's busy flag; clears it exactly once on drop, which
/// also covers panicking execution units.
#[derive(Debug)]
pub(crate) struct BusyGuard {
    key: PathBuf,
    set: Arc<Mutex<HashSet<PathBuf>>>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        let mut set = self.set.lock().unwrap_or_else(|e| e.into_inner());
        set.remove(&self.key);
    }
}

/// Accepts operation requests and runs them without blocking the caller
pub struct Orchestrator {
    backend: Arc<dyn VcsBackend>,
    busy: Arc<Mutex<HashSet<PathBuf>>>,
    preferred_remote: String,
    tx: UnboundedSender<Notification>,
}

impl Orchestrator {
    /// Create an orchestrator over a backend. The returned receiver is the
    /// single consumer of every operation's notifications.
    pub fn new(backend: Arc<dyn VcsBackend>) -> (Self, UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                backend,
                busy: Arc::new(Mutex::new(HashSet::new())),
                preferred_remote: "origin".to_string(),
                tx,
            },
            rx,
        )
    }

    /// Prefer this remote for push/pull/remote-delete when it exists
    pub fn with_preferred_remote(mut self, name: impl Into<String>) -> Self {
        self.preferred_remote = name.into();
        self
    }

    pub fn backend(&self) -> &Arc<dyn VcsBackend> {
        &self.backend
    }

    /// Whether an operation currently holds the working copy at `path`
    pub fn is_busy(&self, path: &Path) -> bool {
        self.lock_busy().contains(&canonical_key(path))
    }

    fn lock_busy(&self) -> MutexGuard<'_, HashSet<PathBuf>> {
        self.busy.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn try_reserve(&self, path: &Path, repository_name: &str) -> Result<BusyGuard, Rejection> {
        let key = canonical_key(path);
        let mut set = self.lock_busy();
        if !set.insert(key.clone()) {
            return Err(Rejection::RepositoryBusy(repository_name.to_string()));
        }
        Ok(BusyGuard {
            key,
            set: Arc::clone(&self.busy),
        })
    }

    /// Local, synchronous checks that never touch the network
    fn check_preconditions(&self, request: &OperationRequest) -> Result<(), Rejection> {
        let repository = &request.repository;
        let path = repository.local_path.as_path();

        if let OperationAction::Clone { .. } = request.action {
            if repository.remote_url.trim().is_empty() {
                return Err(Rejection::NoRemoteConfigured(repository.name.clone()));
            }
            return Ok(());
        }

        if !self.backend.is_repository(path) {
            return Err(Rejection::NotARepository(path.display().to_string()));
        }

        match &request.action {
            OperationAction::Push => {
                let remotes = self
                    .backend
                    .list_remotes(path)
                    .map_err(|e| Rejection::InvalidInput(e.to_string()))?;
                if remotes.is_empty() {
                    return Err(Rejection::NoRemoteConfigured(repository.name.clone()));
                }
            }
            OperationAction::Commit { .. } => {
                let status = self
                    .backend
                    .status(path)
                    .map_err(|e| Rejection::InvalidInput(e.to_string()))?;
                if status.is_empty() {
                    return Err(Rejection::NothingToCommit(repository.name.clone()));
                }
            }
            _ => {}
        }

        Ok(())
    }

    /// Accept or reject a request.
    ///
    /// On acceptance the busy flag is set, a handle is returned immediately,
    /// and the operation runs on its own execution unit; the caller must not
    /// assume completion. An equivalent request submitted while this one is
    /// non-terminal is rejected; once terminal, a fresh equivalent request
    /// is accepted as a new operation.
    pub fn submit(&self, request: OperationRequest) -> Result<Arc<OperationHandle>, Rejection> {
        request.action.validate().map_err(Rejection::InvalidInput)?;

        let busy_key = match &request.action {
            OperationAction::Clone { target_dir, .. } => target_dir.clone(),
            _ => request.repository.local_path.clone(),
        };
        let guard = self.try_reserve(&busy_key, &request.repository.name)?;

        // A failed precondition drops the guard, clearing the flag
        self.check_preconditions(&request)?;

        let handle = OperationHandle::new(&request.repository.name, request.kind());
        let reporter = Reporter::new(Arc::clone(&handle), self.tx.clone());
        let backend = Arc::clone(&self.backend);
        let preferred_remote = self.preferred_remote.clone();

        tokio::spawn(async move {
            let _busy = guard;
            reporter.mark_running();

            let worker = reporter.clone();
            let result = tokio::task::spawn_blocking(move || {
                execute::run(backend.as_ref(), &request, &worker, &preferred_remote)
            })
            .await;

            match result {
                Ok(Ok(())) => reporter.finish(OperationState::Succeeded),
                Ok(Err(err)) => {
                    reporter.error(err.to_string());
                    reporter.finish(OperationState::Failed);
                }
                Err(join_error) => {
                    reporter.error(format!("Operation crashed: {}", join_error));
                    reporter.finish(OperationState::Failed);
                }
            }
        });

        Ok(handle)
    }

    /// Start the conflict resolution workflow for a repository.
    ///
    /// Listing the unmerged files is a synchronous precondition check: with
    /// nothing to resolve, no session is entered and the operation ends as
    /// an informational success. Otherwise the returned session holds the
    /// repository's busy flag until it reaches a terminal state or is
    /// dropped.
    pub fn begin_conflict_resolution(
        &self,
        repository: &RepositoryHandle,
    ) -> Result<ConflictBegin, Rejection> {
        let path = repository.local_path.as_path();
        let guard = self.try_reserve(path, &repository.name)?;

        if !self.backend.is_repository(path) {
            return Err(Rejection::NotARepository(path.display().to_string()));
        }

        let handle = OperationHandle::new(&repository.name, OperationKind::ResolveConflicts);
        let reporter = Reporter::new(Arc::clone(&handle), self.tx.clone());
        reporter.mark_running();

        match self.backend.list_unmerged(path) {
            Ok(unmerged) if unmerged.is_empty() => {
                reporter.info("No conflicts detected");
                reporter.finish(OperationState::Succeeded);
                Ok(ConflictBegin::Clean(handle))
            }
            Ok(unmerged) => {
                reporter.info(format!("{} conflicted file(s) found", unmerged.len()));
                Ok(ConflictBegin::Session(ConflictSession::new(
                    Arc::clone(&self.backend),
                    path.to_path_buf(),
                    unmerged,
                    reporter,
                    guard,
                )))
            }
            Err(err) => {
                reporter.error(err.to_string());
                reporter.finish(OperationState::Failed);
                Ok(ConflictBegin::Failed(handle))
            }
        }
    }

    /// Branches offered for deletion: every local branch except the current
    /// one, which must never be deletable.
    pub fn deletable_branches(
        &self,
        repository: &RepositoryHandle,
    ) -> Result<Vec<String>, BackendError> {
        let path = repository.local_path.as_path();
        let current = self.backend.current_branch(path)?;
        Ok(self
            .backend
            .list_branches(path)?
            .into_iter()
            .filter(|branch| *branch != current)
            .collect())
    }
}
