//! Clone with branch fallback
//!
//! Cloning tries the requested branch first. If that exact branch does not
//! exist upstream, the partially created directory is removed and the clone
//! is retried without naming a branch, recording whatever branch the remote
//! checks out by default. Every other failure is surfaced verbatim, after
//! cleaning up the partial directory.

use std::path::Path;

use crate::backend::{BackendError, BackendErrorKind, VcsBackend};
use crate::orchestrator::Reporter;
use crate::registry::RepositoryHandle;

pub(crate) fn run(
    backend: &dyn VcsBackend,
    repository: &RepositoryHandle,
    target_dir: &Path,
    branch: &str,
    reporter: &Reporter,
) -> Result<RepositoryHandle, BackendError> {
    let url = repository.remote_url.as_str();

    if let Some(parent) = target_dir.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| BackendError::other(format!("Failed to create target directory: {}", e)))?;
    }

    reporter.info(format!("Cloning {} into {}...", url, target_dir.display()));
    reporter.info(format!("Trying branch '{}'...", branch));

    let branch_used = match backend.clone_repo(url, target_dir, Some(branch)) {
        Ok(()) => branch.to_string(),
        Err(err) if err.kind == BackendErrorKind::BranchNotFound => {
            reporter.warning(format!(
                "Branch '{}' not found upstream; retrying without an explicit branch",
                branch
            ));
            remove_partial_clone(target_dir);

            if let Err(err) = backend.clone_repo(url, target_dir, None) {
                remove_partial_clone(target_dir);
                return Err(err);
            }

            let actual = backend.current_branch(target_dir)?;
            reporter.info(format!("Checked out default branch '{}'", actual));
            actual
        }
        Err(err) => {
            remove_partial_clone(target_dir);
            return Err(err);
        }
    };

    reporter.progress(80);

    let mut handle = RepositoryHandle::new(
        repository.name.clone(),
        target_dir.to_path_buf(),
        url.to_string(),
        branch_used,
    );
    handle.exclusion_patterns = read_exclusion_patterns(target_dir);

    reporter.progress(100);
    reporter.success("Clone completed successfully");
    Ok(handle)
}

/// Remove whatever the failed attempt left behind. The backend must never
/// be asked to clone into a non-empty, partially initialized directory.
fn remove_partial_clone(target_dir: &Path) {
    if target_dir.exists() {
        if let Err(e) = std::fs::remove_dir_all(target_dir) {
            tracing::warn!("Failed to remove partial clone at {:?}: {}", target_dir, e);
        }
    }
}

/// Harvest the repository's ignore file into exclusion patterns. A missing
/// or unreadable file simply yields none.
fn read_exclusion_patterns(target_dir: &Path) -> Vec<String> {
    let Ok(contents) = std::fs::read_to_string(target_dir.join(".gitignore")) else {
        return Vec::new();
    };
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use crate::backend::fake::FakeBackend;
    use crate::backend::BackendErrorKind;
    use crate::ops::OperationKind;
    use crate::orchestrator::{OperationHandle, Reporter, Severity};

    fn reporter_for_test() -> Reporter {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let handle = OperationHandle::new("demo", OperationKind::Clone);
        Reporter::new(handle, tx)
    }

    fn request_repo() -> RepositoryHandle {
        RepositoryHandle::new("demo", PathBuf::new(), "https://example.com/demo.git", "main")
    }

    #[test]
    fn test_clone_straight_success_keeps_requested_branch() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("demo");
        let backend = FakeBackend::new();

        let handle =
            run(&backend, &request_repo(), &target, "release", &reporter_for_test()).unwrap();
        assert_eq!(handle.default_branch, "release");
        assert_eq!(handle.local_path, target);
    }

    #[test]
    fn test_clone_falls_back_and_records_actual_branch() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("demo");
        let backend = FakeBackend::new();
        backend.script_clone_failure(BackendError::new(
            BackendErrorKind::BranchNotFound,
            "Remote branch 'nonexistent' not found in upstream",
        ));
        backend.set_current_branch("main");
        backend.leave_partial_clone_on_failure();

        let reporter = reporter_for_test();
        let handle = run(&backend, &request_repo(), &target, "nonexistent", &reporter).unwrap();

        assert_eq!(handle.default_branch, "main");
        // First failed attempt got cleaned up before the retry
        let clone_calls: Vec<_> = backend
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("clone"))
            .collect();
        assert_eq!(clone_calls.len(), 2);
        assert!(!target.join("partial.marker").exists());
        assert!(reporter
            .handle()
            .events()
            .iter()
            .any(|e| e.severity == Severity::Warning));
    }

    #[test]
    fn test_clone_other_failure_does_not_retry() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("demo");
        let backend = FakeBackend::new();
        backend.script_clone_failure(BackendError::other("Authentication failed"));
        backend.leave_partial_clone_on_failure();

        let err = run(
            &backend,
            &request_repo(),
            &target,
            "main",
            &reporter_for_test(),
        )
        .unwrap_err();

        assert_eq!(err.kind, BackendErrorKind::Other);
        let clone_calls: Vec<_> = backend
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("clone"))
            .collect();
        assert_eq!(clone_calls.len(), 1);
        assert!(!target.exists());
    }

    #[test]
    fn test_clone_harvests_gitignore() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("demo");
        let backend = FakeBackend::new();
        backend.set_cloned_gitignore("# build output\ntarget/\n\n*.log\n");

        let handle = run(&backend, &request_repo(), &target, "main", &reporter_for_test()).unwrap();
        assert_eq!(handle.exclusion_patterns, vec!["target/", "*.log"]);
    }
}
