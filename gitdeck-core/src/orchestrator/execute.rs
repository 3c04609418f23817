//! Execution bodies for operation kinds
//!
//! Each kind maps to a fixed ordered sequence of backend calls. Progress
//! moves at coarse milestones, not per byte. The first backend failure
//! aborts the remaining steps; nothing is retried or rolled back here.

use std::path::Path;

use crate::backend::{default_remote, BackendError, BackendErrorKind, MergeOutcome, VcsBackend};
use crate::clone_flow;
use crate::ops::{OperationAction, OperationRequest};
use crate::orchestrator::handle::{OperationOutcome, Reporter};

pub(crate) fn run(
    backend: &dyn VcsBackend,
    request: &OperationRequest,
    reporter: &Reporter,
    preferred_remote: &str,
) -> Result<(), BackendError> {
    let repository = &request.repository;
    let path = repository.local_path.as_path();

    match &request.action {
        OperationAction::Clone { target_dir, branch } => {
            let cloned = clone_flow::run(backend, repository, target_dir, branch, reporter)?;
            reporter.handle().set_outcome(OperationOutcome::Cloned(cloned));
            Ok(())
        }

        OperationAction::Commit { files, message } => {
            reporter.info("Staging selected files...");
            reporter.progress(20);
            for (i, file) in files.iter().enumerate() {
                backend.stage(path, file)?;
                let milestone = 20 + 40 * (i + 1) / files.len();
                reporter.progress(milestone as u8);
            }

            reporter.info(format!("Creating commit: {}", message));
            backend.commit(path, message)?;
            reporter.progress(100);
            reporter.success("Commit created successfully");
            Ok(())
        }

        OperationAction::CreateBranch { name, switch } => {
            reporter.info(format!("Creating branch '{}'...", name));
            backend.create_branch(path, name)?;
            reporter.progress(70);

            if *switch {
                reporter.info(format!("Switching to branch '{}'...", name));
                backend.checkout(path, name)?;
            }
            reporter.progress(100);
            reporter.success(format!("Branch '{}' created successfully", name));
            Ok(())
        }

        OperationAction::SwitchBranch { name, stash } => {
            let current = backend.current_branch(path)?;
            if current == *name {
                reporter.progress(100);
                reporter.success(format!("Already on branch '{}'", name));
                return Ok(());
            }

            if backend.is_dirty(path)? {
                if *stash {
                    reporter.info("Stashing uncommitted changes...");
                    backend.stash_save(path, &format!("Auto-stash before switching to {}", name))?;
                } else {
                    return Err(BackendError::other(
                        "The working copy has uncommitted changes; commit them or enable stashing",
                    ));
                }
            }
            reporter.progress(50);

            reporter.info(format!("Switching to branch '{}'...", name));
            backend.checkout(path, name)?;
            reporter.progress(100);
            reporter.success(format!("Switched to branch '{}'", name));
            Ok(())
        }

        OperationAction::DeleteBranch {
            name,
            force,
            remote,
        } => {
            reporter.info(format!("Deleting local branch '{}'...", name));
            backend.delete_branch(path, name, *force)?;
            reporter.progress(60);

            if *remote {
                // Independent second step; a failure here leaves the local
                // deletion in place
                let remote_name = pick_remote(backend, path, preferred_remote)?;
                reporter.info(format!("Deleting remote branch '{}'...", name));
                backend.delete_remote_branch(path, &remote_name, name)?;
            }
            reporter.progress(100);
            reporter.success(format!("Branch '{}' deleted successfully", name));
            Ok(())
        }

        OperationAction::Merge { branch } => {
            reporter.info(format!("Merging branch '{}'...", branch));
            let outcome = backend.merge(path, branch)?;
            reporter.progress(100);
            match outcome {
                MergeOutcome::UpToDate => {
                    reporter.success(format!("Already up to date with '{}'", branch));
                }
                MergeOutcome::FastForward => {
                    reporter.success(format!("Fast-forwarded to '{}'", branch));
                }
                MergeOutcome::Merged => {
                    reporter.success(format!("Merged branch '{}'", branch));
                }
            }
            Ok(())
        }

        OperationAction::Pull => {
            let remote = pick_remote(backend, path, preferred_remote)?;
            reporter.info(format!("Fetching from '{}'...", remote));
            backend.fetch(path, &remote)?;
            reporter.progress(50);

            let current = backend.current_branch(path)?;
            let upstream = format!("{}/{}", remote, current);
            reporter.info(format!("Merging '{}'...", upstream));
            backend.merge(path, &upstream)?;
            reporter.progress(100);
            reporter.success("Pull completed successfully");
            Ok(())
        }

        OperationAction::Push => {
            let remote = pick_remote(backend, path, preferred_remote)?;
            let current = backend.current_branch(path)?;
            reporter.info(format!("Pushing branch '{}' to '{}'...", current, remote));
            backend.push(path, &remote, &current)?;
            reporter.progress(100);
            reporter.success("Push completed successfully");
            Ok(())
        }

        OperationAction::Tag {
            name,
            message,
            target,
            push,
        } => {
            if message.is_some() {
                reporter.info(format!("Creating annotated tag '{}'...", name));
            } else {
                reporter.info(format!("Creating lightweight tag '{}'...", name));
            }
            backend.tag(path, name, message.as_deref(), target.as_deref())?;
            reporter.progress(60);

            if *push {
                let remote = pick_remote(backend, path, preferred_remote)?;
                reporter.info(format!("Pushing tag '{}' to '{}'...", name, remote));
                backend.push(path, &remote, &format!("refs/tags/{}", name))?;
            }
            reporter.progress(100);
            reporter.success(format!("Tag '{}' created successfully", name));
            Ok(())
        }
    }
}

fn pick_remote(
    backend: &dyn VcsBackend,
    path: &Path,
    preferred: &str,
) -> Result<String, BackendError> {
    let remotes = backend.list_remotes(path)?;
    default_remote(&remotes, preferred)
        .map(|r| r.name.clone())
        .ok_or_else(|| BackendError::new(BackendErrorKind::NoRemote, "No remote configured"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use crate::backend::fake::FakeBackend;
    use crate::ops::OperationKind;
    use crate::orchestrator::handle::OperationHandle;
    use crate::orchestrator::Severity;
    use crate::registry::RepositoryHandle;

    fn reporter_for_test(kind: OperationKind) -> Reporter {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        Reporter::new(OperationHandle::new("demo", kind), tx)
    }

    fn repo() -> RepositoryHandle {
        RepositoryHandle::new("demo", "/tmp/demo", "https://example.com/demo.git", "main")
    }

    fn request(action: OperationAction) -> OperationRequest {
        OperationRequest::new(repo(), action)
    }

    #[test]
    fn test_commit_stages_each_file_then_commits() {
        let backend = FakeBackend::new();
        let reporter = reporter_for_test(OperationKind::Commit);

        run(
            &backend,
            &request(OperationAction::Commit {
                files: vec![PathBuf::from("a.txt"), PathBuf::from("b.txt")],
                message: "two files".to_string(),
            }),
            &reporter,
            "origin",
        )
        .unwrap();

        let calls = backend.calls();
        assert_eq!(
            calls,
            vec!["stage a.txt", "stage b.txt", "commit two files"]
        );
        assert_eq!(reporter.handle().progress(), 100);
        assert!(reporter
            .handle()
            .events()
            .iter()
            .any(|e| e.severity == Severity::Success));
    }

    #[test]
    fn test_commit_failure_stops_after_failed_step() {
        let backend = FakeBackend::new();
        backend.fail_on("commit", BackendError::other("index locked"));
        let reporter = reporter_for_test(OperationKind::Commit);

        let err = run(
            &backend,
            &request(OperationAction::Commit {
                files: vec![PathBuf::from("a.txt")],
                message: "msg".to_string(),
            }),
            &reporter,
            "origin",
        )
        .unwrap_err();

        assert_eq!(err.message, "index locked");
        // The failed step was not retried
        let commits = backend
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("commit"))
            .count();
        assert_eq!(commits, 1);
    }

    #[test]
    fn test_switch_to_current_branch_is_noop_success() {
        let backend = FakeBackend::new();
        backend.set_current_branch("main");
        let reporter = reporter_for_test(OperationKind::SwitchBranch);

        run(
            &backend,
            &request(OperationAction::SwitchBranch {
                name: "main".to_string(),
                stash: false,
            }),
            &reporter,
            "origin",
        )
        .unwrap();

        assert!(!backend.calls().iter().any(|c| c.starts_with("checkout")));
    }

    #[test]
    fn test_switch_dirty_without_stash_fails_before_checkout() {
        let backend = FakeBackend::new();
        backend.set_current_branch("main");
        backend.set_dirty(true);
        let reporter = reporter_for_test(OperationKind::SwitchBranch);

        let err = run(
            &backend,
            &request(OperationAction::SwitchBranch {
                name: "feature".to_string(),
                stash: false,
            }),
            &reporter,
            "origin",
        )
        .unwrap_err();

        assert!(err.message.contains("uncommitted changes"));
        assert!(!backend.calls().iter().any(|c| c.starts_with("checkout")));
    }

    #[test]
    fn test_switch_dirty_with_stash_names_destination() {
        let backend = FakeBackend::new();
        backend.set_current_branch("main");
        backend.set_dirty(true);
        let reporter = reporter_for_test(OperationKind::SwitchBranch);

        run(
            &backend,
            &request(OperationAction::SwitchBranch {
                name: "feature".to_string(),
                stash: true,
            }),
            &reporter,
            "origin",
        )
        .unwrap();

        let calls = backend.calls();
        assert_eq!(
            calls,
            vec![
                "current_branch",
                "is_dirty",
                "stash Auto-stash before switching to feature",
                "checkout feature"
            ]
        );
    }

    #[test]
    fn test_delete_remote_failure_keeps_local_deletion() {
        let backend = FakeBackend::new();
        backend.set_current_branch("main");
        backend.add_branch("feature");
        backend.fail_on("delete_remote_branch", BackendError::other("remote gone"));
        let reporter = reporter_for_test(OperationKind::DeleteBranch);

        let err = run(
            &backend,
            &request(OperationAction::DeleteBranch {
                name: "feature".to_string(),
                force: false,
                remote: true,
            }),
            &reporter,
            "origin",
        )
        .unwrap_err();

        assert_eq!(err.message, "remote gone");
        // Local delete happened and is not rolled back
        assert!(backend.calls().iter().any(|c| c == "delete_branch feature"));
        assert!(!backend.branches().contains(&"feature".to_string()));
    }

    #[test]
    fn test_pull_fetches_then_merges_upstream() {
        let backend = FakeBackend::new();
        backend.set_current_branch("main");
        let reporter = reporter_for_test(OperationKind::Pull);

        run(&backend, &request(OperationAction::Pull), &reporter, "origin").unwrap();

        let calls = backend.calls();
        assert!(calls.contains(&"fetch origin".to_string()));
        assert!(calls.contains(&"merge origin/main".to_string()));
    }

    #[test]
    fn test_tag_with_push_pushes_tag_ref() {
        let backend = FakeBackend::new();
        let reporter = reporter_for_test(OperationKind::Tag);

        run(
            &backend,
            &request(OperationAction::Tag {
                name: "v1.0".to_string(),
                message: Some("release".to_string()),
                target: None,
                push: true,
            }),
            &reporter,
            "origin",
        )
        .unwrap();

        let calls = backend.calls();
        assert!(calls.contains(&"tag v1.0".to_string()));
        assert!(calls.contains(&"push origin refs/tags/v1.0".to_string()));
    }
}
