//! Scripted backend for orchestrator and state-machine tests
//!
//! Records every call in order, injects failures per method, and can slow
//! calls down to widen race windows.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::{
    BackendError, BackendErrorKind, CommitInfo, FileState, LogFilter, MergeOutcome, RemoteInfo,
    ResolveSide, StatusEntry, VcsBackend,
};

pub(crate) struct FakeBackend {
    calls: Mutex<Vec<String>>,
    failures: Mutex<HashMap<&'static str, BackendError>>,
    clone_failures: Mutex<Vec<BackendError>>,
    call_delay: Mutex<Option<Duration>>,

    current_branch: Mutex<String>,
    branches: Mutex<Vec<String>>,
    dirty: AtomicBool,
    repository_valid: AtomicBool,
    remotes: Mutex<Vec<RemoteInfo>>,
    status_entries: Mutex<Vec<StatusEntry>>,
    unmerged: Mutex<Vec<PathBuf>>,
    resolutions: Mutex<Vec<(PathBuf, ResolveSide)>>,

    partial_clone_on_failure: AtomicBool,
    cloned_gitignore: Mutex<Option<String>>,
}

impl FakeBackend {
    pub(crate) fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            clone_failures: Mutex::new(Vec::new()),
            call_delay: Mutex::new(None),
            current_branch: Mutex::new("main".to_string()),
            branches: Mutex::new(vec!["main".to_string()]),
            dirty: AtomicBool::new(false),
            repository_valid: AtomicBool::new(true),
            remotes: Mutex::new(vec![RemoteInfo {
                name: "origin".to_string(),
                url: "https://example.com/demo.git".to_string(),
            }]),
            status_entries: Mutex::new(Vec::new()),
            unmerged: Mutex::new(Vec::new()),
            resolutions: Mutex::new(Vec::new()),
            partial_clone_on_failure: AtomicBool::new(false),
            cloned_gitignore: Mutex::new(None),
        }
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn branches(&self) -> Vec<String> {
        self.branches.lock().unwrap().clone()
    }

    pub(crate) fn unmerged(&self) -> Vec<PathBuf> {
        self.unmerged.lock().unwrap().clone()
    }

    pub(crate) fn last_resolution(&self, path: &Path) -> Option<ResolveSide> {
        self.resolutions
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(p, _)| p == path)
            .map(|(_, side)| *side)
    }

    pub(crate) fn fail_on(&self, method: &'static str, error: BackendError) {
        self.failures.lock().unwrap().insert(method, error);
    }

    pub(crate) fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }

    /// Queue a failure for the next clone attempt; later attempts succeed
    pub(crate) fn script_clone_failure(&self, error: BackendError) {
        self.clone_failures.lock().unwrap().push(error);
    }

    pub(crate) fn leave_partial_clone_on_failure(&self) {
        self.partial_clone_on_failure.store(true, Ordering::SeqCst);
    }

    pub(crate) fn set_cloned_gitignore(&self, contents: &str) {
        *self.cloned_gitignore.lock().unwrap() = Some(contents.to_string());
    }

    pub(crate) fn set_current_branch(&self, name: &str) {
        *self.current_branch.lock().unwrap() = name.to_string();
    }

    pub(crate) fn add_branch(&self, name: &str) {
        self.branches.lock().unwrap().push(name.to_string());
    }

    pub(crate) fn set_dirty(&self, dirty: bool) {
        self.dirty.store(dirty, Ordering::SeqCst);
    }

    pub(crate) fn set_repository_valid(&self, valid: bool) {
        self.repository_valid.store(valid, Ordering::SeqCst);
    }

    pub(crate) fn clear_remotes(&self) {
        self.remotes.lock().unwrap().clear();
    }

    pub(crate) fn set_status_dirty(&self) {
        self.status_entries.lock().unwrap().push(StatusEntry {
            path: PathBuf::from("a.txt"),
            state: FileState::Modified,
        });
    }

    pub(crate) fn add_unmerged(&self, path: &str) {
        self.unmerged.lock().unwrap().push(PathBuf::from(path));
    }

    pub(crate) fn set_call_delay(&self, delay: Duration) {
        *self.call_delay.lock().unwrap() = Some(delay);
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
        let delay = *self.call_delay.lock().unwrap();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
    }

    fn check_fail(&self, method: &'static str) -> Result<(), BackendError> {
        if let Some(error) = self.failures.lock().unwrap().get(method) {
            return Err(error.clone());
        }
        Ok(())
    }
}

impl VcsBackend for FakeBackend {
    fn clone_repo(
        &self,
        url: &str,
        path: &Path,
        branch: Option<&str>,
    ) -> Result<(), BackendError> {
        match branch {
            Some(branch) => self.record(format!("clone {} --branch {}", url, branch)),
            None => self.record(format!("clone {}", url)),
        }
        self.check_fail("clone")?;

        let scripted = {
            let mut failures = self.clone_failures.lock().unwrap();
            if failures.is_empty() {
                None
            } else {
                Some(failures.remove(0))
            }
        };
        if let Some(error) = scripted {
            if self.partial_clone_on_failure.load(Ordering::SeqCst) {
                let _ = std::fs::create_dir_all(path);
                let _ = std::fs::write(path.join("partial.marker"), "partial");
            }
            return Err(error);
        }

        let _ = std::fs::create_dir_all(path);
        if let Some(contents) = self.cloned_gitignore.lock().unwrap().as_deref() {
            let _ = std::fs::write(path.join(".gitignore"), contents);
        }
        Ok(())
    }

    fn is_repository(&self, _path: &Path) -> bool {
        self.repository_valid.load(Ordering::SeqCst)
    }

    fn current_branch(&self, _path: &Path) -> Result<String, BackendError> {
        self.record("current_branch");
        self.check_fail("current_branch")?;
        Ok(self.current_branch.lock().unwrap().clone())
    }

    fn is_dirty(&self, _path: &Path) -> Result<bool, BackendError> {
        self.record("is_dirty");
        self.check_fail("is_dirty")?;
        Ok(self.dirty.load(Ordering::SeqCst))
    }

    fn stash_save(&self, _path: &Path, message: &str) -> Result<(), BackendError> {
        self.record(format!("stash {}", message));
        self.check_fail("stash_save")?;
        self.dirty.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn fetch(&self, _path: &Path, remote: &str) -> Result<(), BackendError> {
        self.record(format!("fetch {}", remote));
        self.check_fail("fetch")
    }

    fn list_branches(&self, _path: &Path) -> Result<Vec<String>, BackendError> {
        self.record("list_branches");
        Ok(self.branches())
    }

    fn create_branch(&self, _path: &Path, name: &str) -> Result<(), BackendError> {
        self.record(format!("create_branch {}", name));
        self.check_fail("create_branch")?;
        self.add_branch(name);
        Ok(())
    }

    fn checkout(&self, _path: &Path, name: &str) -> Result<(), BackendError> {
        self.record(format!("checkout {}", name));
        self.check_fail("checkout")?;
        self.set_current_branch(name);
        Ok(())
    }

    fn delete_branch(&self, _path: &Path, name: &str, _force: bool) -> Result<(), BackendError> {
        self.record(format!("delete_branch {}", name));
        self.check_fail("delete_branch")?;
        self.branches.lock().unwrap().retain(|b| b != name);
        Ok(())
    }

    fn stage(&self, _path: &Path, file: &Path) -> Result<(), BackendError> {
        self.record(format!("stage {}", file.display()));
        self.check_fail("stage")
    }

    fn commit(&self, _path: &Path, message: &str) -> Result<(), BackendError> {
        self.record(format!("commit {}", message));
        self.check_fail("commit")?;
        if !self.unmerged.lock().unwrap().is_empty() {
            return Err(BackendError::new(
                BackendErrorKind::UnresolvedConflicts,
                "unresolved conflicts remain",
            ));
        }
        Ok(())
    }

    fn merge(&self, _path: &Path, branch: &str) -> Result<MergeOutcome, BackendError> {
        self.record(format!("merge {}", branch));
        self.check_fail("merge")?;
        Ok(MergeOutcome::Merged)
    }

    fn push(&self, _path: &Path, remote: &str, refspec: &str) -> Result<(), BackendError> {
        self.record(format!("push {} {}", remote, refspec));
        self.check_fail("push")
    }

    fn delete_remote_branch(
        &self,
        _path: &Path,
        _remote: &str,
        name: &str,
    ) -> Result<(), BackendError> {
        self.record(format!("delete_remote_branch {}", name));
        self.check_fail("delete_remote_branch")
    }

    fn tag(
        &self,
        _path: &Path,
        name: &str,
        _message: Option<&str>,
        _target: Option<&str>,
    ) -> Result<(), BackendError> {
        self.record(format!("tag {}", name));
        self.check_fail("tag")
    }

    fn list_unmerged(&self, _path: &Path) -> Result<Vec<PathBuf>, BackendError> {
        self.record("list_unmerged");
        self.check_fail("list_unmerged")?;
        Ok(self.unmerged())
    }

    fn resolve_with(
        &self,
        _path: &Path,
        file: &Path,
        side: ResolveSide,
    ) -> Result<(), BackendError> {
        self.record(format!("resolve {} {}", file.display(), side));
        self.check_fail("resolve_with")?;
        self.resolutions
            .lock()
            .unwrap()
            .push((file.to_path_buf(), side));
        self.unmerged.lock().unwrap().retain(|p| p != file);
        Ok(())
    }

    fn abort_merge(&self, _path: &Path) -> Result<(), BackendError> {
        self.record("abort_merge");
        self.check_fail("abort_merge")?;
        self.unmerged.lock().unwrap().clear();
        self.resolutions.lock().unwrap().clear();
        Ok(())
    }

    fn status(&self, _path: &Path) -> Result<Vec<StatusEntry>, BackendError> {
        self.record("status");
        self.check_fail("status")?;
        Ok(self.status_entries.lock().unwrap().clone())
    }

    fn log(&self, _path: &Path, _filter: &LogFilter) -> Result<Vec<CommitInfo>, BackendError> {
        self.record("log");
        Ok(Vec::new())
    }

    fn list_remotes(&self, _path: &Path) -> Result<Vec<RemoteInfo>, BackendError> {
        self.record("list_remotes");
        Ok(self.remotes.lock().unwrap().clone())
    }
}
