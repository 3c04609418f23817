//! Git implementation of the backend contract
//!
//! Local primitives go through git2; the two network primitives (clone,
//! push) shell out to the system `git` binary. Subprocess stderr is
//! classified into structured error kinds here and nowhere else.

use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::DateTime;
use git2::build::CheckoutBuilder;
use git2::{
    BranchType, FetchOptions, ObjectType, RemoteCallbacks, Repository, RepositoryState, ResetType,
    Signature, Status, StatusOptions,
};

use super::{
    BackendError, BackendErrorKind, CommitInfo, FileState, LogFilter, MergeOutcome, RemoteInfo,
    ResolveSide, StatusEntry, VcsBackend,
};

/// Backend implementation over git2 and the `git` binary
#[derive(Debug, Clone)]
pub struct GitBackend {
    /// Path to the git executable used for network operations
    git_path: String,
}

impl GitBackend {
    pub fn new() -> Self {
        Self {
            git_path: "git".to_string(),
        }
    }

    /// Set a custom path to the git executable
    pub fn with_git_path(mut self, path: impl Into<String>) -> Self {
        self.git_path = path.into();
        self
    }

    fn open(&self, path: &Path) -> Result<Repository, BackendError> {
        Repository::open(path).map_err(|e| {
            if e.code() == git2::ErrorCode::NotFound {
                BackendError::new(
                    BackendErrorKind::NotARepository,
                    format!("Not a git repository: {}", path.display()),
                )
            } else {
                BackendError::other(format!("Git error: {}", e.message()))
            }
        })
    }

    fn signature(&self, repo: &Repository) -> Result<Signature<'static>, BackendError> {
        match repo.signature() {
            Ok(sig) => Ok(sig),
            // No identity configured; fall back to a fixed one
            Err(_) => Signature::now("gitdeck", "gitdeck@localhost").map_err(Into::into),
        }
    }

    fn workdir(repo: &Repository) -> Result<&Path, BackendError> {
        repo.workdir()
            .ok_or_else(|| BackendError::other("Bare repositories are not supported"))
    }

    fn workdir_rel(repo: &Repository, file: &Path) -> Result<PathBuf, BackendError> {
        let workdir = Self::workdir(repo)?;
        if file.is_absolute() {
            file.strip_prefix(workdir)
                .map(Path::to_path_buf)
                .map_err(|_| {
                    BackendError::other(format!(
                        "Path {} is outside the working copy",
                        file.display()
                    ))
                })
        } else {
            Ok(file.to_path_buf())
        }
    }

    /// Resolve a branch name to a reference: local branch first, then a
    /// remote tracking branch (e.g. "origin/main"), then a raw reference.
    fn find_merge_target<'a>(
        repo: &'a Repository,
        branch: &str,
    ) -> Result<git2::Reference<'a>, BackendError> {
        if let Ok(b) = repo.find_branch(branch, BranchType::Local) {
            return Ok(b.into_reference());
        }
        if let Ok(r) = repo.find_reference(&format!("refs/remotes/{}", branch)) {
            return Ok(r);
        }
        if let Ok(r) = repo.find_reference(branch) {
            return Ok(r);
        }
        Err(BackendError::other(format!("Branch '{}' not found", branch)))
    }

    fn run_git(&self, cwd: Option<&Path>, args: &[&str]) -> Result<std::process::Output, BackendError> {
        let mut cmd = Command::new(&self.git_path);
        cmd.args(args);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        cmd.output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BackendError::other(format!(
                    "Git executable not found at '{}'. Is git installed?",
                    self.git_path
                ))
            } else {
                BackendError::other(format!("Failed to run git: {}", e))
            }
        })
    }
}

impl Default for GitBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a failed `git clone` stderr to a structured error. This is the only
/// place that inspects the branch-missing signature.
fn classify_clone_failure(url: &str, branch: Option<&str>, stderr: &str) -> BackendError {
    if let Some(branch) = branch {
        if stderr.contains("not found in upstream") || stderr.contains("Could not find remote branch")
        {
            return BackendError::new(
                BackendErrorKind::BranchNotFound,
                format!("Remote branch '{}' not found in upstream", branch),
            );
        }
    }

    if stderr.contains("Authentication failed") || stderr.contains("Permission denied") {
        return BackendError::other(format!(
            "Authentication failed for {}. Check your credentials or repository access.",
            url
        ));
    }

    if stderr.contains("Could not resolve host") || stderr.contains("unable to access") {
        return BackendError::other(format!(
            "Network error cloning {}. Check your internet connection.",
            url
        ));
    }

    BackendError::other(format!("git clone failed: {}", stderr.trim()))
}

impl VcsBackend for GitBackend {
    fn clone_repo(
        &self,
        url: &str,
        path: &Path,
        branch: Option<&str>,
    ) -> Result<(), BackendError> {
        let path_str = path
            .to_str()
            .ok_or_else(|| BackendError::other("Invalid clone target path"))?;

        let mut args = vec!["clone"];
        if let Some(branch) = branch {
            args.push("--branch");
            args.push(branch);
        }
        args.push(url);
        args.push(path_str);

        let output = self.run_git(None, &args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_clone_failure(url, branch, &stderr));
        }
        Ok(())
    }

    fn is_repository(&self, path: &Path) -> bool {
        Repository::open(path).is_ok()
    }

    fn current_branch(&self, path: &Path) -> Result<String, BackendError> {
        let repo = self.open(path)?;
        let result = match repo.head() {
            Ok(head) if head.is_branch() => Ok(head.shorthand().unwrap_or_default().to_string()),
            Ok(_) => Err(BackendError::other("HEAD is detached")),
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => {
                // Fresh repository: HEAD names a branch with no commits yet
                let head = repo.find_reference("HEAD")?;
                let target = head.symbolic_target().unwrap_or("refs/heads/master");
                Ok(target.trim_start_matches("refs/heads/").to_string())
            }
            Err(e) => Err(BackendError::other(format!(
                "Failed to read HEAD: {}",
                e.message()
            ))),
        };
        result
    }

    fn is_dirty(&self, path: &Path) -> Result<bool, BackendError> {
        let repo = self.open(path)?;
        let mut opts = StatusOptions::new();
        opts.include_untracked(false);
        let statuses = repo.statuses(Some(&mut opts))?;
        Ok(!statuses.is_empty())
    }

    fn stash_save(&self, path: &Path, message: &str) -> Result<(), BackendError> {
        let mut repo = self.open(path)?;
        let sig = self.signature(&repo)?;
        repo.stash_save(&sig, message, None)
            .map_err(|e| BackendError::other(format!("Stash failed: {}", e.message())))?;
        Ok(())
    }

    fn fetch(&self, path: &Path, remote: &str) -> Result<(), BackendError> {
        let repo = self.open(path)?;
        let mut remote = repo.find_remote(remote).map_err(|e| {
            BackendError::new(
                BackendErrorKind::NoRemote,
                format!("Remote not found: {}", e.message()),
            )
        })?;

        let mut callbacks = RemoteCallbacks::new();
        callbacks.transfer_progress(|_| true);

        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(callbacks);

        remote
            .fetch(&[] as &[&str], Some(&mut fetch_options), None)
            .map_err(|e| BackendError::other(format!("Fetch failed: {}", e.message())))
    }

    fn list_branches(&self, path: &Path) -> Result<Vec<String>, BackendError> {
        let repo = self.open(path)?;
        let mut branches = Vec::new();

        for branch in repo.branches(Some(BranchType::Local))? {
            let (branch, _) = branch?;
            if let Some(name) = branch.name().ok().flatten() {
                branches.push(name.to_string());
            }
        }

        Ok(branches)
    }

    fn create_branch(&self, path: &Path, name: &str) -> Result<(), BackendError> {
        let repo = self.open(path)?;
        let head = repo.head()?.peel_to_commit()?;
        repo.branch(name, &head, false).map_err(|e| {
            BackendError::other(format!("Failed to create branch '{}': {}", name, e.message()))
        })?;
        Ok(())
    }

    fn checkout(&self, path: &Path, name: &str) -> Result<(), BackendError> {
        let repo = self.open(path)?;
        let (object, reference) = repo.revparse_ext(name).map_err(|e| {
            BackendError::other(format!("Branch '{}' not found: {}", name, e.message()))
        })?;

        repo.checkout_tree(&object, None).map_err(|e| {
            BackendError::other(format!("Checkout of '{}' failed: {}", name, e.message()))
        })?;

        match reference.as_ref().and_then(|r| r.name()) {
            Some(refname) => repo.set_head(refname)?,
            None => repo.set_head_detached(object.id())?,
        }
        Ok(())
    }

    fn delete_branch(&self, path: &Path, name: &str, force: bool) -> Result<(), BackendError> {
        let repo = self.open(path)?;

        if self.current_branch(path).ok().as_deref() == Some(name) {
            return Err(BackendError::other(format!(
                "Cannot delete the current branch '{}'",
                name
            )));
        }

        let mut branch = repo.find_branch(name, BranchType::Local).map_err(|e| {
            BackendError::other(format!("Branch '{}' not found: {}", name, e.message()))
        })?;

        if !force {
            let tip = branch.get().peel_to_commit()?.id();
            let head = repo.head()?.peel_to_commit()?.id();
            let merged = tip == head || repo.graph_descendant_of(head, tip)?;
            if !merged {
                return Err(BackendError::new(
                    BackendErrorKind::UnmergedBranch,
                    format!(
                        "Branch '{}' is not fully merged; force the deletion to discard its commits",
                        name
                    ),
                ));
            }
        }

        branch.delete()?;
        Ok(())
    }

    fn stage(&self, path: &Path, file: &Path) -> Result<(), BackendError> {
        let repo = self.open(path)?;
        let rel = Self::workdir_rel(&repo, file)?;
        let on_disk = Self::workdir(&repo)?.join(&rel).exists();

        let mut index = repo.index()?;
        if on_disk {
            index.add_path(&rel)?;
        } else {
            index.remove_path(&rel)?;
        }
        index.write()?;
        Ok(())
    }

    fn commit(&self, path: &Path, message: &str) -> Result<(), BackendError> {
        let mut repo = self.open(path)?;
        let mut index = repo.index()?;

        if index.has_conflicts() {
            return Err(BackendError::new(
                BackendErrorKind::UnresolvedConflicts,
                "Unresolved conflicts remain; resolve every file before committing",
            ));
        }

        let tree_id = index.write_tree()?;
        let sig = self.signature(&repo)?;

        let merging = repo.state() == RepositoryState::Merge;
        let mut merge_heads = Vec::new();
        if merging {
            repo.mergehead_foreach(|oid| {
                merge_heads.push(*oid);
                true
            })?;
        }

        let tree = repo.find_tree(tree_id)?;

        let mut parents = Vec::new();
        if let Ok(head) = repo.head() {
            parents.push(head.peel_to_commit()?);
        }
        for oid in merge_heads {
            parents.push(repo.find_commit(oid)?);
        }

        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)?;

        if merging {
            repo.cleanup_state()?;
        }
        Ok(())
    }

    fn merge(&self, path: &Path, branch: &str) -> Result<MergeOutcome, BackendError> {
        let repo = self.open(path)?;
        let reference = Self::find_merge_target(&repo, branch)?;
        let annotated = repo.reference_to_annotated_commit(&reference)?;
        let (analysis, _) = repo.merge_analysis(&[&annotated])?;

        if analysis.is_up_to_date() {
            return Ok(MergeOutcome::UpToDate);
        }

        if analysis.is_fast_forward() {
            let head_name = repo
                .head()?
                .name()
                .map(String::from)
                .ok_or_else(|| BackendError::other("HEAD is not a named reference"))?;
            let mut head_ref = repo.find_reference(&head_name)?;
            head_ref.set_target(
                annotated.id(),
                &format!("merge {}: fast-forward", branch),
            )?;
            repo.set_head(&head_name)?;
            repo.checkout_head(Some(CheckoutBuilder::new().force()))?;
            return Ok(MergeOutcome::FastForward);
        }

        let mut checkout = CheckoutBuilder::new();
        checkout.allow_conflicts(true);
        repo.merge(&[&annotated], None, Some(&mut checkout))?;

        if repo.index()?.has_conflicts() {
            // Merge state stays in place for the resolution workflow
            let conflicted = self.list_unmerged(path)?.len();
            return Err(BackendError::new(
                BackendErrorKind::MergeConflicts,
                format!(
                    "Merge of '{}' stopped on {} conflicted file(s); resolve them or abort the merge",
                    branch, conflicted
                ),
            ));
        }

        self.commit(path, &format!("Merge branch '{}'", branch))?;
        Ok(MergeOutcome::Merged)
    }

    fn push(&self, path: &Path, remote: &str, refspec: &str) -> Result<(), BackendError> {
        let output = self.run_git(Some(path), &["push", remote, refspec])?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("[rejected]") {
                return Err(BackendError::other(format!(
                    "Push rejected by the remote: {}",
                    stderr.trim()
                )));
            }
            return Err(BackendError::other(format!(
                "git push failed: {}",
                stderr.trim()
            )));
        }
        Ok(())
    }

    fn delete_remote_branch(
        &self,
        path: &Path,
        remote: &str,
        name: &str,
    ) -> Result<(), BackendError> {
        let output = self.run_git(Some(path), &["push", remote, "--delete", name])?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BackendError::other(format!(
                "Failed to delete remote branch '{}': {}",
                name,
                stderr.trim()
            )));
        }
        Ok(())
    }

    fn tag(
        &self,
        path: &Path,
        name: &str,
        message: Option<&str>,
        target: Option<&str>,
    ) -> Result<(), BackendError> {
        let repo = self.open(path)?;
        let object = match target {
            Some(rev) => repo.revparse_single(rev).map_err(|e| {
                BackendError::other(format!("Unknown tag target '{}': {}", rev, e.message()))
            })?,
            None => repo.head()?.peel(ObjectType::Commit)?,
        };

        match message {
            Some(message) if !message.is_empty() => {
                let sig = self.signature(&repo)?;
                repo.tag(name, &object, &sig, message, false)?;
            }
            _ => {
                repo.tag_lightweight(name, &object, false)?;
            }
        }
        Ok(())
    }

    fn list_unmerged(&self, path: &Path) -> Result<Vec<PathBuf>, BackendError> {
        let repo = self.open(path)?;
        let index = repo.index()?;
        let mut paths = Vec::new();

        for conflict in index.conflicts()? {
            let conflict = conflict?;
            let entry = conflict.our.or(conflict.their).or(conflict.ancestor);
            if let Some(entry) = entry {
                let path = PathBuf::from(String::from_utf8_lossy(&entry.path).into_owned());
                if !paths.contains(&path) {
                    paths.push(path);
                }
            }
        }

        Ok(paths)
    }

    fn resolve_with(
        &self,
        path: &Path,
        file: &Path,
        side: ResolveSide,
    ) -> Result<(), BackendError> {
        let mut repo = self.open(path)?;
        let workdir = Self::workdir(&repo)?.to_path_buf();
        let rel = Self::workdir_rel(&repo, file)?;
        let rel_bytes = rel.to_string_lossy().into_owned().into_bytes();

        let mut index = repo.index()?;

        let mut conflict_entry = None;
        let mut found = false;
        for conflict in index.conflicts()? {
            let conflict = conflict?;
            let matches = conflict
                .our
                .as_ref()
                .or(conflict.their.as_ref())
                .or(conflict.ancestor.as_ref())
                .is_some_and(|e| e.path == rel_bytes);
            if matches {
                found = true;
                conflict_entry = match side {
                    ResolveSide::Ours => conflict.our,
                    ResolveSide::Theirs => conflict.their,
                };
                break;
            }
        }

        let blob_id = if found {
            conflict_entry.map(|e| e.id)
        } else {
            // Already resolved once; re-resolve from the merge's source trees
            if repo.state() != RepositoryState::Merge {
                return Err(BackendError::other(format!(
                    "'{}' is not part of a merge in progress",
                    rel.display()
                )));
            }
            let tree = match side {
                ResolveSide::Ours => repo.head()?.peel_to_tree()?,
                ResolveSide::Theirs => {
                    let mut merge_heads = Vec::new();
                    repo.mergehead_foreach(|oid| {
                        merge_heads.push(*oid);
                        true
                    })?;
                    let oid = merge_heads
                        .first()
                        .copied()
                        .ok_or_else(|| BackendError::other("No merge head found"))?;
                    repo.find_commit(oid)?.tree()?
                }
            };
            tree.get_path(&rel).ok().map(|entry| entry.id())
        };

        match blob_id {
            Some(id) => {
                let blob = repo.find_blob(id)?;
                let dest = workdir.join(&rel);
                if let Some(parent) = dest.parent() {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| BackendError::other(format!("IO error: {}", e)))?;
                }
                std::fs::write(&dest, blob.content())
                    .map_err(|e| BackendError::other(format!("IO error: {}", e)))?;
                index.add_path(&rel)?;
            }
            None => {
                // The chosen side deleted the file
                let dest = workdir.join(&rel);
                if dest.exists() {
                    std::fs::remove_file(&dest)
                        .map_err(|e| BackendError::other(format!("IO error: {}", e)))?;
                }
                index.remove_path(&rel)?;
            }
        }

        index.write()?;
        Ok(())
    }

    fn abort_merge(&self, path: &Path) -> Result<(), BackendError> {
        let repo = self.open(path)?;
        let head = repo.head()?.peel(ObjectType::Commit)?;
        repo.reset(&head, ResetType::Hard, None)?;
        repo.cleanup_state()?;
        Ok(())
    }

    fn status(&self, path: &Path) -> Result<Vec<StatusEntry>, BackendError> {
        let repo = self.open(path)?;
        let mut opts = StatusOptions::new();
        opts.include_untracked(true).recurse_untracked_dirs(true);
        let statuses = repo.statuses(Some(&mut opts))?;

        let mut entries = Vec::new();
        for entry in statuses.iter() {
            let status = entry.status();
            if status.contains(Status::IGNORED) {
                continue;
            }
            let state = if status.contains(Status::CONFLICTED) {
                FileState::Conflicted
            } else if status.contains(Status::WT_NEW) {
                FileState::Untracked
            } else if status.contains(Status::INDEX_NEW) {
                FileState::Added
            } else if status.contains(Status::INDEX_RENAMED) || status.contains(Status::WT_RENAMED)
            {
                FileState::Renamed
            } else if status.contains(Status::INDEX_DELETED) || status.contains(Status::WT_DELETED)
            {
                FileState::Deleted
            } else {
                FileState::Modified
            };
            if let Some(path) = entry.path() {
                entries.push(StatusEntry {
                    path: PathBuf::from(path),
                    state,
                });
            }
        }

        Ok(entries)
    }

    fn log(&self, path: &Path, filter: &LogFilter) -> Result<Vec<CommitInfo>, BackendError> {
        let repo = self.open(path)?;
        let mut walk = repo.revwalk()?;
        if walk.push_head().is_err() {
            // No commits yet
            return Ok(Vec::new());
        }

        let mut commits = Vec::new();
        for oid in walk {
            let oid = oid?;
            let commit = repo.find_commit(oid)?;
            let author = commit.author();
            let name = author.name().unwrap_or_default().to_string();
            let email = author.email().unwrap_or_default().to_string();
            let message = commit.message().unwrap_or_default();

            if let Some(ref wanted) = filter.author {
                if !name.contains(wanted.as_str()) {
                    continue;
                }
            }
            if let Some(ref wanted) = filter.message {
                if !message.contains(wanted.as_str()) {
                    continue;
                }
            }

            commits.push(CommitInfo {
                id: oid.to_string(),
                author: name,
                email,
                time: DateTime::from_timestamp(commit.time().seconds(), 0).unwrap_or_default(),
                summary: commit.summary().unwrap_or_default().to_string(),
            });

            if filter.limit > 0 && commits.len() >= filter.limit {
                break;
            }
        }

        Ok(commits)
    }

    fn list_remotes(&self, path: &Path) -> Result<Vec<RemoteInfo>, BackendError> {
        let repo = self.open(path)?;
        let remotes = repo.remotes()?;

        let mut result = Vec::new();
        for remote_name in remotes.iter().flatten() {
            if let Ok(remote) = repo.find_remote(remote_name) {
                if let Some(url) = remote.url() {
                    result.push(RemoteInfo {
                        name: remote_name.to_string(),
                        url: url.to_string(),
                    });
                }
            }
        }

        Ok(result)
    }
}
