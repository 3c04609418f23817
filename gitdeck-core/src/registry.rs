//! Repository registry
//!
//! A durable, ordered list of known working copies. The file is re-written
//! in full on every mutation; a missing file means an empty registry.
//! Registry mutations never touch a working copy's version-control state,
//! so they are independent of the orchestrator's busy flags.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One known working copy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryHandle {
    /// Display name, unique within the registry
    pub name: String,
    /// Path of the working copy; stable for the lifetime of the handle
    pub local_path: PathBuf,
    /// Remote URL the working copy was cloned from (may be empty for
    /// local-only repositories)
    pub remote_url: String,
    /// Branch operations default to
    pub default_branch: String,
    /// Ignore patterns harvested from the repository
    #[serde(default)]
    pub exclusion_patterns: Vec<String>,
}

impl RepositoryHandle {
    pub fn new(
        name: impl Into<String>,
        local_path: impl Into<PathBuf>,
        remote_url: impl Into<String>,
        default_branch: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            local_path: local_path.into(),
            remote_url: remote_url.into(),
            default_branch: default_branch.into(),
            exclusion_patterns: Vec::new(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    repos: Vec<RepositoryHandle>,
}

/// Durable store of known repositories
#[derive(Debug)]
pub struct Registry {
    path: PathBuf,
    repos: Vec<RepositoryHandle>,
}

impl Registry {
    /// Load the registry from `path`, treating a missing file as empty
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let repos = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            let file: RegistryFile = serde_json::from_str(&contents)?;
            file.repos
        } else {
            Vec::new()
        };
        Ok(Self { path, repos })
    }

    /// Default registry location: `~/.config/gitdeck/repositories.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("gitdeck").join("repositories.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn list(&self) -> &[RepositoryHandle] {
        &self.repos
    }

    pub fn find_by_name(&self, name: &str) -> Option<&RepositoryHandle> {
        self.repos.iter().find(|r| r.name == name)
    }

    /// Append a repository and persist
    pub fn add(&mut self, handle: RepositoryHandle) -> Result<()> {
        if self.find_by_name(&handle.name).is_some() {
            return Err(Error::Validation(format!(
                "a repository named '{}' is already registered",
                handle.name
            )));
        }
        self.repos.push(handle);
        self.save()
    }

    /// Replace the repository at `index` and persist
    pub fn update(&mut self, index: usize, handle: RepositoryHandle) -> Result<()> {
        let slot = self.repos.get_mut(index).ok_or_else(|| {
            Error::Validation(format!("no repository at index {}", index))
        })?;
        *slot = handle;
        self.save()
    }

    /// Remove the repository at `index` and persist
    pub fn remove(&mut self, index: usize) -> Result<RepositoryHandle> {
        if index >= self.repos.len() {
            return Err(Error::Validation(format!("no repository at index {}", index)));
        }
        let removed = self.repos.remove(index);
        self.save()?;
        Ok(removed)
    }

    /// Remove a repository by name and persist
    pub fn remove_by_name(&mut self, name: &str) -> Result<RepositoryHandle> {
        let index = self
            .repos
            .iter()
            .position(|r| r.name == name)
            .ok_or_else(|| Error::Validation(format!("no repository named '{}'", name)))?;
        self.remove(index)
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = RegistryFile {
            repos: self.repos.clone(),
        };
        let contents = serde_json::to_string_pretty(&file)?;
        std::fs::write(&self.path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn registry_in(tmp: &TempDir) -> Registry {
        Registry::load(tmp.path().join("repositories.json")).unwrap()
    }

    #[test]
    fn test_missing_file_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = registry_in(&tmp);
        assert!(registry.list().is_empty());
    }

    #[test]
    fn test_add_persists_and_reloads() {
        let tmp = tempfile::tempdir().unwrap();
        let mut registry = registry_in(&tmp);

        registry
            .add(RepositoryHandle::new(
                "demo",
                "/tmp/demo",
                "https://example.com/demo.git",
                "main",
            ))
            .unwrap();

        let reloaded = registry_in(&tmp);
        assert_eq!(reloaded.list().len(), 1);
        assert_eq!(reloaded.find_by_name("demo").unwrap().default_branch, "main");
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let mut registry = registry_in(&tmp);

        let handle = RepositoryHandle::new("demo", "/tmp/demo", "", "main");
        registry.add(handle.clone()).unwrap();
        assert!(registry.add(handle).is_err());
    }

    #[test]
    fn test_update_and_remove() {
        let tmp = tempfile::tempdir().unwrap();
        let mut registry = registry_in(&tmp);

        registry
            .add(RepositoryHandle::new("a", "/tmp/a", "", "main"))
            .unwrap();
        registry
            .add(RepositoryHandle::new("b", "/tmp/b", "", "main"))
            .unwrap();

        let mut updated = RepositoryHandle::new("a", "/tmp/a", "", "develop");
        updated.exclusion_patterns = vec!["target/".to_string()];
        registry.update(0, updated).unwrap();

        let removed = registry.remove_by_name("b").unwrap();
        assert_eq!(removed.name, "b");

        let reloaded = registry_in(&tmp);
        assert_eq!(reloaded.list().len(), 1);
        assert_eq!(reloaded.list()[0].default_branch, "develop");
        assert_eq!(reloaded.list()[0].exclusion_patterns, vec!["target/"]);
    }

    #[test]
    fn test_remove_out_of_range() {
        let tmp = tempfile::tempdir().unwrap();
        let mut registry = registry_in(&tmp);
        assert!(registry.remove(0).is_err());
    }
}
