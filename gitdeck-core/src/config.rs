//! Configuration management for gitdeck
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (GITDECK_*)
//! 3. Config file (~/.config/gitdeck/config.toml)
//! 4. Default values

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Git-related configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GitConfig {
    /// Path to the git executable used for network operations
    pub git_path: String,

    /// Remote that push/pull/fetch talk to by default
    pub remote_name: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            git_path: "git".to_string(),
            remote_name: "origin".to_string(),
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Git configuration
    pub git: GitConfig,

    /// Override for the repository registry file location
    pub registry_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default config file location
    ///
    /// Returns default config if file doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();

        if let Some(path) = config_path {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &PathBuf) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(Error::Io)?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Get the default config file path
    ///
    /// Returns `~/.config/gitdeck/config.toml` on Unix
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("gitdeck").join("config.toml"))
    }

    /// The registry file to use: explicit override, then the default
    pub fn registry_path(&self) -> Option<PathBuf> {
        self.registry_path
            .clone()
            .or_else(crate::registry::Registry::default_path)
    }

    /// Apply environment variable overrides
    ///
    /// Supported variables:
    /// - GITDECK_GIT_PATH: Path to the git executable
    /// - GITDECK_REMOTE: Default remote name
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(git_path) = std::env::var("GITDECK_GIT_PATH") {
            self.git.git_path = git_path;
        }

        if let Ok(remote) = std::env::var("GITDECK_REMOTE") {
            self.git.remote_name = remote;
        }

        self
    }

    /// Apply CLI flag overrides
    pub fn with_cli_overrides(
        mut self,
        git_path: Option<String>,
        registry_path: Option<PathBuf>,
    ) -> Self {
        if let Some(path) = git_path {
            self.git.git_path = path;
        }

        if let Some(path) = registry_path {
            self.registry_path = Some(path);
        }

        self
    }

    /// Load configuration with all overrides applied
    ///
    /// Priority: CLI > env > config file > defaults
    pub fn load_with_overrides(
        git_path: Option<String>,
        registry_path: Option<PathBuf>,
    ) -> Result<Self> {
        Ok(Self::load()?
            .with_env_overrides()
            .with_cli_overrides(git_path, registry_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.git.git_path, "git");
        assert_eq!(config.git.remote_name, "origin");
        assert!(config.registry_path.is_none());
    }

    #[test]
    fn test_cli_overrides() {
        let config = Config::default()
            .with_cli_overrides(Some("/usr/local/bin/git".to_string()), None);
        assert_eq!(config.git.git_path, "/usr/local/bin/git");
        assert_eq!(config.git.remote_name, "origin");
    }

    #[test]
    fn test_parse_partial_file() {
        let config: Config = toml::from_str("[git]\nremote_name = \"upstream\"\n").unwrap();
        assert_eq!(config.git.remote_name, "upstream");
        assert_eq!(config.git.git_path, "git");
    }
}
