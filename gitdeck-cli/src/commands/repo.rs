//! Registry management commands

use std::path::PathBuf;

use clap::{Args, Subcommand};
use gitdeck_core::RepositoryHandle;

use super::AppContext;

/// Manage the repository registry
#[derive(Args, Debug)]
pub struct RepoArgs {
    #[command(subcommand)]
    pub command: RepoCommand,
}

#[derive(Subcommand, Debug)]
pub enum RepoCommand {
    /// Register an existing working copy
    Add {
        /// Display name for the repository
        name: String,

        /// Path to the working copy
        #[arg(short, long)]
        path: PathBuf,

        /// Remote URL (optional for local-only repositories)
        #[arg(short, long, default_value = "")]
        url: String,

        /// Default branch
        #[arg(short, long, default_value = "main")]
        branch: String,

        /// Exclusion pattern (repeatable)
        #[arg(long = "exclude", value_name = "PATTERN")]
        excludes: Vec<String>,
    },

    /// List registered repositories
    List,

    /// Remove a repository from the registry (the working copy is kept)
    Remove {
        /// Name of the repository to remove
        name: String,
    },
}

impl RepoArgs {
    pub fn execute(&self, ctx: &mut AppContext) -> anyhow::Result<()> {
        match &self.command {
            RepoCommand::Add {
                name,
                path,
                url,
                branch,
                excludes,
            } => {
                let mut handle = RepositoryHandle::new(name, path.clone(), url, branch);
                handle.exclusion_patterns = excludes.clone();
                ctx.registry.add(handle)?;
                println!("Registered repository '{}'", name);
                Ok(())
            }
            RepoCommand::List => {
                if ctx.registry.list().is_empty() {
                    println!("No repositories registered");
                    return Ok(());
                }
                for repo in ctx.registry.list() {
                    let busy = if ctx.orchestrator.is_busy(&repo.local_path) {
                        " (busy)"
                    } else {
                        ""
                    };
                    println!(
                        "{}  {}  [{}]{}",
                        repo.name,
                        repo.local_path.display(),
                        repo.default_branch,
                        busy
                    );
                }
                Ok(())
            }
            RepoCommand::Remove { name } => {
                ctx.registry.remove_by_name(name)?;
                println!("Removed repository '{}'", name);
                Ok(())
            }
        }
    }
}
