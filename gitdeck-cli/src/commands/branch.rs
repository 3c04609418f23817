//! Branch management commands

use clap::{Args, Subcommand};
use gitdeck_core::{OperationAction, OperationRequest, VcsBackend};

use super::AppContext;

/// Create, switch, delete, or list branches
#[derive(Args, Debug)]
pub struct BranchArgs {
    #[command(subcommand)]
    pub command: BranchCommand,
}

#[derive(Subcommand, Debug)]
pub enum BranchCommand {
    /// Create a branch off the current HEAD
    Create {
        /// Registered repository
        repo: String,

        /// Name of the new branch
        name: String,

        /// Switch to the new branch after creating it
        #[arg(short, long)]
        switch: bool,
    },

    /// Switch to another branch
    Switch {
        /// Registered repository
        repo: String,

        /// Branch to switch to
        name: String,

        /// Stash uncommitted changes instead of refusing to switch
        #[arg(long)]
        stash: bool,
    },

    /// Delete a branch
    Delete {
        /// Registered repository
        repo: String,

        /// Branch to delete
        name: String,

        /// Delete even if the branch has unmerged commits
        #[arg(short, long)]
        force: bool,

        /// Also delete the branch on the default remote
        #[arg(long)]
        remote: bool,
    },

    /// List local branches
    List {
        /// Registered repository
        repo: String,
    },
}

impl BranchArgs {
    pub async fn execute(&self, ctx: &mut AppContext) -> anyhow::Result<()> {
        match &self.command {
            BranchCommand::Create { repo, name, switch } => {
                let repository = ctx.repo(repo)?;
                let request = OperationRequest::new(
                    repository,
                    OperationAction::CreateBranch {
                        name: name.clone(),
                        switch: *switch,
                    },
                );
                ctx.run_to_completion(request).await?;
                Ok(())
            }
            BranchCommand::Switch { repo, name, stash } => {
                let repository = ctx.repo(repo)?;
                let request = OperationRequest::new(
                    repository,
                    OperationAction::SwitchBranch {
                        name: name.clone(),
                        stash: *stash,
                    },
                );
                ctx.run_to_completion(request).await?;
                Ok(())
            }
            BranchCommand::Delete {
                repo,
                name,
                force,
                remote,
            } => {
                let repository = ctx.repo(repo)?;

                // The current branch is never offered for deletion
                let deletable = ctx.orchestrator.deletable_branches(&repository)?;
                if !deletable.contains(name) {
                    anyhow::bail!(
                        "branch '{}' cannot be deleted (not found, or it is the current branch)",
                        name
                    );
                }

                let request = OperationRequest::new(
                    repository,
                    OperationAction::DeleteBranch {
                        name: name.clone(),
                        force: *force,
                        remote: *remote,
                    },
                );
                ctx.run_to_completion(request).await?;
                Ok(())
            }
            BranchCommand::List { repo } => {
                let repository = ctx.repo(repo)?;
                let backend = ctx.orchestrator.backend();
                let current = backend.current_branch(&repository.local_path)?;
                for branch in backend.list_branches(&repository.local_path)? {
                    let marker = if branch == current { "*" } else { " " };
                    println!("{} {}", marker, branch);
                }
                Ok(())
            }
        }
    }
}
