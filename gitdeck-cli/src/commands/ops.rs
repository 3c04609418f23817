//! Operation commands: clone, commit, merge, pull, push, tag

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use gitdeck_core::orchestrator::OperationOutcome;
use gitdeck_core::{OperationAction, OperationRequest, VcsBackend};

use super::AppContext;

/// Clone a registered repository's remote into a new working copy
#[derive(Args, Debug)]
pub struct CloneArgs {
    /// Registered repository to clone
    pub name: String,

    /// Target directory (defaults to ./<name>_clone)
    #[arg(short, long)]
    pub target: Option<PathBuf>,

    /// Branch to check out (defaults to the repository's default branch;
    /// falls back to the upstream default if it does not exist)
    #[arg(short, long)]
    pub branch: Option<String>,
}

impl CloneArgs {
    pub async fn execute(&self, ctx: &mut AppContext) -> anyhow::Result<()> {
        let source = ctx.repo(&self.name)?;

        let clone_name = format!("{}_clone", source.name);
        let target_dir = match &self.target {
            Some(target) => target.clone(),
            None => std::env::current_dir()
                .context("could not determine the current directory")?
                .join(&clone_name),
        };
        let branch = self
            .branch
            .clone()
            .unwrap_or_else(|| source.default_branch.clone());

        // The request repository names the new entry but carries the
        // source's remote URL
        let mut repository = source.clone();
        repository.name = clone_name;

        let request = OperationRequest::new(
            repository,
            OperationAction::Clone { target_dir, branch },
        );
        request.action.validate().map_err(anyhow::Error::msg)?;

        let handle = ctx.run_to_completion(request).await?;
        if let Some(OperationOutcome::Cloned(cloned)) = handle.outcome() {
            let name = cloned.name.clone();
            ctx.registry.add(cloned)?;
            println!("Registered repository '{}'", name);
        }
        Ok(())
    }
}

/// Stage files and create a commit
#[derive(Args, Debug)]
pub struct CommitArgs {
    /// Registered repository to commit in
    pub name: String,

    /// Commit message
    #[arg(short, long)]
    pub message: String,

    /// Files to commit (defaults to every changed file)
    pub files: Vec<PathBuf>,
}

impl CommitArgs {
    pub async fn execute(&self, ctx: &mut AppContext) -> anyhow::Result<()> {
        let repository = ctx.repo(&self.name)?;

        let files = if self.files.is_empty() {
            ctx.orchestrator
                .backend()
                .status(&repository.local_path)?
                .into_iter()
                .map(|entry| entry.path)
                .collect()
        } else {
            self.files.clone()
        };

        let request = OperationRequest::new(
            repository,
            OperationAction::Commit {
                files,
                message: self.message.clone(),
            },
        );
        request.action.validate().map_err(anyhow::Error::msg)?;

        ctx.run_to_completion(request).await?;
        Ok(())
    }
}

/// Merge a branch into the current one
#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Registered repository to merge in
    pub name: String,

    /// Branch to merge into the current branch
    pub branch: String,
}

impl MergeArgs {
    pub async fn execute(&self, ctx: &mut AppContext) -> anyhow::Result<()> {
        let repository = ctx.repo(&self.name)?;
        let request = OperationRequest::new(
            repository,
            OperationAction::Merge {
                branch: self.branch.clone(),
            },
        );
        ctx.run_to_completion(request).await?;
        Ok(())
    }
}

/// Fetch and merge from the default remote
#[derive(Args, Debug)]
pub struct PullArgs {
    /// Registered repository to pull into
    pub name: String,
}

impl PullArgs {
    pub async fn execute(&self, ctx: &mut AppContext) -> anyhow::Result<()> {
        let repository = ctx.repo(&self.name)?;
        let request = OperationRequest::new(repository, OperationAction::Pull);
        ctx.run_to_completion(request).await?;
        Ok(())
    }
}

/// Push the current branch to the default remote
#[derive(Args, Debug)]
pub struct PushArgs {
    /// Registered repository to push from
    pub name: String,
}

impl PushArgs {
    pub async fn execute(&self, ctx: &mut AppContext) -> anyhow::Result<()> {
        let repository = ctx.repo(&self.name)?;
        let request = OperationRequest::new(repository, OperationAction::Push);
        ctx.run_to_completion(request).await?;
        Ok(())
    }
}

/// Create a tag, optionally pushing it
#[derive(Args, Debug)]
pub struct TagArgs {
    /// Registered repository to tag
    pub name: String,

    /// Tag name
    pub tag: String,

    /// Tag message; creates an annotated tag
    #[arg(short, long)]
    pub message: Option<String>,

    /// Commit to tag (defaults to HEAD)
    #[arg(long)]
    pub target: Option<String>,

    /// Push the tag to the default remote after creating it
    #[arg(long)]
    pub push: bool,
}

impl TagArgs {
    pub async fn execute(&self, ctx: &mut AppContext) -> anyhow::Result<()> {
        let repository = ctx.repo(&self.name)?;
        let request = OperationRequest::new(
            repository,
            OperationAction::Tag {
                name: self.tag.clone(),
                message: self.message.clone(),
                target: self.target.clone(),
                push: self.push,
            },
        );
        ctx.run_to_completion(request).await?;
        Ok(())
    }
}
