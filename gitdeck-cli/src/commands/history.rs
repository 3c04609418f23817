//! Read-only views: status and commit history

use clap::Args;
use gitdeck_core::{LogFilter, VcsBackend};

use super::AppContext;

/// Show the working copy status
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Registered repository
    pub name: String,
}

impl StatusArgs {
    pub fn execute(&self, ctx: &AppContext) -> anyhow::Result<()> {
        let repository = ctx.repo(&self.name)?;
        let backend = ctx.orchestrator.backend();

        let branch = backend.current_branch(&repository.local_path)?;
        println!("On branch {}", branch);

        let entries = backend.status(&repository.local_path)?;
        if entries.is_empty() {
            println!("Working copy clean");
            return Ok(());
        }
        for entry in entries {
            println!("{:<10} {}", entry.state.to_string(), entry.path.display());
        }
        Ok(())
    }
}

/// Show commit history
#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Registered repository
    pub name: String,

    /// Only commits whose author contains this string
    #[arg(long)]
    pub author: Option<String>,

    /// Only commits whose message contains this string
    #[arg(long = "grep")]
    pub message: Option<String>,

    /// Maximum number of commits to show
    #[arg(short, long, default_value_t = 30)]
    pub limit: usize,
}

impl HistoryArgs {
    pub fn execute(&self, ctx: &AppContext) -> anyhow::Result<()> {
        let repository = ctx.repo(&self.name)?;
        let filter = LogFilter {
            author: self.author.clone(),
            message: self.message.clone(),
            limit: self.limit,
        };

        let commits = ctx
            .orchestrator
            .backend()
            .log(&repository.local_path, &filter)?;
        if commits.is_empty() {
            println!("No matching commits");
            return Ok(());
        }

        for commit in commits {
            let short_id: String = commit.id.chars().take(8).collect();
            println!(
                "{}  {}  {}  {}",
                short_id,
                commit.time.format("%Y-%m-%d %H:%M"),
                commit.author,
                commit.summary
            );
        }
        Ok(())
    }
}
