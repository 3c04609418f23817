//! gitdeck - manage local working copies through high-level operations
//!
//! Clone, commit, branch, merge, push, tag, and resolve conflicts without
//! touching raw git; every operation runs through the orchestrator so the
//! same repository is never worked on twice at once.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use gitdeck_core::Config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{
    AppContext, BranchArgs, CloneArgs, CommitArgs, HistoryArgs, MergeArgs, PullArgs, PushArgs,
    RepoArgs, ResolveArgs, StatusArgs, TagArgs,
};

/// gitdeck: repository management without the command line
#[derive(Parser, Debug)]
#[command(name = "gitdeck")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the git executable (overrides config and env)
    #[arg(long, global = true, env = "GITDECK_GIT_PATH")]
    git_path: Option<String>,

    /// Path to the repository registry file (overrides config)
    #[arg(long, global = true, env = "GITDECK_REGISTRY")]
    registry: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage the repository registry
    Repo(RepoArgs),

    /// Clone a registered repository's remote into a new working copy
    Clone(CloneArgs),

    /// Stage files and create a commit
    #[command(visible_alias = "ci")]
    Commit(CommitArgs),

    /// Create, switch, delete, or list branches
    #[command(visible_alias = "br")]
    Branch(BranchArgs),

    /// Merge a branch into the current one
    Merge(MergeArgs),

    /// Fetch and merge from the default remote
    Pull(PullArgs),

    /// Push the current branch to the default remote
    Push(PushArgs),

    /// Create a tag, optionally pushing it
    Tag(TagArgs),

    /// Resolve merge conflicts file by file
    Resolve(ResolveArgs),

    /// Show the working copy status
    Status(StatusArgs),

    /// Show commit history
    History(HistoryArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config = Config::load_with_overrides(cli.git_path.clone(), cli.registry.clone())?;

    if cli.verbose {
        tracing::info!(
            git_path = %config.git.git_path,
            remote = %config.git.remote_name,
            "Configuration loaded"
        );
    }

    let mut ctx = AppContext::new(config)?;

    match cli.command {
        Commands::Repo(args) => args.execute(&mut ctx)?,
        Commands::Clone(args) => args.execute(&mut ctx).await?,
        Commands::Commit(args) => args.execute(&mut ctx).await?,
        Commands::Branch(args) => args.execute(&mut ctx).await?,
        Commands::Merge(args) => args.execute(&mut ctx).await?,
        Commands::Pull(args) => args.execute(&mut ctx).await?,
        Commands::Push(args) => args.execute(&mut ctx).await?,
        Commands::Tag(args) => args.execute(&mut ctx).await?,
        Commands::Resolve(args) => args.execute(&mut ctx).await?,
        Commands::Status(args) => args.execute(&ctx)?,
        Commands::History(args) => args.execute(&ctx)?,
    }

    Ok(())
}
