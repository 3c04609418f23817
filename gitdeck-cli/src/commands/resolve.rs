//! Merge conflict resolution command

use std::path::PathBuf;

use clap::Args;
use gitdeck_core::conflicts::{ConflictBegin, Resolution};
use gitdeck_core::ResolveSide;

use super::AppContext;

/// Resolve merge conflicts file by file
#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Registered repository
    pub name: String,

    /// Keep our version of a file (repeatable)
    #[arg(long = "ours", value_name = "FILE")]
    pub ours: Vec<PathBuf>,

    /// Keep their version of a file (repeatable)
    #[arg(long = "theirs", value_name = "FILE")]
    pub theirs: Vec<PathBuf>,

    /// Commit the merge once everything is resolved
    #[arg(long)]
    pub finalize: bool,

    /// Commit message used when finalizing
    #[arg(short, long, default_value = "Merge conflicts resolved")]
    pub message: String,

    /// Abort the merge, discarding all resolutions
    #[arg(long, conflicts_with_all = ["finalize", "ours", "theirs"])]
    pub abort: bool,
}

impl ResolveArgs {
    pub async fn execute(&self, ctx: &mut AppContext) -> anyhow::Result<()> {
        let repository = ctx.repo(&self.name)?;

        let begin = ctx
            .orchestrator
            .begin_conflict_resolution(&repository)
            .map_err(anyhow::Error::new)?;
        ctx.pump_events();

        let mut session = match begin {
            ConflictBegin::Clean(_) => return Ok(()),
            ConflictBegin::Failed(handle) => {
                anyhow::bail!("{} {}", handle.kind(), handle.state())
            }
            ConflictBegin::Session(session) => session,
        };

        if self.abort {
            session.abort().await?;
            ctx.pump_events();
            return Ok(());
        }

        for file in &self.ours {
            session.resolve(file, ResolveSide::Ours).await?;
            ctx.pump_events();
        }
        for file in &self.theirs {
            session.resolve(file, ResolveSide::Theirs).await?;
            ctx.pump_events();
        }

        if self.finalize {
            let finished = session.finalize(&self.message).await?;
            ctx.pump_events();
            if !finished {
                print_remaining(session.entries());
                anyhow::bail!("unresolved conflicts remain; the merge was not finalized");
            }
            return Ok(());
        }

        // No terminal action requested: show where things stand and leave
        // the merge in progress
        print_remaining(session.entries());
        drop(session);
        ctx.pump_events();
        Ok(())
    }
}

fn print_remaining(entries: &[gitdeck_core::ConflictEntry]) {
    for entry in entries {
        let state = match entry.resolution {
            Resolution::Unresolved => "unresolved",
            Resolution::Ours => "ours",
            Resolution::Theirs => "theirs",
        };
        println!("{:<10} {}", state, entry.path.display());
    }
}
