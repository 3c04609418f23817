//! CLI command implementations

pub mod branch;
pub mod history;
pub mod ops;
pub mod repo;
pub mod resolve;

pub use branch::BranchArgs;
pub use history::{HistoryArgs, StatusArgs};
pub use ops::{CloneArgs, CommitArgs, MergeArgs, PullArgs, PushArgs, TagArgs};
pub use repo::RepoArgs;
pub use resolve::ResolveArgs;

use std::sync::Arc;

use anyhow::Context;
use gitdeck_core::orchestrator::{
    Notification, NotificationPayload, OperationHandle, OperationState,
};
use gitdeck_core::{
    Config, GitBackend, LogEvent, Orchestrator, Registry, RepositoryHandle, Severity,
};
use tokio::sync::mpsc::UnboundedReceiver;

/// Everything a command needs: the registry, the orchestrator, and the
/// notification channel's single consumer.
pub struct AppContext {
    pub registry: Registry,
    pub orchestrator: Orchestrator,
    notifications: UnboundedReceiver<Notification>,
}

impl AppContext {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let registry_path = config
            .registry_path()
            .context("could not determine a registry location")?;
        let registry = Registry::load(registry_path)?;

        let backend = Arc::new(GitBackend::new().with_git_path(config.git.git_path.clone()));
        let (orchestrator, notifications) = Orchestrator::new(backend);
        let orchestrator = orchestrator.with_preferred_remote(config.git.remote_name.clone());

        Ok(Self {
            registry,
            orchestrator,
            notifications,
        })
    }

    /// Look up a registered repository by name
    pub fn repo(&self, name: &str) -> anyhow::Result<RepositoryHandle> {
        self.registry
            .find_by_name(name)
            .cloned()
            .with_context(|| format!("no repository named '{}' is registered", name))
    }

    /// Print an operation's notifications until it reaches a terminal state
    pub async fn drive(&mut self, handle: &Arc<OperationHandle>) -> anyhow::Result<OperationState> {
        loop {
            let notification = self
                .notifications
                .recv()
                .await
                .context("notification channel closed")?;
            if notification.operation.id() != handle.id() {
                continue;
            }
            match notification.payload {
                NotificationPayload::Log(event) => print_event(&event),
                NotificationPayload::Progress(_) => {}
                NotificationPayload::Finished(state) => return Ok(state),
            }
        }
    }

    /// Submit a request and wait for it to finish, failing on any terminal
    /// state other than success.
    pub async fn run_to_completion(
        &mut self,
        request: gitdeck_core::OperationRequest,
    ) -> anyhow::Result<Arc<OperationHandle>> {
        let handle = self
            .orchestrator
            .submit(request)
            .map_err(anyhow::Error::new)?;
        let state = self.drive(&handle).await?;
        if state != OperationState::Succeeded {
            anyhow::bail!("{} {}", handle.kind(), state);
        }
        Ok(handle)
    }

    /// Print any notifications already queued, without waiting
    pub fn pump_events(&mut self) {
        while let Ok(notification) = self.notifications.try_recv() {
            if let NotificationPayload::Log(event) = notification.payload {
                print_event(&event);
            }
        }
    }
}

fn print_event(event: &LogEvent) {
    let tag = match event.severity {
        Severity::Info => "info",
        Severity::Warning => "warn",
        Severity::Error => "error",
        Severity::Success => "ok",
    };
    println!(
        "[{}] {:<5} {}",
        event.timestamp.format("%H:%M:%S"),
        tag,
        event.message
    );
}
