//! Operation lifecycle tracking
//!
//! An [`OperationHandle`] is created when a request is accepted and is the
//! single place an operation's state, progress, and log live. Only the
//! execution unit running the operation mutates it; everyone else reads.
//! The terminal transition happens exactly once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Local};
use tokio::sync::mpsc::UnboundedSender;

use crate::ops::OperationKind;
use crate::registry::RepositoryHandle;

/// Process-unique operation id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperationId(u64);

impl OperationId {
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for OperationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    Queued,
    Running,
    Succeeded,
    Failed,
    Aborted,
}

impl OperationState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OperationState::Succeeded | OperationState::Failed | OperationState::Aborted
        )
    }
}

impl std::fmt::Display for OperationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OperationState::Queued => "queued",
            OperationState::Running => "running",
            OperationState::Succeeded => "succeeded",
            OperationState::Failed => "failed",
            OperationState::Aborted => "aborted",
        };
        write!(f, "{}", s)
    }
}

/// Severity of a log event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Success,
}

/// One line of an operation's log. Append-only, never reordered.
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub timestamp: DateTime<Local>,
    pub severity: Severity,
    pub message: String,
}

impl LogEvent {
    fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            severity,
            message: message.into(),
        }
    }
}

/// Result payload of a finished operation, beyond its state
#[derive(Debug, Clone)]
pub enum OperationOutcome {
    /// A clone produced a registrable repository handle
    Cloned(RepositoryHandle),
}

#[derive(Debug)]
struct HandleInner {
    state: OperationState,
    progress: u8,
    events: Vec<LogEvent>,
    outcome: Option<OperationOutcome>,
}

/// Tracked lifecycle of one submitted request
#[derive(Debug)]
pub struct OperationHandle {
    id: OperationId,
    repository_name: String,
    kind: OperationKind,
    inner: Mutex<HandleInner>,
}

impl OperationHandle {
    pub(crate) fn new(repository_name: impl Into<String>, kind: OperationKind) -> Arc<Self> {
        Arc::new(Self {
            id: OperationId::next(),
            repository_name: repository_name.into(),
            kind,
            inner: Mutex::new(HandleInner {
                state: OperationState::Queued,
                progress: 0,
                events: Vec::new(),
                outcome: None,
            }),
        })
    }

    pub fn id(&self) -> OperationId {
        self.id
    }

    pub fn repository_name(&self) -> &str {
        &self.repository_name
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn state(&self) -> OperationState {
        self.lock().state
    }

    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    pub fn progress(&self) -> u8 {
        self.lock().progress
    }

    /// Snapshot of the log so far
    pub fn events(&self) -> Vec<LogEvent> {
        self.lock().events.clone()
    }

    pub fn outcome(&self) -> Option<OperationOutcome> {
        self.lock().outcome.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HandleInner> {
        // A poisoned handle mutex means an execution unit panicked while
        // holding it; the data is still the best record available.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Move to a new state. Returns false (and does nothing) if the handle
    /// already reached a terminal state.
    pub(crate) fn transition(&self, to: OperationState) -> bool {
        let mut inner = self.lock();
        if inner.state.is_terminal() {
            return false;
        }
        inner.state = to;
        true
    }

    pub(crate) fn set_progress(&self, percent: u8) {
        self.lock().progress = percent.min(100);
    }

    pub(crate) fn push_event(&self, event: LogEvent) {
        self.lock().events.push(event);
    }

    pub(crate) fn set_outcome(&self, outcome: OperationOutcome) {
        self.lock().outcome = Some(outcome);
    }
}

/// What a notification says about its operation
#[derive(Debug, Clone)]
pub enum NotificationPayload {
    Log(LogEvent),
    Progress(u8),
    Finished(OperationState),
}

/// One message on the orchestrator's single delivery channel.
///
/// All execution units share one channel, so a single consumer sees every
/// operation's notifications; within one operation, emission order is
/// preserved.
#[derive(Debug, Clone)]
pub struct Notification {
    pub operation: Arc<OperationHandle>,
    pub payload: NotificationPayload,
}

/// Crate-internal writer side of an operation: appends to the handle and
/// mirrors every event onto the notification channel.
#[derive(Clone)]
pub(crate) struct Reporter {
    handle: Arc<OperationHandle>,
    tx: UnboundedSender<Notification>,
}

impl Reporter {
    pub(crate) fn new(handle: Arc<OperationHandle>, tx: UnboundedSender<Notification>) -> Self {
        Self { handle, tx }
    }

    pub(crate) fn handle(&self) -> &Arc<OperationHandle> {
        &self.handle
    }

    fn notify(&self, payload: NotificationPayload) {
        // The consumer may be gone; the handle still records everything
        let _ = self.tx.send(Notification {
            operation: Arc::clone(&self.handle),
            payload,
        });
    }

    fn log(&self, severity: Severity, message: impl Into<String>) {
        let event = LogEvent::new(severity, message);
        self.handle.push_event(event.clone());
        self.notify(NotificationPayload::Log(event));
    }

    pub(crate) fn info(&self, message: impl Into<String>) {
        self.log(Severity::Info, message);
    }

    pub(crate) fn warning(&self, message: impl Into<String>) {
        self.log(Severity::Warning, message);
    }

    pub(crate) fn error(&self, message: impl Into<String>) {
        self.log(Severity::Error, message);
    }

    pub(crate) fn success(&self, message: impl Into<String>) {
        self.log(Severity::Success, message);
    }

    pub(crate) fn progress(&self, percent: u8) {
        self.handle.set_progress(percent);
        self.notify(NotificationPayload::Progress(percent));
    }

    /// Record the terminal state and announce it. No-op if some other path
    /// already finished the operation.
    pub(crate) fn finish(&self, state: OperationState) {
        if self.handle.transition(state) {
            self.notify(NotificationPayload::Finished(state));
        }
    }

    pub(crate) fn mark_running(&self) {
        self.handle.transition(OperationState::Running);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_transition_happens_once() {
        let handle = OperationHandle::new("demo", OperationKind::Commit);
        assert_eq!(handle.state(), OperationState::Queued);

        assert!(handle.transition(OperationState::Running));
        assert!(handle.transition(OperationState::Succeeded));
        assert!(!handle.transition(OperationState::Failed));
        assert_eq!(handle.state(), OperationState::Succeeded);
    }

    #[test]
    fn test_events_keep_emission_order() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let handle = OperationHandle::new("demo", OperationKind::Push);
        let reporter = Reporter::new(Arc::clone(&handle), tx);

        reporter.info("first");
        reporter.warning("second");
        reporter.error("third");

        let events = handle.events();
        let messages: Vec<_> = events.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second", "third"]);

        for expected in ["first", "second", "third"] {
            match rx.try_recv().unwrap().payload {
                NotificationPayload::Log(event) => assert_eq!(event.message, expected),
                other => panic!("unexpected payload: {:?}", other),
            }
        }
    }

    #[test]
    fn test_progress_is_clamped() {
        let handle = OperationHandle::new("demo", OperationKind::Pull);
        handle.set_progress(250);
        assert_eq!(handle.progress(), 100);
    }

    #[test]
    fn test_finish_notifies_once() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let handle = OperationHandle::new("demo", OperationKind::Merge);
        let reporter = Reporter::new(Arc::clone(&handle), tx);

        reporter.finish(OperationState::Failed);
        reporter.finish(OperationState::Succeeded);

        assert!(matches!(
            rx.try_recv().unwrap().payload,
            NotificationPayload::Finished(OperationState::Failed)
        ));
        assert!(rx.try_recv().is_err());
    }
}
