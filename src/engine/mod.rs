// src/engine/mod.rs

//! Submission engine.
//!
//! Every run, whether requested on the command line or by the file watcher,
//! enters through one mpsc channel as a [`RuntimeEvent::Submit`]. The pure
//! state machine in [`core`] decides what to dispatch; the async shell in
//! [`runtime`] reads the channel and hands dispatched runs to a
//! [`RunBackend`](crate::exec::RunBackend).

use crate::types::{TaskName, TriggerReason};

/// Identity of a run: its ordered list of targets. Exclusivity is per task
/// name: runs whose targets share a name never overlap (see
/// [`RunQueue`](queue::RunQueue)).
pub type RunKey = Vec<TaskName>;

/// A request to resolve and execute `targets`, in order, as one plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub targets: Vec<TaskName>,
    pub reason: TriggerReason,
}

impl RunRequest {
    pub fn new<I, S>(targets: I, reason: TriggerReason) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskName>,
    {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
            reason,
        }
    }

    pub fn manual<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskName>,
    {
        Self::new(targets, TriggerReason::Manual)
    }

    pub fn key(&self) -> RunKey {
        self.targets.clone()
    }
}

/// Runtime options used by both the core and the async shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeOptions {
    /// Exit once nothing is running or pending (one-shot mode).
    pub exit_when_idle: bool,
}

/// Events flowing into the runtime from the CLI, the watcher and finished
/// runs.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    Submit(RunRequest),
    RunFinished { key: RunKey, succeeded: bool },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

/// Counts reported when the runtime stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeSummary {
    pub runs_succeeded: usize,
    pub runs_failed: usize,
    /// Pending runs dropped at shutdown.
    pub runs_dropped: usize,
}

impl RuntimeSummary {
    pub fn all_succeeded(&self) -> bool {
        self.runs_failed == 0
    }
}

pub mod core;
pub mod event_handlers;
pub mod queue;
pub mod runtime;

pub use core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use queue::{RunQueue, SubmitDecision};
pub use runtime::Runtime;
