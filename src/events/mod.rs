// src/events/mod.rs

//! Build lifecycle notifications.
//!
//! The executor and watcher publish [`BuildEvent`]s on an [`EventSink`];
//! consumers (console output, desktop notifiers, live-reload servers)
//! subscribe and receive every event published after they subscribed.

pub mod console;

use tokio::sync::broadcast;
use tracing::trace;

use crate::types::{TaskName, TaskStatus};

/// Default capacity of the broadcast channel. Slow subscribers that fall
/// further behind than this lose the oldest events.
pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildEvent {
    /// An atomic action is about to run (or be skipped).
    TaskStarted { task: TaskName },
    /// An atomic action reached its final status.
    TaskFinished {
        task: TaskName,
        status: TaskStatus,
        duration_ms: u64,
        /// Failure detail, present only when `status` is `Failed`.
        error: Option<String>,
    },
    /// A whole run (one submitted request) finished.
    RunFinished {
        targets: Vec<TaskName>,
        succeeded: bool,
        duration_ms: u64,
    },
    /// A live-reload watch rule fired for these relative paths.
    Reload { paths: Vec<String> },
}

/// Publishing side of the notification stream. Cheap to clone.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: broadcast::Sender<BuildEvent>,
}

impl EventSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BuildEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn emit(&self, event: BuildEvent) {
        if self.tx.send(event).is_err() {
            trace!("no event subscribers; dropping build event");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
