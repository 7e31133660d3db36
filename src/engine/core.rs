// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! Consumes [`RuntimeEvent`]s and produces the commands the IO shell
//! (`engine::runtime::Runtime`) should carry out. No channels, no Tokio, no
//! processes: everything here is unit-testable synchronously.

use crate::engine::event_handlers::{
    CoreStep, handle_run_finished, handle_shutdown, handle_submit,
};
use crate::engine::queue::RunQueue;
use crate::engine::{RuntimeEvent, RuntimeOptions, RuntimeSummary};

#[derive(Debug, Default)]
pub struct CoreRuntime {
    queue: RunQueue,
    options: RuntimeOptions,
    summary: RuntimeSummary,
    shutting_down: bool,
}

impl CoreRuntime {
    pub fn new(options: RuntimeOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_idle()
    }

    pub fn queue(&self) -> &RunQueue {
        &self.queue
    }

    pub fn summary(&self) -> RuntimeSummary {
        self.summary
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::Submit(request) => {
                handle_submit(&mut self.queue, self.shutting_down, request)
            }
            RuntimeEvent::RunFinished { key, succeeded } => handle_run_finished(
                &mut self.queue,
                &mut self.summary,
                &self.options,
                self.shutting_down,
                key,
                succeeded,
            ),
            RuntimeEvent::ShutdownRequested => {
                self.shutting_down = true;
                handle_shutdown(&mut self.queue, &mut self.summary)
            }
        }
    }
}
