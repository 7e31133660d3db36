// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::errors::Result;
use crate::exec::RunBackend;

use super::core::CoreRuntime;
use super::{CoreCommand, RunRequest, RuntimeEvent, RuntimeSummary};

/// Async IO shell around [`CoreRuntime`]: reads `RuntimeEvent`s from the
/// channel and carries out the commands the core returns through a
/// [`RunBackend`].
pub struct Runtime<B: RunBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    backend: B,
}

impl<B: RunBackend> fmt::Debug for Runtime<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<B: RunBackend> Runtime<B> {
    pub fn new(core: CoreRuntime, event_rx: mpsc::Receiver<RuntimeEvent>, backend: B) -> Self {
        Self {
            core,
            event_rx,
            backend,
        }
    }

    /// Main event loop. Returns once the core asks to exit or the channel
    /// closes; in-flight runs are awaited before returning.
    pub async fn run(mut self) -> Result<RuntimeSummary> {
        info!("buildwatch runtime started");

        loop {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    info!("runtime event channel closed; exiting");
                    break;
                }
            };

            debug!(?event, "runtime received event");

            let step = self.core.step(event);

            for command in step.commands {
                self.execute_command(command).await?;
            }

            if !step.keep_running {
                info!("core requested exit; stopping runtime");
                break;
            }
        }

        self.backend.drain().await;

        let summary = self.core.summary();
        info!(
            succeeded = summary.runs_succeeded,
            failed = summary.runs_failed,
            dropped = summary.runs_dropped,
            "runtime exiting"
        );
        Ok(summary)
    }

    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::Dispatch(request) => self.dispatch(request).await?,
            CoreCommand::RequestExit => {
                // keep_running is already false alongside this command.
                debug!("core issued RequestExit command");
            }
        }
        Ok(())
    }

    async fn dispatch(&mut self, request: RunRequest) -> Result<()> {
        debug!(targets = ?request.targets, reason = ?request.reason, "dispatching run");
        self.backend.dispatch(request).await
    }
}
