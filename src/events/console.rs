// src/events/console.rs

//! Console subscriber: one line per finished task plus a timing summary
//! at the end of every run.

use std::io::Write;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::events::BuildEvent;
use crate::types::{TaskName, TaskStatus};

/// Formats build events for humans. Kept separate from the subscription
/// loop so the formatting can be tested against a buffer.
#[derive(Debug, Default)]
pub struct ConsoleReporter {
    /// `(task, status, duration_ms)` for the run currently in progress.
    timings: Vec<(TaskName, TaskStatus, u64)>,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&mut self, event: &BuildEvent, out: &mut impl Write) -> std::io::Result<()> {
        match event {
            BuildEvent::TaskStarted { .. } => {}
            BuildEvent::TaskFinished {
                task,
                status,
                duration_ms,
                error,
            } => {
                self.timings.push((task.clone(), *status, *duration_ms));
                match (status, error) {
                    (TaskStatus::Failed, Some(err)) => {
                        writeln!(out, "[buildwatch] FAIL {task} ({duration_ms} ms): {err}")?
                    }
                    _ => writeln!(out, "[buildwatch] {status:>9} {task} ({duration_ms} ms)")?,
                }
            }
            BuildEvent::RunFinished {
                targets,
                succeeded,
                duration_ms,
            } => {
                self.write_summary(out, targets, *succeeded, *duration_ms)?;
                self.timings.clear();
            }
            BuildEvent::Reload { paths } => {
                writeln!(out, "[buildwatch] reload: {}", paths.join(", "))?;
            }
        }
        Ok(())
    }

    fn write_summary(
        &self,
        out: &mut impl Write,
        targets: &[TaskName],
        succeeded: bool,
        duration_ms: u64,
    ) -> std::io::Result<()> {
        let verdict = if succeeded { "done" } else { "FAILED" };
        writeln!(
            out,
            "[buildwatch] {} {} in {} ms",
            targets.join(" + "),
            verdict,
            duration_ms
        )?;

        let width = self
            .timings
            .iter()
            .map(|(name, _, _)| name.len())
            .max()
            .unwrap_or(0);
        for (name, status, ms) in self.timings.iter() {
            writeln!(out, "    {name:<width$}  {ms:>7} ms  {status}")?;
        }
        Ok(())
    }
}

/// Spawn a task that prints every event from `rx` to stdout until the sink
/// is dropped.
pub fn spawn_console_reporter(mut rx: broadcast::Receiver<BuildEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut reporter = ConsoleReporter::new();
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let stdout = std::io::stdout();
                    let mut lock = stdout.lock();
                    if let Err(err) = reporter.handle(&event, &mut lock) {
                        warn!(error = %err, "failed to write to stdout");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "console reporter fell behind; events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
