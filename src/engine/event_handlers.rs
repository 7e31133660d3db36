// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use tracing::{debug, info, warn};

use crate::engine::queue::{RunQueue, SubmitDecision};
use crate::engine::{RunKey, RunRequest, RuntimeOptions, RuntimeSummary};

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    /// Resolve and execute this request.
    Dispatch(RunRequest),
    /// The process should exit (one-shot run done, or shutdown complete).
    RequestExit,
}

/// Decision returned by the core after handling a single `RuntimeEvent`.
#[derive(Debug, Clone)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    fn continue_with(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }

    fn exit() -> Self {
        Self {
            commands: vec![CoreCommand::RequestExit],
            keep_running: false,
        }
    }
}

/// Handle a submission from the CLI or the watcher.
pub fn handle_submit(
    queue: &mut RunQueue,
    shutting_down: bool,
    request: RunRequest,
) -> CoreStep {
    if shutting_down {
        debug!(targets = ?request.targets, "ignoring submission during shutdown");
        return CoreStep::continue_with(Vec::new());
    }

    match queue.submit(&request) {
        SubmitDecision::Dispatch => CoreStep::continue_with(vec![CoreCommand::Dispatch(request)]),
        SubmitDecision::Queued | SubmitDecision::Coalesced => CoreStep::continue_with(Vec::new()),
    }
}

/// Handle the end of a run: start its pending re-run, or exit if that was
/// the last thing to wait for.
pub fn handle_run_finished(
    queue: &mut RunQueue,
    summary: &mut RuntimeSummary,
    options: &RuntimeOptions,
    shutting_down: bool,
    key: RunKey,
    succeeded: bool,
) -> CoreStep {
    if succeeded {
        summary.runs_succeeded += 1;
    } else {
        summary.runs_failed += 1;
        warn!(targets = ?key, "run failed");
    }

    let mut commands = Vec::new();
    for next in queue.finish(&key) {
        info!(targets = ?next.targets, "starting pending re-run");
        commands.push(CoreCommand::Dispatch(next));
    }

    let idle = queue.is_idle();
    if idle && (options.exit_when_idle || shutting_down) {
        return CoreStep::exit();
    }

    CoreStep::continue_with(commands)
}

/// Handle a shutdown request: drop pending re-runs and wait for whatever
/// is still in flight.
pub fn handle_shutdown(queue: &mut RunQueue, summary: &mut RuntimeSummary) -> CoreStep {
    let dropped = queue.clear_pending();
    summary.runs_dropped += dropped;
    info!(
        dropped,
        in_flight = queue.running_len(),
        "shutdown requested"
    );

    if queue.is_idle() {
        CoreStep::exit()
    } else {
        CoreStep::continue_with(Vec::new())
    }
}
