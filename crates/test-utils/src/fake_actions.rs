use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use buildwatch::exec::{Action, ActionContext, ActionFuture, ActionOutput};
use buildwatch::registry::{AtomicTask, TaskDefinition};

/// Shared record of fake action invocations.
#[derive(Debug, Default)]
pub struct ActionLog {
    calls: Mutex<Vec<(String, Vec<PathBuf>)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ActionLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Task names in invocation order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Inputs handed to the most recent invocation of `task`.
    pub fn inputs_of(&self, task: &str) -> Option<Vec<PathBuf>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(name, _)| name == task)
            .map(|(_, inputs)| inputs.clone())
    }

    /// Highest number of fake actions observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn enter(&self, ctx: &ActionContext) {
        self.calls
            .lock()
            .unwrap()
            .push((ctx.task.clone(), ctx.inputs.clone()));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy)]
enum Behaviour {
    Succeed,
    Fail,
    Error,
}

/// Configurable fake action: records the call, optionally sleeps, then
/// succeeds, reports failure, or returns an error.
#[derive(Debug, Clone)]
pub struct FakeAction {
    log: Arc<ActionLog>,
    delay: Option<Duration>,
    behaviour: Behaviour,
}

impl FakeAction {
    pub fn succeeding(log: &Arc<ActionLog>) -> Self {
        Self {
            log: Arc::clone(log),
            delay: None,
            behaviour: Behaviour::Succeed,
        }
    }

    /// Runs to completion but reports `success = false`.
    pub fn failing(log: &Arc<ActionLog>) -> Self {
        Self {
            behaviour: Behaviour::Fail,
            ..Self::succeeding(log)
        }
    }

    /// Cannot run at all (`Err` from `Action::run`).
    pub fn erroring(log: &Arc<ActionLog>) -> Self {
        Self {
            behaviour: Behaviour::Error,
            ..Self::succeeding(log)
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Wrap into an atomic task named `name`.
    pub fn task(self, name: &str) -> AtomicTask {
        AtomicTask::new(name, Arc::new(self))
    }

    pub fn definition(self, name: &str) -> TaskDefinition {
        TaskDefinition::atomic(self.task(name))
    }
}

impl Action for FakeAction {
    fn kind(&self) -> &str {
        "fake"
    }

    fn run<'a>(&'a self, ctx: &'a ActionContext) -> ActionFuture<'a> {
        Box::pin(async move {
            self.log.enter(ctx);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.log.leave();

            match self.behaviour {
                Behaviour::Succeed => Ok(ActionOutput::ok()),
                Behaviour::Fail => Ok(ActionOutput::failed(format!("{} failed", ctx.task))),
                Behaviour::Error => Err(anyhow!("{} could not start", ctx.task)),
            }
        })
    }
}
