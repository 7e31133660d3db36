// src/exec/executor.rs

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::cache::{ChangeCache, Fingerprint};
use crate::config::Settings;
use crate::errors::BuildwatchError;
use crate::events::{BuildEvent, EventSink};
use crate::exec::action::{ActionContext, ActionOutput};
use crate::fs::FileSystem;
use crate::registry::{AtomicTask, ExecutionPlan, PlanGroup};
use crate::types::{TaskName, TaskStatus, TriggerReason};
use crate::watch::patterns::expand_inputs;

/// Default upper bound on a single action.
pub const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorSettings {
    /// Permits in the worker pool shared by every run.
    pub workers: usize,
    pub action_timeout: Duration,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            action_timeout: DEFAULT_ACTION_TIMEOUT,
        }
    }
}

impl ExecutorSettings {
    /// Combine `[config]` with a command-line override of the worker count.
    pub fn from_settings(settings: &Settings, workers_override: Option<usize>) -> Self {
        Self {
            workers: workers_override
                .or(settings.workers)
                .unwrap_or_else(default_workers)
                .max(1),
            action_timeout: settings.action_timeout,
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Why an action ended up `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeError {
    Failed(String),
    TimedOut(Duration),
}

impl fmt::Display for OutcomeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeError::Failed(detail) => f.write_str(detail),
            OutcomeError::TimedOut(after) => write!(f, "timed out after {after:?}"),
        }
    }
}

/// Result of one atomic action within a run.
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub task: TaskName,
    pub status: TaskStatus,
    pub duration_ms: u64,
    /// Present only when `status` is `Failed`.
    pub error: Option<OutcomeError>,
    pub diagnostics: Option<String>,
    /// Copied from the task's options; a failure with this unset doesn't
    /// stop the plan.
    pub fail_on_error: bool,
}

impl TaskOutcome {
    fn skipped(task: &AtomicTask) -> Self {
        Self {
            task: task.name.clone(),
            status: TaskStatus::Skipped,
            duration_ms: 0,
            error: None,
            diagnostics: None,
            fail_on_error: task.options.fail_on_error,
        }
    }

    pub fn error_detail(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }

    /// A failure that halts the rest of the plan.
    pub fn is_fatal(&self) -> bool {
        self.status == TaskStatus::Failed && self.fail_on_error
    }
}

/// All outcomes of one executed plan, in plan order.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub targets: Vec<TaskName>,
    pub outcomes: Vec<TaskOutcome>,
    pub duration_ms: u64,
}

impl RunReport {
    /// True unless some action failed with `fail_on_error` set.
    pub fn succeeded(&self) -> bool {
        self.first_failure().is_none()
    }

    pub fn first_failure(&self) -> Option<&TaskOutcome> {
        self.outcomes.iter().find(|o| o.is_fatal())
    }

    pub fn outcome(&self, task: &str) -> Option<&TaskOutcome> {
        self.outcomes.iter().find(|o| o.task == task)
    }

    pub fn statuses(&self) -> Vec<(&str, TaskStatus)> {
        self.outcomes
            .iter()
            .map(|o| (o.task.as_str(), o.status))
            .collect()
    }

    /// Map the first fatal failure onto the crate error type.
    pub fn into_result(self) -> crate::errors::Result<Self> {
        let err = self.first_failure().map(|outcome| match &outcome.error {
            Some(OutcomeError::TimedOut(after)) => BuildwatchError::Timeout {
                task: outcome.task.clone(),
                after: *after,
            },
            Some(OutcomeError::Failed(detail)) => BuildwatchError::ActionFailure {
                task: outcome.task.clone(),
                detail: detail.clone(),
            },
            None => BuildwatchError::ActionFailure {
                task: outcome.task.clone(),
                detail: "unknown failure".to_string(),
            },
        });

        match err {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

/// What happened when an action was attempted.
enum Attempt {
    Ran(ActionOutput),
    Unchanged,
    Failed {
        error: OutcomeError,
        diagnostics: Option<String>,
    },
}

/// Runs execution plans.
///
/// Cheap to clone; clones share the worker pool, the change cache and the
/// event sink, so concurrent runs for different keys are bounded together.
#[derive(Debug, Clone)]
pub struct Executor {
    root: Arc<Path>,
    fs: Arc<dyn FileSystem>,
    cache: Arc<ChangeCache>,
    sink: EventSink,
    pool: Arc<Semaphore>,
    action_timeout: Duration,
}

impl Executor {
    pub fn new(
        root: impl Into<PathBuf>,
        fs: Arc<dyn FileSystem>,
        cache: Arc<ChangeCache>,
        sink: EventSink,
        settings: ExecutorSettings,
    ) -> Self {
        let root: PathBuf = root.into();
        Self {
            root: Arc::from(root.as_path()),
            fs,
            cache,
            sink,
            pool: Arc::new(Semaphore::new(settings.workers.max(1))),
            action_timeout: settings.action_timeout,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn sink(&self) -> &EventSink {
        &self.sink
    }

    pub fn cache(&self) -> &Arc<ChangeCache> {
        &self.cache
    }

    /// Execute `plan` in order.
    ///
    /// Parallel groups run concurrently and complete when all members have
    /// completed. After a fatal failure the remaining actions are reported
    /// `Skipped`; every action gets exactly one started/finished pair of
    /// events either way.
    pub async fn run(&self, plan: &ExecutionPlan, reason: TriggerReason) -> RunReport {
        let started = Instant::now();
        info!(
            targets = ?plan.targets(),
            actions = plan.len(),
            reason = ?reason,
            "run started"
        );

        let mut outcomes: Vec<TaskOutcome> = Vec::with_capacity(plan.len());
        let mut halted = false;

        for group in plan.groups() {
            if halted {
                for task in group.tasks() {
                    self.sink.emit(BuildEvent::TaskStarted {
                        task: task.name.clone(),
                    });
                    outcomes.push(self.finish(TaskOutcome::skipped(task)));
                }
                continue;
            }

            let group_outcomes = match group {
                PlanGroup::Single(task) => vec![self.run_action(Arc::clone(task), reason).await],
                PlanGroup::Parallel(tasks) => self.run_parallel(tasks, reason).await,
            };

            if let Some(fatal) = group_outcomes.iter().find(|o| o.is_fatal()) {
                warn!(task = %fatal.task, "stopping plan after failed task");
                halted = true;
            }
            outcomes.extend(group_outcomes);
        }

        let report = RunReport {
            targets: plan.targets().to_vec(),
            outcomes,
            duration_ms: elapsed_ms(started),
        };

        info!(
            targets = ?report.targets,
            succeeded = report.succeeded(),
            duration_ms = report.duration_ms,
            "run finished"
        );

        self.sink.emit(BuildEvent::RunFinished {
            targets: report.targets.clone(),
            succeeded: report.succeeded(),
            duration_ms: report.duration_ms,
        });

        report
    }

    async fn run_parallel(
        &self,
        tasks: &[Arc<AtomicTask>],
        reason: TriggerReason,
    ) -> Vec<TaskOutcome> {
        debug!(size = tasks.len(), "running parallel group");

        let handles: Vec<_> = tasks
            .iter()
            .map(|task| {
                let exec = self.clone();
                let task = Arc::clone(task);
                tokio::spawn(async move { exec.run_action(task, reason).await })
            })
            .collect();

        let mut outcomes = Vec::with_capacity(tasks.len());
        for (task, handle) in tasks.iter().zip(handles) {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => {
                    error!(task = %task.name, error = %err, "action task aborted");
                    let outcome = TaskOutcome {
                        error: Some(OutcomeError::Failed(format!("action aborted: {err}"))),
                        status: TaskStatus::Failed,
                        ..TaskOutcome::skipped(task)
                    };
                    outcomes.push(self.finish(outcome));
                }
            }
        }
        outcomes
    }

    /// Run a single action (holding one worker permit) and publish its
    /// events.
    async fn run_action(&self, task: Arc<AtomicTask>, reason: TriggerReason) -> TaskOutcome {
        let _permit = match self.pool.acquire().await {
            Ok(permit) => Some(permit),
            Err(_) => {
                warn!(task = %task.name, "worker pool closed; running without a permit");
                None
            }
        };

        self.sink.emit(BuildEvent::TaskStarted {
            task: task.name.clone(),
        });
        let started = Instant::now();

        let attempt = self.attempt(&task, reason).await;
        let duration_ms = elapsed_ms(started);

        let outcome = match attempt {
            Attempt::Ran(output) => TaskOutcome {
                status: TaskStatus::Succeeded,
                duration_ms,
                diagnostics: output.diagnostics,
                ..TaskOutcome::skipped(&task)
            },
            Attempt::Unchanged => TaskOutcome {
                duration_ms,
                diagnostics: Some("inputs unchanged".to_string()),
                ..TaskOutcome::skipped(&task)
            },
            Attempt::Failed { error, diagnostics } => TaskOutcome {
                status: TaskStatus::Failed,
                duration_ms,
                error: Some(error),
                diagnostics,
                ..TaskOutcome::skipped(&task)
            },
        };

        self.finish(outcome)
    }

    async fn attempt(&self, task: &AtomicTask, reason: TriggerReason) -> Attempt {
        let inputs = match self.expand(task).await {
            Ok(inputs) => inputs,
            Err(err) => {
                return Attempt::Failed {
                    error: OutcomeError::Failed(format!("expanding inputs: {err:#}")),
                    diagnostics: None,
                };
            }
        };

        // Checked for every run, manual or watch-triggered. The fingerprint
        // is taken before the action runs and committed only after it
        // succeeded.
        let mut fingerprint: Option<Fingerprint> = None;
        if task.changed {
            match self.fingerprint(&inputs).await {
                Ok(fp) if !self.cache.differs(&task.name, &fp) => {
                    info!(task = %task.name, "inputs unchanged; skipping");
                    return Attempt::Unchanged;
                }
                Ok(fp) => fingerprint = Some(fp),
                Err(err) => {
                    warn!(task = %task.name, error = %err, "could not fingerprint inputs; running anyway");
                }
            }
        }

        let ctx = ActionContext {
            task: task.name.clone(),
            root: self.root.to_path_buf(),
            inputs,
            output: task.output.as_ref().map(|o| self.root.join(o)),
            options: task.options.clone(),
            fs: Arc::clone(&self.fs),
        };

        let limit = task.timeout.unwrap_or(self.action_timeout);
        debug!(
            task = %task.name,
            action = task.action.kind(),
            inputs = ctx.inputs.len(),
            timeout = ?limit,
            reason = ?reason,
            "running action"
        );

        match tokio::time::timeout(limit, task.action.run(&ctx)).await {
            Err(_) => Attempt::Failed {
                error: OutcomeError::TimedOut(limit),
                diagnostics: None,
            },
            Ok(Err(err)) => Attempt::Failed {
                error: OutcomeError::Failed(format!("{err:#}")),
                diagnostics: None,
            },
            Ok(Ok(output)) if !output.success => {
                let detail = output
                    .diagnostics
                    .as_deref()
                    .and_then(|d| d.lines().last())
                    .unwrap_or("action reported failure")
                    .to_string();
                Attempt::Failed {
                    error: OutcomeError::Failed(detail),
                    diagnostics: output.diagnostics,
                }
            }
            Ok(Ok(output)) => {
                if let Some(fp) = fingerprint {
                    self.cache.commit_fingerprint(&task.name, fp);
                }
                Attempt::Ran(output)
            }
        }
    }

    async fn expand(&self, task: &AtomicTask) -> anyhow::Result<Vec<PathBuf>> {
        if task.inputs.is_empty() {
            return Ok(Vec::new());
        }
        let fs = Arc::clone(&self.fs);
        let root = self.root.to_path_buf();
        let patterns = task.inputs.clone();
        tokio::task::spawn_blocking(move || expand_inputs(fs.as_ref(), &root, &patterns)).await?
    }

    async fn fingerprint(&self, inputs: &[PathBuf]) -> anyhow::Result<Fingerprint> {
        let cache = Arc::clone(&self.cache);
        let inputs = inputs.to_vec();
        tokio::task::spawn_blocking(move || cache.fingerprint(&inputs)).await?
    }

    fn finish(&self, outcome: TaskOutcome) -> TaskOutcome {
        match outcome.status {
            TaskStatus::Failed => error!(
                task = %outcome.task,
                duration_ms = outcome.duration_ms,
                error = %outcome.error_detail().unwrap_or_default(),
                "task failed"
            ),
            status => info!(
                task = %outcome.task,
                duration_ms = outcome.duration_ms,
                status = %status,
                "task finished"
            ),
        }

        self.sink.emit(BuildEvent::TaskFinished {
            task: outcome.task.clone(),
            status: outcome.status,
            duration_ms: outcome.duration_ms,
            error: outcome.error_detail(),
        });
        outcome
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}
