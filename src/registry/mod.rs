// src/registry/mod.rs

//! Task registry: named task definitions and their resolution into
//! execution plans.

pub mod definition;
pub mod plan;
mod resolve;

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::debug;

use crate::config::{ConfigFile, TaskConfig};
use crate::errors::{BuildwatchError, Result};
use crate::exec::builtin::build_action;
use crate::types::{TaskName, parse_duration};

pub use definition::{AtomicTask, CompositeTask, TaskDefinition, TaskOptions};
pub use plan::{ExecutionPlan, PlanGroup};

/// Name-keyed store of task definitions.
///
/// Built once at startup and shared behind an `Arc`; nothing mutates it
/// after the first run starts.
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    tasks: BTreeMap<TaskName, TaskDefinition>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a definition. Member references of composites are checked at
    /// resolution time, so definitions can be registered in any order.
    pub fn register(&mut self, def: TaskDefinition) -> Result<()> {
        let name = def.name().to_string();
        if self.tasks.contains_key(&name) {
            return Err(BuildwatchError::DuplicateTask(name));
        }
        debug!(task = %name, composite = def.is_composite(), "registered task");
        self.tasks.insert(name, def);
        Ok(())
    }

    /// Build a registry from a validated configuration.
    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        let mut registry = Self::new();
        for (name, task) in cfg.tasks() {
            registry.register(definition_from_config(name, task)?)?;
        }
        Ok(registry)
    }

    /// Flatten `name` into an ordered plan of atomic actions.
    pub fn resolve(&self, name: &str) -> Result<ExecutionPlan> {
        resolve::resolve_targets(&self.tasks, &[name.to_string()])
    }

    /// Resolve several targets, in order, into one plan. Idempotent tasks
    /// are deduplicated across all targets.
    pub fn resolve_all(&self, names: &[TaskName]) -> Result<ExecutionPlan> {
        resolve::resolve_targets(&self.tasks, names)
    }

    pub fn get(&self, name: &str) -> Option<&TaskDefinition> {
        self.tasks.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// All task names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

fn definition_from_config(name: &str, task: &TaskConfig) -> Result<TaskDefinition> {
    if let Some(members) = &task.members {
        return Ok(TaskDefinition::composite(name, members.iter().cloned()));
    }

    let action = build_action(name, task)?;
    let options = TaskOptions {
        fail_on_error: task.effective_fail_on_error(),
        output_style: task.output_style,
        source_map: task.source_map,
        extra: task.options.clone(),
    };

    let mut atomic = AtomicTask::new(name, action)
        .with_inputs(task.inputs.iter().cloned())
        .with_options(options)
        .parallel(task.parallel)
        .idempotent(task.idempotent)
        .changed(task.changed);

    if let Some(output) = &task.output {
        atomic = atomic.with_output(PathBuf::from(output));
    }

    if let Some(raw) = &task.timeout {
        let timeout = parse_duration(raw).map_err(|e| {
            BuildwatchError::ConfigError(format!("task '{name}' has invalid timeout: {e}"))
        })?;
        atomic = atomic.with_timeout(timeout);
    }

    Ok(TaskDefinition::atomic(atomic))
}
