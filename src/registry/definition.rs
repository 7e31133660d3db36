// src/registry/definition.rs

//! Task definitions: a tagged variant of atomic actions and composite
//! aliases.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::exec::action::Action;
use crate::types::{OutputStyle, TaskName};

/// Recognised per-task settings forwarded to actions.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskOptions {
    /// If false, a failure is reported but the plan continues.
    pub fail_on_error: bool,
    pub output_style: Option<OutputStyle>,
    pub source_map: bool,
    /// Action-specific settings (e.g. `footer` for `concat`).
    pub extra: BTreeMap<String, toml::Value>,
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self {
            fail_on_error: true,
            output_style: None,
            source_map: false,
            extra: BTreeMap::new(),
        }
    }
}

impl TaskOptions {
    /// String view of an `extra` option. Non-string TOML values are
    /// rendered with their TOML representation.
    pub fn extra_str(&self, key: &str) -> Option<String> {
        self.extra.get(key).map(|v| match v {
            toml::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

/// A task that directly invokes an action.
#[derive(Debug, Clone)]
pub struct AtomicTask {
    pub name: TaskName,
    pub action: Arc<dyn Action>,
    /// Ordered input glob patterns, relative to the project root.
    pub inputs: Vec<String>,
    pub output: Option<PathBuf>,
    pub options: TaskOptions,
    /// Member of a parallel group when adjacent to other parallel tasks.
    pub parallel: bool,
    /// Deduplicated within a plan when referenced more than once.
    pub idempotent: bool,
    /// Skipped when the inputs are unchanged since the last success.
    pub changed: bool,
    /// Overrides the executor's default action timeout.
    pub timeout: Option<Duration>,
}

impl AtomicTask {
    pub fn new(name: impl Into<TaskName>, action: Arc<dyn Action>) -> Self {
        Self {
            name: name.into(),
            action,
            inputs: Vec::new(),
            output: None,
            options: TaskOptions::default(),
            parallel: false,
            idempotent: false,
            changed: false,
            timeout: None,
        }
    }

    pub fn with_inputs<I, S>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs = inputs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_options(mut self, options: TaskOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn idempotent(mut self, idempotent: bool) -> Self {
        self.idempotent = idempotent;
        self
    }

    pub fn changed(mut self, changed: bool) -> Self {
        self.changed = changed;
        self
    }

    pub fn fail_on_error(mut self, fail_on_error: bool) -> Self {
        self.options.fail_on_error = fail_on_error;
        self
    }
}

/// A named, ordered group of other tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeTask {
    pub name: TaskName,
    pub members: Vec<TaskName>,
}

#[derive(Debug, Clone)]
pub enum TaskDefinition {
    Atomic(Arc<AtomicTask>),
    Composite(CompositeTask),
}

impl TaskDefinition {
    pub fn atomic(task: AtomicTask) -> Self {
        TaskDefinition::Atomic(Arc::new(task))
    }

    pub fn composite<I, S>(name: impl Into<TaskName>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskName>,
    {
        TaskDefinition::Composite(CompositeTask {
            name: name.into(),
            members: members.into_iter().map(Into::into).collect(),
        })
    }

    pub fn name(&self) -> &str {
        match self {
            TaskDefinition::Atomic(t) => &t.name,
            TaskDefinition::Composite(c) => &c.name,
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, TaskDefinition::Composite(_))
    }
}
