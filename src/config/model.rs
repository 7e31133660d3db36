// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::types::OutputStyle;

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// workers = 4
/// action_timeout = "10m"
/// debounce = "250ms"
///
/// [task.lint]
/// cmd = "eslint {inputs}"
/// inputs = ["assets/js/app.js", "assets/js/parts/*.js"]
///
/// [task.js]
/// members = ["lint", "concat"]
///
/// [watch.js]
/// globs = ["assets/js/**/*.js"]
/// tasks = ["js"]
/// ```
///
/// All sections are optional and have reasonable defaults, although
/// validation requires at least one task.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    /// Global behaviour config from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// All tasks from `[task.<name>]`.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,

    /// All watch rules from `[watch.<id>]`.
    #[serde(default)]
    pub watch: BTreeMap<String, WatchConfig>,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSection {
    /// Size of the worker pool used for parallel groups.
    ///
    /// Defaults to the available hardware concurrency.
    #[serde(default)]
    pub workers: Option<usize>,

    /// Upper bound on the run time of a single atomic action.
    #[serde(default = "default_action_timeout")]
    pub action_timeout: String,

    /// Default debounce window for watch rules that don't set their own.
    #[serde(default = "default_debounce")]
    pub debounce: String,
}

fn default_action_timeout() -> String {
    "10m".to_string()
}

fn default_debounce() -> String {
    "250ms".to_string()
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            workers: None,
            action_timeout: default_action_timeout(),
            debounce: default_debounce(),
        }
    }
}

/// `[task.<name>]` section.
///
/// A task is either *atomic* (it has an `action` and/or a `cmd`) or
/// *composite* (it has `members`). Mixing both is a validation error.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    /// Built-in action kind: `shell`, `concat`, `copy` or `clean`.
    ///
    /// If omitted on an atomic task, `shell` is assumed.
    #[serde(default)]
    pub action: Option<String>,

    /// Command line for `shell` actions.
    #[serde(default)]
    pub cmd: Option<String>,

    /// Ordered member task names; makes this a composite task.
    #[serde(default)]
    pub members: Option<Vec<String>>,

    /// Input glob patterns, relative to the project root. Order matters:
    /// files are handed to the action pattern by pattern. A leading `!`
    /// excludes matches.
    #[serde(default)]
    pub inputs: Vec<String>,

    /// Output path, relative to the project root.
    #[serde(default)]
    pub output: Option<String>,

    /// If false, a failure of this task is reported but doesn't stop the
    /// plan. Defaults to true.
    #[serde(default)]
    pub fail_on_error: Option<bool>,

    /// Run concurrently with adjacent `parallel` tasks of the same plan.
    #[serde(default)]
    pub parallel: bool,

    /// Run at most once per plan even if referenced repeatedly.
    #[serde(default)]
    pub idempotent: bool,

    /// Skip this task when its inputs are unchanged since the last
    /// successful run.
    #[serde(default)]
    pub changed: bool,

    /// Per-task override of `[config].action_timeout`.
    #[serde(default)]
    pub timeout: Option<String>,

    /// Output style hint for compiler-like actions.
    #[serde(default)]
    pub output_style: Option<OutputStyle>,

    /// Whether compiler-like actions should emit source maps.
    #[serde(default)]
    pub source_map: bool,

    /// Free-form options forwarded to the action.
    #[serde(default)]
    pub options: BTreeMap<String, toml::Value>,
}

impl TaskConfig {
    pub fn is_composite(&self) -> bool {
        self.members.is_some()
    }

    /// Effective action kind for an atomic task.
    pub fn effective_action(&self) -> &str {
        self.action.as_deref().unwrap_or("shell")
    }

    pub fn effective_fail_on_error(&self) -> bool {
        self.fail_on_error.unwrap_or(true)
    }
}

/// `[watch.<id>]` section.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct WatchConfig {
    /// Glob patterns (relative to the project root) that trigger this rule.
    #[serde(default)]
    pub globs: Vec<String>,

    /// Glob patterns that never trigger this rule.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Tasks submitted, in order, when the rule fires.
    #[serde(default)]
    pub tasks: Vec<String>,

    /// Per-rule debounce window; falls back to `[config].debounce`.
    #[serde(default)]
    pub debounce: Option<String>,

    /// Emit a reload event for the changed paths when the rule fires.
    #[serde(default)]
    pub livereload: bool,
}

/// Parsed global settings derived from `[config]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub workers: Option<usize>,
    pub action_timeout: Duration,
    pub debounce: Duration,
}

/// Validated configuration.
///
/// Only obtainable through `ConfigFile::try_from(RawConfigFile)`, which runs
/// the checks in [`crate::config::validate`].
#[derive(Debug, Clone)]
pub struct ConfigFile {
    settings: Settings,
    task: BTreeMap<String, TaskConfig>,
    watch: BTreeMap<String, WatchConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        settings: Settings,
        task: BTreeMap<String, TaskConfig>,
        watch: BTreeMap<String, WatchConfig>,
    ) -> Self {
        Self {
            settings,
            task,
            watch,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn tasks(&self) -> &BTreeMap<String, TaskConfig> {
        &self.task
    }

    pub fn task(&self, name: &str) -> Option<&TaskConfig> {
        self.task.get(name)
    }

    pub fn watch_rules(&self) -> &BTreeMap<String, WatchConfig> {
        &self.watch
    }
}
