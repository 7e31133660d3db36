// src/config/validate.rs

use std::collections::BTreeMap;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::cli::WATCH_TASK;
use crate::config::model::{ConfigFile, RawConfigFile, Settings, TaskConfig};
use crate::errors::{BuildwatchError, Result};
use crate::exec::builtin::ACTION_KINDS;
use crate::types::parse_duration;
use crate::watch::patterns::compile_glob;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = BuildwatchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let settings = validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(settings, raw.task, raw.watch))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<Settings> {
    ensure_has_tasks(cfg)?;
    let settings = validate_global_config(cfg)?;
    validate_tasks(cfg)?;
    validate_composite_members(cfg)?;
    validate_no_cycles(cfg)?;
    validate_watch_rules(cfg)?;
    Ok(settings)
}

fn config_err(msg: impl Into<String>) -> BuildwatchError {
    BuildwatchError::ConfigError(msg.into())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(config_err(
            "config must contain at least one [task.<name>] section",
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<Settings> {
    if cfg.config.workers == Some(0) {
        return Err(config_err("[config].workers must be >= 1 (got 0)"));
    }

    let action_timeout = parse_duration(&cfg.config.action_timeout)
        .map_err(|e| config_err(format!("[config].action_timeout: {e}")))?;
    if action_timeout.is_zero() {
        return Err(config_err("[config].action_timeout must be non-zero"));
    }

    let debounce = parse_duration(&cfg.config.debounce)
        .map_err(|e| config_err(format!("[config].debounce: {e}")))?;

    Ok(Settings {
        workers: cfg.config.workers,
        action_timeout,
        debounce,
    })
}

fn validate_tasks(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        if name == WATCH_TASK {
            return Err(config_err(format!(
                "task name '{WATCH_TASK}' is reserved for watch mode"
            )));
        }

        if task.is_composite() {
            validate_composite_task(name, task)?;
        } else {
            validate_atomic_task(name, task)?;
        }
    }
    Ok(())
}

fn validate_composite_task(name: &str, task: &TaskConfig) -> Result<()> {
    if task.action.is_some() || task.cmd.is_some() {
        return Err(config_err(format!(
            "task '{name}' sets both `members` and an action; a task is either composite or atomic"
        )));
    }
    if task.members.as_ref().is_some_and(|m| m.is_empty()) {
        return Err(config_err(format!(
            "composite task '{name}' must list at least one member"
        )));
    }
    Ok(())
}

fn validate_atomic_task(name: &str, task: &TaskConfig) -> Result<()> {
    let kind = task.effective_action();
    if !ACTION_KINDS.contains(&kind) {
        return Err(config_err(format!(
            "task '{name}' has unknown action '{kind}' (expected one of {ACTION_KINDS:?})"
        )));
    }

    match kind {
        "shell" if task.cmd.is_none() => {
            return Err(config_err(format!(
                "task '{name}' is a shell action but has no `cmd`"
            )));
        }
        "concat" | "copy" if task.output.is_none() => {
            return Err(config_err(format!(
                "task '{name}' ({kind}) requires an `output`"
            )));
        }
        "concat" | "copy" | "clean" if task.inputs.is_empty() => {
            return Err(config_err(format!(
                "task '{name}' ({kind}) requires at least one entry in `inputs`"
            )));
        }
        _ => {}
    }

    if let Some(ref timeout) = task.timeout {
        let parsed = parse_duration(timeout)
            .map_err(|e| config_err(format!("task '{name}' timeout: {e}")))?;
        if parsed.is_zero() {
            return Err(config_err(format!("task '{name}' timeout must be non-zero")));
        }
    }

    for pattern in task.inputs.iter() {
        let pattern = pattern.strip_prefix('!').unwrap_or(pattern);
        compile_glob(pattern)
            .map_err(|e| config_err(format!("task '{name}' input {e:#}")))?;
    }

    Ok(())
}

fn validate_composite_members(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        for member in task.members.iter().flatten() {
            if !cfg.task.contains_key(member) {
                debug!(composite = %name, member = %member, "unknown composite member");
                return Err(BuildwatchError::UnknownTask(member.clone()));
            }
        }
    }
    Ok(())
}

fn validate_no_cycles(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: composite -> member.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.task.keys() {
        graph.add_node(name.as_str());
    }

    for (name, task) in cfg.task.iter() {
        for member in task.members.iter().flatten() {
            graph.add_edge(name.as_str(), member.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => {
            let start = cycle.node_id();
            Err(BuildwatchError::CyclicTask(cycle_path(&cfg.task, start)))
        }
    }
}

/// Reconstruct a readable cycle (`a -> b -> a`) starting from a node that
/// toposort reported as part of one.
fn cycle_path(tasks: &BTreeMap<String, TaskConfig>, start: &str) -> Vec<String> {
    fn walk(
        tasks: &BTreeMap<String, TaskConfig>,
        start: &str,
        current: &str,
        path: &mut Vec<String>,
    ) -> bool {
        let members = tasks
            .get(current)
            .and_then(|t| t.members.as_ref())
            .map(|m| m.as_slice())
            .unwrap_or(&[]);

        for member in members {
            if member == start {
                path.push(member.clone());
                return true;
            }
            if path.contains(member) {
                continue;
            }
            path.push(member.clone());
            if walk(tasks, start, member, path) {
                return true;
            }
            path.pop();
        }
        false
    }

    let mut path = vec![start.to_string()];
    if walk(tasks, start, start, &mut path) {
        path
    } else {
        vec![start.to_string()]
    }
}

fn validate_watch_rules(cfg: &RawConfigFile) -> Result<()> {
    for (id, rule) in cfg.watch.iter() {
        if rule.globs.is_empty() {
            return Err(config_err(format!(
                "watch rule '{id}' must list at least one glob in `globs`"
            )));
        }
        if rule.tasks.is_empty() && !rule.livereload {
            return Err(config_err(format!(
                "watch rule '{id}' has no `tasks` and is not a livereload rule"
            )));
        }
        for task in rule.tasks.iter() {
            if !cfg.task.contains_key(task) {
                debug!(rule = %id, task = %task, "watch rule targets unknown task");
                return Err(BuildwatchError::UnknownTask(task.clone()));
            }
        }
        if let Some(ref debounce) = rule.debounce {
            parse_duration(debounce)
                .map_err(|e| config_err(format!("watch rule '{id}' debounce: {e}")))?;
        }
        for pattern in rule.globs.iter().chain(rule.exclude.iter()) {
            compile_glob(pattern)
                .map_err(|e| config_err(format!("watch rule '{id}': {e:#}")))?;
        }
    }
    Ok(())
}
