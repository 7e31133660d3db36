#![allow(dead_code)]

use buildwatch::config::{ConfigFile, RawConfigFile, TaskConfig, WatchConfig};
use buildwatch::errors::Result;
use buildwatch::types::OutputStyle;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn with_watch(mut self, id: &str, rule: WatchConfig) -> Self {
        self.config.watch.insert(id.to_string(), rule);
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.config.config.workers = Some(workers);
        self
    }

    pub fn action_timeout(mut self, timeout: &str) -> Self {
        self.config.config.action_timeout = timeout.to_string();
        self
    }

    pub fn debounce(mut self, debounce: &str) -> Self {
        self.config.config.debounce = debounce.to_string();
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    /// An atomic `shell` task.
    pub fn shell(cmd: &str) -> Self {
        Self {
            task: TaskConfig {
                action: Some("shell".to_string()),
                cmd: Some(cmd.to_string()),
                ..TaskConfig::default()
            },
        }
    }

    /// An atomic task using a built-in file action (`concat`, `copy`,
    /// `clean`).
    pub fn action(kind: &str) -> Self {
        Self {
            task: TaskConfig {
                action: Some(kind.to_string()),
                ..TaskConfig::default()
            },
        }
    }

    pub fn composite(members: &[&str]) -> Self {
        Self {
            task: TaskConfig {
                members: Some(members.iter().map(|m| m.to_string()).collect()),
                ..TaskConfig::default()
            },
        }
    }

    pub fn input(mut self, pattern: &str) -> Self {
        self.task.inputs.push(pattern.to_string());
        self
    }

    pub fn output(mut self, path: &str) -> Self {
        self.task.output = Some(path.to_string());
        self
    }

    pub fn fail_on_error(mut self, val: bool) -> Self {
        self.task.fail_on_error = Some(val);
        self
    }

    pub fn parallel(mut self) -> Self {
        self.task.parallel = true;
        self
    }

    pub fn idempotent(mut self) -> Self {
        self.task.idempotent = true;
        self
    }

    pub fn changed(mut self) -> Self {
        self.task.changed = true;
        self
    }

    pub fn timeout(mut self, timeout: &str) -> Self {
        self.task.timeout = Some(timeout.to_string());
        self
    }

    pub fn output_style(mut self, style: OutputStyle) -> Self {
        self.task.output_style = Some(style);
        self
    }

    pub fn source_map(mut self, val: bool) -> Self {
        self.task.source_map = val;
        self
    }

    pub fn option(mut self, key: &str, value: impl Into<toml::Value>) -> Self {
        self.task.options.insert(key.to_string(), value.into());
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}

/// Builder for `WatchConfig`.
pub struct WatchConfigBuilder {
    rule: WatchConfig,
}

impl WatchConfigBuilder {
    pub fn new(glob: &str) -> Self {
        Self {
            rule: WatchConfig {
                globs: vec![glob.to_string()],
                ..WatchConfig::default()
            },
        }
    }

    pub fn glob(mut self, glob: &str) -> Self {
        self.rule.globs.push(glob.to_string());
        self
    }

    pub fn exclude(mut self, pattern: &str) -> Self {
        self.rule.exclude.push(pattern.to_string());
        self
    }

    pub fn task(mut self, task: &str) -> Self {
        self.rule.tasks.push(task.to_string());
        self
    }

    pub fn debounce(mut self, debounce: &str) -> Self {
        self.rule.debounce = Some(debounce.to_string());
        self
    }

    pub fn livereload(mut self) -> Self {
        self.rule.livereload = true;
        self
    }

    pub fn build(self) -> WatchConfig {
        self.rule
    }
}
