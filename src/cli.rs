// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::config::loader::DEFAULT_CONFIG_FILE;

/// Name of the task that starts watch mode.
pub const WATCH_TASK: &str = "watch";

/// Command-line arguments for `buildwatch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "buildwatch",
    version,
    about = "Run declarative build tasks on demand or when watched files change.",
    long_about = None
)]
pub struct CliArgs {
    /// Task to run. Omitting it (or passing `watch`) starts watch mode.
    #[arg(value_name = "TASK")]
    pub task: Option<String>,

    /// Path to the config file (TOML).
    ///
    /// Default: `Buildwatch.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_FILE)]
    pub config: String,

    /// Size of the worker pool used for parallel groups.
    ///
    /// Overrides `[config].workers`.
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `BUILDWATCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the resolved plan, but don't execute anything.
    #[arg(long)]
    pub dry_run: bool,

    /// List registered tasks and watch rules, then exit.
    #[arg(long)]
    pub list: bool,
}

impl CliArgs {
    /// The requested task, or `None` when watch mode was requested.
    pub fn one_shot_task(&self) -> Option<&str> {
        match self.task.as_deref() {
            None | Some(WATCH_TASK) => None,
            Some(task) => Some(task),
        }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
