// src/errors.rs

//! Crate-wide error type and process exit codes.

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildwatchError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Task '{0}' is already registered")]
    DuplicateTask(String),

    #[error("Task not found: {0}")]
    UnknownTask(String),

    #[error("Cyclic task definition: {}", .0.join(" -> "))]
    CyclicTask(Vec<String>),

    #[error("Task '{task}' failed: {detail}")]
    ActionFailure { task: String, detail: String },

    #[error("Task '{task}' timed out after {after:?}")]
    Timeout { task: String, after: Duration },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Process exit codes reported by the `buildwatch` binary.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const TASK_FAILED: i32 = 1;
    pub const UNKNOWN_TASK: i32 = 2;
    pub const CYCLIC_TASK: i32 = 3;
    pub const OTHER: i32 = 4;
}

impl BuildwatchError {
    /// Exit code distinguishing unknown tasks, cycles, execution failures and
    /// everything else that goes wrong before execution starts.
    pub fn exit_code(&self) -> i32 {
        match self {
            BuildwatchError::UnknownTask(_) => exit_code::UNKNOWN_TASK,
            BuildwatchError::CyclicTask(_) => exit_code::CYCLIC_TASK,
            BuildwatchError::ActionFailure { .. } | BuildwatchError::Timeout { .. } => {
                exit_code::TASK_FAILED
            }
            BuildwatchError::ConfigError(_)
            | BuildwatchError::IoError(_)
            | BuildwatchError::TomlError(_)
            | BuildwatchError::DuplicateTask(_)
            | BuildwatchError::Other(_) => exit_code::OTHER,
        }
    }

    /// Configuration-time errors are fatal and never retried.
    pub fn is_configuration_error(&self) -> bool {
        !matches!(
            self,
            BuildwatchError::ActionFailure { .. } | BuildwatchError::Timeout { .. }
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BuildwatchError>;
