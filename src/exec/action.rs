// src/exec/action.rs

//! The uniform interface every atomic task goes through.
//!
//! Built-in actions live in [`crate::exec::builtin`]; tests plug in their
//! own implementations (see `buildwatch-test-utils`).

use std::fmt::Debug;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Result;

use crate::fs::FileSystem;
use crate::registry::TaskOptions;
use crate::types::TaskName;

/// Read-only view handed to an action for one invocation.
#[derive(Debug, Clone)]
pub struct ActionContext {
    pub task: TaskName,
    /// Project root; relative paths in the config are resolved against it.
    pub root: PathBuf,
    /// Expanded input files, in pattern order.
    pub inputs: Vec<PathBuf>,
    /// Output path, already joined onto `root`.
    pub output: Option<PathBuf>,
    pub options: TaskOptions,
    pub fs: Arc<dyn FileSystem>,
}

impl ActionContext {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn output(&self) -> Option<&Path> {
        self.output.as_deref()
    }
}

/// Result of an action that ran to completion.
///
/// An `Err` from [`Action::run`] means the action could not run at all
/// (missing input, spawn failure); `success = false` means it ran and
/// reported a failure (e.g. a non-zero exit code).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionOutput {
    pub success: bool,
    pub diagnostics: Option<String>,
}

impl ActionOutput {
    pub fn ok() -> Self {
        Self {
            success: true,
            diagnostics: None,
        }
    }

    pub fn failed(diagnostics: impl Into<String>) -> Self {
        Self {
            success: false,
            diagnostics: Some(diagnostics.into()),
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: impl Into<String>) -> Self {
        let text = diagnostics.into();
        self.diagnostics = if text.is_empty() { None } else { Some(text) };
        self
    }
}

pub type ActionFuture<'a> = Pin<Box<dyn Future<Output = Result<ActionOutput>> + Send + 'a>>;

/// An external collaborator (linter, compiler, file operation) invoked by
/// an atomic task.
pub trait Action: Send + Sync + Debug {
    /// Short identifier used in logs and `--list` output.
    fn kind(&self) -> &str;

    fn run<'a>(&'a self, ctx: &'a ActionContext) -> ActionFuture<'a>;
}
