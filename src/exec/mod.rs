// src/exec/mod.rs

//! Action execution: the action interface, built-in actions, the plan
//! executor and the backend the runtime dispatches through.

pub mod action;
pub mod backend;
pub mod builtin;
pub mod executor;

pub use action::{Action, ActionContext, ActionFuture, ActionOutput};
pub use backend::{RealRunBackend, RunBackend};
pub use executor::{
    DEFAULT_ACTION_TIMEOUT, Executor, ExecutorSettings, OutcomeError, RunReport, TaskOutcome,
};
