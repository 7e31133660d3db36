// src/watch/mod.rs

//! File watching and input matching.
//!
//! This module is responsible for:
//! - Compiling glob patterns for watch rules and task inputs.
//! - Expanding task input patterns into concrete files.
//! - Wiring up a cross-platform filesystem watcher (`notify`) whose events
//!   are debounced per rule and turned into run submissions.
//!
//! It does not know how tasks are resolved or executed; it only produces
//! `RuntimeEvent::Submit` requests and `Reload` notifications.

pub mod debounce;
pub mod path_utils;
pub mod patterns;
pub mod watcher;

pub use debounce::{Debouncer, DueTrigger};
pub use patterns::{PatternSet, WatchProfile, build_watch_profiles, compile_glob, expand_inputs};
pub use watcher::{WatcherHandle, spawn_watcher};
