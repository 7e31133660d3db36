// src/config/mod.rs

//! Configuration loading and validation for buildwatch.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate task definitions, composite cycles and watch rules
//!   (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, parse_str};
pub use model::{ConfigFile, ConfigSection, RawConfigFile, Settings, TaskConfig, WatchConfig};
