// src/config/mod.rs

//! Configuration loading and validation for devloop.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate the effective configuration (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, load_optional, DEFAULT_CONFIG_FILE};
pub use model::{BuildSection, ConfigFile, RunSection, WatchSection};
pub use validate::validate_config;
