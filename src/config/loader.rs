// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::model::ConfigFile;
use crate::config::validate::validate_config;

/// Name of the config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "Devloop.toml";

/// Load a configuration file from a given path and return the raw
/// `ConfigFile`.
///
/// This only performs TOML deserialization; use [`validate_config`] (after
/// CLI overrides are applied) for semantic checks.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading config file at {:?}", path))?;

    parse_str(&contents).with_context(|| format!("parsing TOML config from {:?}", path))
}

pub fn parse_str(contents: &str) -> Result<ConfigFile> {
    Ok(toml::from_str(contents)?)
}

/// Load the config if present.
///
/// An explicitly requested file must exist. The default file is optional:
/// when it is missing, built-in defaults are used.
pub fn load_optional(path: Option<&Path>) -> Result<ConfigFile> {
    match path {
        Some(path) => load_from_path(path),
        None => {
            let default = default_config_path();
            if default.is_file() {
                load_from_path(&default)
            } else {
                Ok(ConfigFile::default())
            }
        }
    }
}

/// Load and validate in one go, for callers that don't apply overrides.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let config = load_from_path(&path)?;
    validate_config(&config)?;
    Ok(config)
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_FILE)
}
