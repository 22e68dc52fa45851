// src/config/validate.rs

use anyhow::{anyhow, Context, Result};

use crate::config::model::ConfigFile;
use crate::watch::PathFilter;

/// Run semantic validation against an effective configuration.
///
/// This checks:
/// - a `[run]` command is present and non-empty
/// - at least one watch path is configured
/// - `exclude` globs compile
/// - `max_registration_failures >= 1`
/// - a `[build]` command, if present, is non-empty
///
/// It does **not** check that watch paths exist; missing roots are reported
/// by the watch session at runtime.
pub fn validate_config(cfg: &ConfigFile) -> Result<()> {
    validate_run(cfg)?;
    validate_watch(cfg)?;
    validate_build(cfg)?;
    Ok(())
}

fn validate_run(cfg: &ConfigFile) -> Result<()> {
    let run = cfg
        .run
        .as_ref()
        .ok_or_else(|| anyhow!("no command to run: add a [run] section or pass one after `--`"))?;

    if run.cmd.trim().is_empty() {
        return Err(anyhow!("[run].cmd must not be empty"));
    }
    Ok(())
}

fn validate_watch(cfg: &ConfigFile) -> Result<()> {
    if cfg.watch.paths.is_empty() {
        return Err(anyhow!("[watch].paths must contain at least one path"));
    }

    if cfg.watch.max_registration_failures == 0 {
        return Err(anyhow!(
            "[watch].max_registration_failures must be >= 1 (got 0)"
        ));
    }

    PathFilter::from_excludes(&cfg.watch.exclude, cfg.watch.default_excludes)
        .context("invalid [watch].exclude")?;

    Ok(())
}

fn validate_build(cfg: &ConfigFile) -> Result<()> {
    if let Some(build) = &cfg.build {
        if build.command().is_none() {
            return Err(anyhow!("[build].cmd must not be empty"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::parse_str;

    #[test]
    fn minimal_config_is_valid() {
        let cfg = parse_str("[run]\ncmd = \"./server\"\n").unwrap();
        validate_config(&cfg).unwrap();
        assert_eq!(cfg.watch.paths.len(), 1);
        assert!(cfg.watch.default_excludes);
    }

    #[test]
    fn missing_run_is_rejected() {
        let cfg = parse_str("[watch]\npaths = [\"src\"]\n").unwrap();
        let err = validate_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("no command to run"));
    }

    #[test]
    fn zero_failure_budget_is_rejected() {
        let cfg = parse_str("[watch]\nmax_registration_failures = 0\n[run]\ncmd = \"x\"\n").unwrap();
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn bad_exclude_glob_is_rejected() {
        let cfg = parse_str("[watch]\nexclude = [\"[\"]\n[run]\ncmd = \"x\"\n").unwrap();
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn blank_build_is_rejected() {
        let cfg = parse_str("[build]\ncmd = \"  \"\n[run]\ncmd = \"x\"\n").unwrap();
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn unknown_keys_fail_to_parse() {
        assert!(parse_str("[run]\ncmd = \"x\"\nrestart = true\n").is_err());
    }
}
