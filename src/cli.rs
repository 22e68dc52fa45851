// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `devloop`.
#[derive(Debug, Clone, Default, Parser)]
#[command(
    name = "devloop",
    version,
    about = "Rebuild and restart a program whenever its sources change.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Devloop.toml` in the current working directory, if it
    /// exists.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// File or directory to watch (repeatable). Replaces `[watch].paths`.
    #[arg(short, long = "watch", value_name = "PATH")]
    pub watch: Vec<PathBuf>,

    /// Glob to leave out of directory snapshots (repeatable). Added to
    /// `[watch].exclude`.
    #[arg(short, long = "exclude", value_name = "GLOB")]
    pub exclude: Vec<String>,

    /// Build command run before every restart. Replaces `[build].cmd`.
    #[arg(short, long, value_name = "CMD")]
    pub build: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `DEVLOOP_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Wait for the first change instead of building and starting right away.
    #[arg(long)]
    pub no_initial_run: bool,

    /// Parse + validate, print the effective configuration, but don't watch
    /// or run anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Command to supervise, given after `--`. Replaces `[run]`.
    #[arg(last = true, value_name = "CMD")]
    pub command: Vec<String>,
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
