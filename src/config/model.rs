// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::exec::{CommandSpec, SupervisorOptions};
use crate::watch::WatchOptions;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [watch]
/// paths = ["src", "Cargo.toml"]
/// exclude = ["**/*.tmp"]
///
/// [build]
/// cmd = "cargo build"
///
/// [run]
/// cmd = "target/debug/app"
/// args = ["--port", "8080"]
/// ```
///
/// Every section is optional; `[run]` must be supplied either here or on the
/// command line.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub watch: WatchSection,

    /// Optional build step run before every restart.
    #[serde(default)]
    pub build: Option<BuildSection>,

    /// The supervised command.
    #[serde(default)]
    pub run: Option<RunSection>,
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchSection {
    /// Files and directories to watch. Relative paths are resolved against
    /// the working directory.
    #[serde(default = "default_watch_paths")]
    pub paths: Vec<PathBuf>,

    /// Glob patterns (relative to each directory root) left out of
    /// snapshots.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Also exclude `.git`, `target` and `node_modules`.
    #[serde(default = "default_true")]
    pub default_excludes: bool,

    /// Pause after an iteration in which nothing could be registered.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Consecutive empty registrations before the watch session gives up.
    #[serde(default = "default_max_registration_failures")]
    pub max_registration_failures: u32,
}

fn default_watch_paths() -> Vec<PathBuf> {
    vec![PathBuf::from(".")]
}

fn default_true() -> bool {
    true
}

fn default_retry_delay_ms() -> u64 {
    250
}

fn default_max_registration_failures() -> u32 {
    40
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            paths: default_watch_paths(),
            exclude: Vec::new(),
            default_excludes: default_true(),
            retry_delay_ms: default_retry_delay_ms(),
            max_registration_failures: default_max_registration_failures(),
        }
    }
}

impl WatchSection {
    pub fn options(&self) -> WatchOptions {
        WatchOptions {
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            max_registration_failures: self.max_registration_failures,
        }
    }
}

/// `[build]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildSection {
    /// Command line, split on whitespace.
    pub cmd: String,

    /// Working directory for the build.
    #[serde(default)]
    pub cwd: Option<PathBuf>,
}

impl BuildSection {
    pub fn command(&self) -> Option<CommandSpec> {
        let spec = CommandSpec::parse(&self.cmd)?;
        Some(match &self.cwd {
            Some(cwd) => spec.with_cwd(cwd),
            None => spec,
        })
    }
}

/// `[run]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunSection {
    /// Program to run (or a `.go` file when `go = true`).
    pub cmd: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Run `cmd` through `go run`.
    #[serde(default)]
    pub go: bool,

    /// Milliseconds a stopping process gets before it is killed. `0` waits
    /// indefinitely.
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,
}

fn default_stop_timeout_ms() -> u64 {
    5000
}

impl RunSection {
    pub fn new(cmd: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            cmd: cmd.into(),
            args,
            go: false,
            stop_timeout_ms: default_stop_timeout_ms(),
        }
    }

    pub fn command(&self) -> CommandSpec {
        if self.go {
            CommandSpec::go_run(&self.cmd, &self.args)
        } else {
            CommandSpec::new(self.cmd.clone(), self.args.iter().cloned())
        }
    }

    pub fn supervisor_options(&self) -> SupervisorOptions {
        SupervisorOptions {
            stop_timeout: match self.stop_timeout_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
        }
    }
}
