// src/exec/process.rs

//! Single OS process instances.
//!
//! [`ProcessSpawner`] creates [`ProcessHandle`]s; the supervisor only ever
//! talks to these traits so tests can substitute recording fakes.
//! [`stop_process`] holds the platform-specific stop policy.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::errors::{DevloopError, Result};

/// Program plus arguments, optionally run from a specific directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new<P, I, A>(program: P, args: I) -> Self
    where
        P: Into<String>,
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
        }
    }

    /// Split a command line on whitespace. No quoting rules apply.
    ///
    /// Returns `None` for a blank line.
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let program = parts.next()?;
        Some(Self::new(program, parts))
    }

    /// `go run <file> <args...>`
    pub fn go_run(file: impl Into<PathBuf>, args: &[String]) -> Self {
        let file: PathBuf = file.into();
        let mut all = vec!["run".to_string(), file.to_string_lossy().into_owned()];
        all.extend(args.iter().cloned());
        Self::new("go", all)
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub(crate) fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        cmd
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// A live process.
pub trait ProcessHandle: Send {
    fn id(&self) -> Option<u32>;

    /// Ask the process to exit (SIGINT on Unix).
    fn interrupt(&mut self) -> Result<()>;

    /// Force termination.
    fn kill(&mut self) -> Result<()>;

    /// Wait for the process to exit; yields its exit code if it has one.
    fn wait(&mut self) -> Pin<Box<dyn Future<Output = Result<Option<i32>>> + Send + '_>>;
}

/// Creates process instances.
pub trait ProcessSpawner: Send {
    fn spawn(&mut self, command: &CommandSpec) -> Result<Box<dyn ProcessHandle>>;
}

/// Spawner for real OS processes.
///
/// Children inherit stdout/stderr so their output shows up directly in the
/// terminal.
#[derive(Debug, Clone, Default)]
pub struct OsSpawner;

impl ProcessSpawner for OsSpawner {
    fn spawn(&mut self, command: &CommandSpec) -> Result<Box<dyn ProcessHandle>> {
        let mut cmd = command.to_command();
        cmd.stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|source| DevloopError::Spawn {
            command: command.to_string(),
            source,
        })?;

        Ok(Box::new(OsProcess { child }))
    }
}

/// Wrapper around a `tokio::process::Child`.
#[derive(Debug)]
pub struct OsProcess {
    child: Child,
}

impl ProcessHandle for OsProcess {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    #[cfg(unix)]
    fn interrupt(&mut self) -> Result<()> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let pid = self.child.id().ok_or_else(|| DevloopError::Signal {
            pid: 0,
            reason: "process already exited".to_string(),
        })?;

        kill(Pid::from_raw(pid as i32), Signal::SIGINT).map_err(|e| DevloopError::Signal {
            pid,
            reason: e.to_string(),
        })
    }

    #[cfg(not(unix))]
    fn interrupt(&mut self) -> Result<()> {
        Err(DevloopError::Signal {
            pid: self.child.id().unwrap_or(0),
            reason: "graceful interrupt is not supported on this platform".to_string(),
        })
    }

    fn kill(&mut self) -> Result<()> {
        let pid = self.child.id().unwrap_or(0);
        self.child.start_kill().map_err(|e| DevloopError::Signal {
            pid,
            reason: e.to_string(),
        })
    }

    fn wait(&mut self) -> Pin<Box<dyn Future<Output = Result<Option<i32>>> + Send + '_>> {
        Box::pin(async move {
            let status = self.child.wait().await?;
            Ok(status.code())
        })
    }
}

/// Whether this platform has a graceful interrupt we can send to children.
pub const GRACEFUL_INTERRUPT: bool = cfg!(unix);

/// Stop a process and wait for it to be gone.
///
/// Graceful first where the platform allows it; if delivering the interrupt
/// fails, escalate to a kill right away. With a `timeout`, a process that is
/// still alive when it elapses is killed and waited for again.
pub async fn stop_process(
    process: &mut dyn ProcessHandle,
    timeout: Option<Duration>,
) -> Result<Option<i32>> {
    let pid = process.id();

    if GRACEFUL_INTERRUPT {
        if let Err(err) = process.interrupt() {
            warn!(?pid, error = %err, "interrupt failed; killing process");
            kill_logged(process);
        }
    } else {
        kill_logged(process);
    }

    let Some(timeout) = timeout else {
        return process.wait().await;
    };

    match tokio::time::timeout(timeout, process.wait()).await {
        Ok(res) => res,
        Err(_) => {
            warn!(?pid, ?timeout, "process ignored interrupt; killing");
            kill_logged(process);
            process.wait().await
        }
    }
}

fn kill_logged(process: &mut dyn ProcessHandle) {
    if let Err(err) = process.kill() {
        debug!(pid = ?process.id(), error = %err, "kill failed (process may have already exited)");
    }
}
