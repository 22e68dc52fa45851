// src/exec/supervisor.rs

//! Restart supervisor.
//!
//! One Tokio task owns a control channel of `bool` signals and the single
//! supervised process:
//!
//! | state   | signal  | action                           | next    |
//! |---------|---------|----------------------------------|---------|
//! | Idle    | `true`  | start                            | Running |
//! | Running | `true`  | stop (interrupt, wait), start    | Running |
//! | Running | `false` | stop                             | Idle    |
//! | Idle    | `false` | nothing                          | Idle    |
//!
//! When the channel closes the running process is stopped and the `stopped`
//! hook fires. A signal is not read until the previous transition has
//! completed, and the channel holds a single slot, so producers wait while a
//! restart is in flight.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::errors::{DevloopError, Result};
use crate::exec::process::{stop_process, CommandSpec, OsSpawner, ProcessHandle, ProcessSpawner};

/// Observable supervisor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    Running,
}

/// Optional callbacks.
#[derive(Default)]
pub struct SupervisorHooks {
    /// Fires after every successful start.
    pub on_started: Option<Box<dyn FnMut() + Send>>,
    /// Fires once, after the control channel closed and the last process was
    /// stopped.
    pub on_stopped: Option<Box<dyn FnOnce() + Send>>,
}

impl fmt::Debug for SupervisorHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupervisorHooks")
            .field("on_started", &self.on_started.is_some())
            .field("on_stopped", &self.on_stopped.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupervisorOptions {
    /// How long a stopping process may take before it is killed. `None`
    /// waits indefinitely after the interrupt.
    pub stop_timeout: Option<Duration>,
}

pub struct RestartSupervisor<S: ProcessSpawner> {
    spawner: S,
    command: CommandSpec,
    options: SupervisorOptions,
    hooks: SupervisorHooks,
    current: Option<Box<dyn ProcessHandle>>,
    generation: u64,
}

impl<S: ProcessSpawner> fmt::Debug for RestartSupervisor<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestartSupervisor")
            .field("command", &self.command)
            .field("state", &self.state())
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl<S: ProcessSpawner> RestartSupervisor<S> {
    pub fn new(
        spawner: S,
        command: CommandSpec,
        options: SupervisorOptions,
        hooks: SupervisorHooks,
    ) -> Self {
        Self {
            spawner,
            command,
            options,
            hooks,
            current: None,
            generation: 0,
        }
    }

    pub fn state(&self) -> SupervisorState {
        if self.current.is_some() {
            SupervisorState::Running
        } else {
            SupervisorState::Idle
        }
    }

}

impl<S: ProcessSpawner + 'static> RestartSupervisor<S> {
    /// Move the supervisor onto its own task.
    pub fn spawn(self) -> SupervisorHandle {
        let (control, rx) = mpsc::channel::<bool>(1);
        let join = tokio::spawn(self.run(rx));
        SupervisorHandle { control, join }
    }

    /// Receive loop. Returns when every control sender has been dropped.
    pub async fn run(mut self, mut control: mpsc::Receiver<bool>) {
        info!(cmd = %self.command, "supervisor started");

        while let Some(run) = control.recv().await {
            debug!(run, state = ?self.state(), "control signal");
            self.apply(run).await;
        }

        self.stop_current().await;
        info!(cmd = %self.command, "supervisor finished (control channel closed)");

        if let Some(stopped) = self.hooks.on_stopped.take() {
            stopped();
        }
    }

    /// Apply one control signal to completion.
    pub async fn apply(&mut self, run: bool) {
        self.stop_current().await;
        if run {
            self.start();
        }
    }

    async fn stop_current(&mut self) {
        let Some(mut process) = self.current.take() else {
            return;
        };

        let pid = process.id();
        info!(?pid, generation = self.generation, "stopping process");

        match stop_process(process.as_mut(), self.options.stop_timeout).await {
            Ok(code) => info!(?pid, exit_code = ?code, "process stopped"),
            Err(err) => error!(?pid, error = %err, "error while waiting for process to exit"),
        }
    }

    fn start(&mut self) {
        match self.spawner.spawn(&self.command) {
            Ok(process) => {
                self.generation += 1;
                info!(
                    pid = ?process.id(),
                    generation = self.generation,
                    cmd = %self.command,
                    "process started"
                );
                self.current = Some(process);
                if let Some(started) = self.hooks.on_started.as_mut() {
                    started();
                }
            }
            Err(err) => {
                error!(cmd = %self.command, error = %err, "failed to start process");
            }
        }
    }
}

/// Owner-side handle of a spawned supervisor.
#[derive(Debug)]
pub struct SupervisorHandle {
    control: mpsc::Sender<bool>,
    join: JoinHandle<()>,
}

impl SupervisorHandle {
    /// Clone of the control channel.
    pub fn control(&self) -> mpsc::Sender<bool> {
        self.control.clone()
    }

    /// Ensure one fresh instance is running.
    pub async fn restart(&self) -> Result<()> {
        self.send(true).await
    }

    /// Ensure no instance is running.
    pub async fn stop(&self) -> Result<()> {
        self.send(false).await
    }

    async fn send(&self, run: bool) -> Result<()> {
        self.control.send(run).await.map_err(|_| {
            DevloopError::Other(anyhow::anyhow!("supervisor has already shut down"))
        })
    }

    /// Close the control channel and wait for the supervisor to stop its
    /// process and exit. Other clones of the control sender keep it alive.
    pub async fn shutdown(self) -> Result<()> {
        let SupervisorHandle { control, join } = self;
        drop(control);
        join.await.map_err(|e| {
            warn!(error = %e, "supervisor task ended abnormally");
            DevloopError::Other(e.into())
        })
    }
}

/// Supervise a command with real OS processes.
pub fn spawn_supervisor(
    command: CommandSpec,
    options: SupervisorOptions,
    hooks: SupervisorHooks,
) -> SupervisorHandle {
    RestartSupervisor::new(OsSpawner, command, options, hooks).spawn()
}

/// Supervise a compiled binary.
pub fn run_bin(
    binfile: impl Into<PathBuf>,
    args: &[String],
    options: SupervisorOptions,
    hooks: SupervisorHooks,
) -> SupervisorHandle {
    let binfile: PathBuf = binfile.into();
    let command = CommandSpec::new(binfile.to_string_lossy(), args.iter().cloned());
    spawn_supervisor(command, options, hooks)
}

/// Supervise `go run <file> <args...>`.
pub fn run_go(
    gofile: impl Into<PathBuf>,
    args: &[String],
    options: SupervisorOptions,
    hooks: SupervisorHooks,
) -> SupervisorHandle {
    spawn_supervisor(CommandSpec::go_run(gofile, args), options, hooks)
}
