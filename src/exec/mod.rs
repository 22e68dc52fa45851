// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`process`] wraps single OS processes behind the `ProcessHandle` /
//!   `ProcessSpawner` traits and owns the stop policy.
//! - [`supervisor`] keeps at most one instance of a command alive and
//!   restarts it on demand.
//! - [`build`] runs a build command to completion and captures its output.
//! - [`runner`] launches a list of commands without supervising them.

pub mod build;
pub mod process;
pub mod runner;
pub mod supervisor;

pub use build::{go_build, run_build, BuildOutput};
pub use process::{stop_process, CommandSpec, OsProcess, OsSpawner, ProcessHandle, ProcessSpawner};
pub use runner::spawn_command_runner;
pub use supervisor::{
    run_bin, run_go, spawn_supervisor, RestartSupervisor, SupervisorHandle, SupervisorHooks,
    SupervisorOptions, SupervisorState,
};
