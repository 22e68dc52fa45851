// src/engine/mod.rs

//! Orchestration engine for devloop.
//!
//! The engine is the only place where the watch session and the restart
//! supervisor meet: every change event runs the build (if any) and, when it
//! succeeds, sends `true` to the supervisor. The two never call each other.
//!
//! The pure decision logic lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

/// What the IO shell should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCommand {
    /// Run the build step; its result goes back into the core.
    RunBuild,
    /// Ensure a fresh instance of the supervised command is running.
    Restart,
}

/// Result of feeding one message into the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreStep {
    pub commands: Vec<EngineCommand>,
    pub keep_running: bool,
}

impl CoreStep {
    pub fn proceed(commands: Vec<EngineCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }

    pub fn exit() -> Self {
        Self {
            commands: Vec::new(),
            keep_running: false,
        }
    }
}

/// Runtime options used by both the core and the async shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeOptions {
    /// Build and start once at startup, before any change is seen.
    pub initial_run: bool,
}

pub mod core;
pub mod runtime;

pub use self::core::EngineCore;
pub use self::runtime::{BuildBackend, CommandBuilder, Runtime};
