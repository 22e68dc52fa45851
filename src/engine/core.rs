// src/engine/core.rs

//! Pure core of the development loop.
//!
//! The core consumes watch messages and build results and answers with
//! [`EngineCommand`]s for the IO shell (`engine::runtime::Runtime`) to carry
//! out. It has no channels, no Tokio types and performs no IO, so the
//! decision logic is unit tested on its own.

use tracing::{debug, warn};

use crate::engine::{CoreStep, EngineCommand, RuntimeOptions};
use crate::watch::WatchMessage;

#[derive(Debug)]
pub struct EngineCore {
    has_build: bool,
    options: RuntimeOptions,
    changes_seen: u64,
    errors_seen: u64,
}

impl EngineCore {
    pub fn new(has_build: bool, options: RuntimeOptions) -> Self {
        Self {
            has_build,
            options,
            changes_seen: 0,
            errors_seen: 0,
        }
    }

    /// Commands to run before the first watch message.
    pub fn startup(&mut self) -> Vec<EngineCommand> {
        if self.options.initial_run {
            self.rebuild_or_restart()
        } else {
            Vec::new()
        }
    }

    pub fn on_message(&mut self, message: &WatchMessage) -> CoreStep {
        match message {
            WatchMessage::Event(event) => {
                self.changes_seen += 1;
                debug!(
                    path = ?event.path,
                    kind = ?event.kind,
                    changes = self.changes_seen,
                    "change detected"
                );
                CoreStep::proceed(self.rebuild_or_restart())
            }
            WatchMessage::Error(err) => {
                self.errors_seen += 1;
                warn!(error = %err, "watch error");
                CoreStep::proceed(Vec::new())
            }
            WatchMessage::Closed => CoreStep::exit(),
        }
    }

    /// A failed build leaves the running instance alone.
    pub fn on_build_finished(&mut self, success: bool) -> Vec<EngineCommand> {
        if success {
            vec![EngineCommand::Restart]
        } else {
            Vec::new()
        }
    }

    pub fn changes_seen(&self) -> u64 {
        self.changes_seen
    }

    pub fn errors_seen(&self) -> u64 {
        self.errors_seen
    }

    fn rebuild_or_restart(&self) -> Vec<EngineCommand> {
        if self.has_build {
            vec![EngineCommand::RunBuild]
        } else {
            vec![EngineCommand::Restart]
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use notify::EventKind;

    use super::*;
    use crate::errors::DevloopError;
    use crate::watch::WatchEvent;

    fn change() -> WatchMessage {
        WatchMessage::Event(WatchEvent {
            path: PathBuf::from("/proj/a.txt"),
            kind: EventKind::Any,
            paths: vec![PathBuf::from("/proj/a.txt")],
        })
    }

    #[test]
    fn change_without_build_restarts_directly() {
        let mut core = EngineCore::new(false, RuntimeOptions { initial_run: false });
        assert!(core.startup().is_empty());

        let step = core.on_message(&change());
        assert!(step.keep_running);
        assert_eq!(step.commands, vec![EngineCommand::Restart]);
        assert_eq!(core.changes_seen(), 1);
    }

    #[test]
    fn change_with_build_builds_first() {
        let mut core = EngineCore::new(true, RuntimeOptions { initial_run: true });
        assert_eq!(core.startup(), vec![EngineCommand::RunBuild]);
        assert_eq!(core.on_message(&change()).commands, vec![EngineCommand::RunBuild]);
        assert_eq!(core.on_build_finished(true), vec![EngineCommand::Restart]);
        assert!(core.on_build_finished(false).is_empty());
    }

    #[test]
    fn errors_are_counted_and_closed_exits() {
        let mut core = EngineCore::new(false, RuntimeOptions::default());
        let step = core.on_message(&WatchMessage::Error(DevloopError::Config("boom".into())));
        assert!(step.keep_running && step.commands.is_empty());
        assert_eq!(core.errors_seen(), 1);

        let step = core.on_message(&WatchMessage::Closed);
        assert!(!step.keep_running);
    }
}
