// src/engine/runtime.rs

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::errors::Result;
use crate::exec::{run_build, BuildOutput, CommandSpec, SupervisorHandle};
use crate::watch::WatchMessage;

use super::core::EngineCore;
use super::EngineCommand;

/// Trait abstracting how the build step is run.
///
/// Production code uses [`CommandBuilder`]; tests can provide their own
/// implementation that doesn't spawn real processes.
pub trait BuildBackend: Send {
    fn build(&mut self) -> Pin<Box<dyn Future<Output = Result<BuildOutput>> + Send + '_>>;
}

/// Runs a build command through [`run_build`].
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    command: CommandSpec,
}

impl CommandBuilder {
    pub fn new(command: CommandSpec) -> Self {
        Self { command }
    }
}

impl BuildBackend for CommandBuilder {
    fn build(&mut self) -> Pin<Box<dyn Future<Output = Result<BuildOutput>> + Send + '_>> {
        Box::pin(run_build(&self.command))
    }
}

/// IO shell around [`EngineCore`].
///
/// Reads watch messages, feeds them into the core and carries out the
/// resulting commands against the build backend and the supervisor. When
/// the watch session closes, the supervisor is shut down (stopping its
/// process) and `run` returns.
pub struct Runtime<B: BuildBackend> {
    core: EngineCore,
    events_rx: mpsc::Receiver<WatchMessage>,
    builder: Option<B>,
    supervisor: SupervisorHandle,
}

impl<B: BuildBackend> fmt::Debug for Runtime<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("has_builder", &self.builder.is_some())
            .finish_non_exhaustive()
    }
}

impl<B: BuildBackend> Runtime<B> {
    pub fn new(
        core: EngineCore,
        events_rx: mpsc::Receiver<WatchMessage>,
        builder: Option<B>,
        supervisor: SupervisorHandle,
    ) -> Self {
        Self {
            core,
            events_rx,
            builder,
            supervisor,
        }
    }

    /// Main event loop.
    pub async fn run(mut self) -> Result<()> {
        info!("devloop runtime started");

        let startup = self.core.startup();
        self.execute(startup).await?;

        loop {
            let message = match self.events_rx.recv().await {
                Some(m) => m,
                None => {
                    info!("watch channel closed; exiting");
                    break;
                }
            };

            let step = self.core.on_message(&message);
            self.execute(step.commands).await?;

            if !step.keep_running {
                info!("watch session closed; stopping runtime");
                break;
            }
        }

        let Runtime { supervisor, .. } = self;
        supervisor.shutdown().await?;
        info!("runtime exiting");
        Ok(())
    }

    /// Execute commands, including any follow-ups the core asks for.
    async fn execute(&mut self, commands: Vec<EngineCommand>) -> Result<()> {
        let mut queue: VecDeque<EngineCommand> = commands.into();

        while let Some(command) = queue.pop_front() {
            debug!(?command, "executing engine command");
            match command {
                EngineCommand::RunBuild => {
                    let success = self.build().await;
                    queue.extend(self.core.on_build_finished(success));
                }
                EngineCommand::Restart => self.supervisor.restart().await?,
            }
        }
        Ok(())
    }

    async fn build(&mut self) -> bool {
        let Some(builder) = self.builder.as_mut() else {
            return true;
        };

        match builder.build().await {
            Ok(out) => {
                if !out.output.trim().is_empty() {
                    debug!(output = %out.output.trim_end(), "build output");
                }
                true
            }
            Err(err) => {
                error!("{err}");
                false
            }
        }
    }
}
