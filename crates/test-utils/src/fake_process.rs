use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use devloop::errors::{DevloopError, Result};
use devloop::exec::{CommandSpec, ProcessHandle, ProcessSpawner};
use tokio::sync::watch;

/// Something that happened to a fake process, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    Spawned(u32),
    Interrupted(u32),
    Killed(u32),
    Exited(u32),
}

#[derive(Debug, Default)]
struct Shared {
    events: Vec<ProcessEvent>,
    commands: Vec<String>,
    live: usize,
    max_live: usize,
    next_pid: u32,
}

/// Shared record of every fake process a [`FakeSpawner`] created.
#[derive(Debug, Clone, Default)]
pub struct ProcessLog {
    inner: Arc<Mutex<Shared>>,
}

impl ProcessLog {
    pub fn events(&self) -> Vec<ProcessEvent> {
        self.inner.lock().unwrap().events.clone()
    }

    /// Command lines passed to `spawn`, including failed attempts.
    pub fn commands(&self) -> Vec<String> {
        self.inner.lock().unwrap().commands.clone()
    }

    pub fn live(&self) -> usize {
        self.inner.lock().unwrap().live
    }

    /// Highest number of processes alive at the same time.
    pub fn max_live(&self) -> usize {
        self.inner.lock().unwrap().max_live
    }

    pub fn spawned(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, ProcessEvent::Spawned(_)))
            .count()
    }

    fn record(&self, event: ProcessEvent) {
        self.inner.lock().unwrap().events.push(event);
    }
}

/// A spawner that:
/// - never starts real processes
/// - records spawns, interrupts, kills and exits in a [`ProcessLog`]
/// - can be told to fail spawns, or to hand out processes that ignore
///   interrupts (only a kill ends them).
#[derive(Debug, Clone, Default)]
pub struct FakeSpawner {
    log: ProcessLog,
    fail_spawn: Arc<AtomicBool>,
    ignore_interrupt: bool,
}

impl FakeSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ignoring_interrupt(mut self) -> Self {
        self.ignore_interrupt = true;
        self
    }

    pub fn log(&self) -> ProcessLog {
        self.log.clone()
    }

    /// Flag that makes subsequent spawns fail while set.
    pub fn fail_spawn(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.fail_spawn)
    }
}

impl ProcessSpawner for FakeSpawner {
    fn spawn(&mut self, command: &CommandSpec) -> Result<Box<dyn ProcessHandle>> {
        let pid = {
            let mut shared = self.log.inner.lock().unwrap();
            shared.commands.push(command.to_string());

            if self.fail_spawn.load(Ordering::SeqCst) {
                return Err(DevloopError::Spawn {
                    command: command.to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "fake spawn failure"),
                });
            }

            shared.next_pid += 1;
            shared.live += 1;
            shared.max_live = shared.max_live.max(shared.live);
            let pid = shared.next_pid;
            shared.events.push(ProcessEvent::Spawned(pid));
            pid
        };

        let (exit_tx, exit_rx) = watch::channel(false);
        Ok(Box::new(FakeProcess {
            pid,
            log: self.log.clone(),
            ignore_interrupt: self.ignore_interrupt,
            exit_tx,
            exit_rx,
            exited: false,
        }))
    }
}

/// A fake child that stays alive until interrupted or killed.
#[derive(Debug)]
struct FakeProcess {
    pid: u32,
    log: ProcessLog,
    ignore_interrupt: bool,
    exit_tx: watch::Sender<bool>,
    exit_rx: watch::Receiver<bool>,
    exited: bool,
}

impl FakeProcess {
    fn mark_exited(&mut self) {
        if self.exited {
            return;
        }
        self.exited = true;
        let mut shared = self.log.inner.lock().unwrap();
        shared.live -= 1;
        shared.events.push(ProcessEvent::Exited(self.pid));
    }
}

impl ProcessHandle for FakeProcess {
    fn id(&self) -> Option<u32> {
        (!self.exited).then_some(self.pid)
    }

    fn interrupt(&mut self) -> Result<()> {
        self.log.record(ProcessEvent::Interrupted(self.pid));
        if !self.ignore_interrupt {
            self.exit_tx.send_replace(true);
        }
        Ok(())
    }

    fn kill(&mut self) -> Result<()> {
        self.log.record(ProcessEvent::Killed(self.pid));
        self.exit_tx.send_replace(true);
        Ok(())
    }

    fn wait(&mut self) -> Pin<Box<dyn Future<Output = Result<Option<i32>>> + Send + '_>> {
        Box::pin(async move {
            self.exit_rx
                .wait_for(|exited| *exited)
                .await
                .map_err(|e| DevloopError::Other(e.into()))?;
            self.mark_exited();
            Ok(Some(0))
        })
    }
}

impl Drop for FakeProcess {
    fn drop(&mut self) {
        self.mark_exited();
    }
}
