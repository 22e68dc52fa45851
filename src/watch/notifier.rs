// src/watch/notifier.rs

//! Filesystem-notification primitive.
//!
//! The watch loop opens one [`NotifyHandle`] per iteration, registers its
//! paths, waits for a single outcome and drops the handle. [`Notifier`] is
//! the factory; production code uses [`RecommendedNotifier`] (the `notify`
//! crate's platform backend), tests provide scripted implementations.

use std::fmt;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::errors::Result;

/// One live registration with the OS watcher. Dropping it releases every
/// watch descriptor it holds.
pub trait NotifyHandle: Send {
    /// Register a single path (non-recursively).
    fn add(&mut self, path: &Path) -> Result<()>;

    /// Wait for the next event or error.
    ///
    /// `None` means the backend shut down and nothing more will arrive.
    fn next(&mut self) -> Pin<Box<dyn Future<Output = Option<notify::Result<Event>>> + Send + '_>>;
}

/// Factory for fresh notification handles.
pub trait Notifier: Send + Sync {
    fn open(&self) -> Result<Box<dyn NotifyHandle>>;
}

/// Notifier backed by `notify::RecommendedWatcher`.
#[derive(Debug, Clone, Default)]
pub struct RecommendedNotifier {
    config: Config,
}

impl RecommendedNotifier {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl Notifier for RecommendedNotifier {
    fn open(&self) -> Result<Box<dyn NotifyHandle>> {
        // Channel from the blocking notify callback into the async world.
        let (tx, rx) = mpsc::unbounded_channel::<notify::Result<Event>>();

        let watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                // The receiver is gone once the handle is dropped; late
                // events from the backend thread are discarded.
                let _ = tx.send(res);
            },
            self.config,
        )?;

        Ok(Box::new(RecommendedHandle { watcher, rx }))
    }
}

struct RecommendedHandle {
    watcher: RecommendedWatcher,
    rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
}

impl fmt::Debug for RecommendedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecommendedHandle").finish_non_exhaustive()
    }
}

impl NotifyHandle for RecommendedHandle {
    fn add(&mut self, path: &Path) -> Result<()> {
        self.watcher.watch(path, RecursiveMode::NonRecursive)?;
        Ok(())
    }

    fn next(&mut self) -> Pin<Box<dyn Future<Output = Option<notify::Result<Event>>> + Send + '_>> {
        Box::pin(self.rx.recv())
    }
}
