use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use devloop::errors::{DevloopError, Result};
use devloop::watch::{Notifier, NotifyHandle};
use notify::{Event, EventKind};
use tokio::sync::mpsc;

/// `None` ends the handle that receives it, as if the backend shut down.
type Feed = Option<notify::Result<Event>>;

#[derive(Debug, Default)]
struct State {
    opens: usize,
    fail_open: bool,
    registrations: Vec<Vec<PathBuf>>,
    failing: HashSet<PathBuf>,
}

/// A scripted notification backend.
///
/// Every `open` starts a new registration record. Tests push events,
/// backend errors and shutdowns through the notifier; whichever handle is
/// currently waiting receives them.
#[derive(Clone)]
pub struct FakeNotifier {
    state: Arc<Mutex<State>>,
    feed_tx: mpsc::UnboundedSender<Feed>,
    feed_rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Feed>>>,
}

impl Default for FakeNotifier {
    fn default() -> Self {
        let (feed_tx, feed_rx) = mpsc::unbounded_channel();
        Self {
            state: Arc::default(),
            feed_tx,
            feed_rx: Arc::new(tokio::sync::Mutex::new(feed_rx)),
        }
    }
}

impl FakeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.state.lock().unwrap().fail_open = fail;
    }

    /// Make registration of `path` fail until cleared.
    pub fn fail_path(&self, path: impl Into<PathBuf>) {
        self.state.lock().unwrap().failing.insert(path.into());
    }

    pub fn clear_failing(&self) {
        self.state.lock().unwrap().failing.clear();
    }

    pub fn opens(&self) -> usize {
        self.state.lock().unwrap().opens
    }

    /// Paths registered by each opened handle, oldest first.
    pub fn registrations(&self) -> Vec<Vec<PathBuf>> {
        self.state.lock().unwrap().registrations.clone()
    }

    pub fn last_registration(&self) -> Vec<PathBuf> {
        self.registrations().last().cloned().unwrap_or_default()
    }

    pub fn emit(&self, path: impl Into<PathBuf>) {
        self.emit_kind(path, EventKind::Any);
    }

    pub fn emit_kind(&self, path: impl Into<PathBuf>, kind: EventKind) {
        let event = Event::new(kind).add_path(path.into());
        let _ = self.feed_tx.send(Some(Ok(event)));
    }

    pub fn emit_error(&self, message: &str) {
        let _ = self.feed_tx.send(Some(Err(notify::Error::generic(message))));
    }

    /// End the currently waiting handle's stream.
    pub fn close_stream(&self) {
        let _ = self.feed_tx.send(None);
    }

    /// Wait until at least `n` handles have been opened.
    pub async fn wait_for_opens(&self, n: usize) {
        while self.opens() < n {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

impl Notifier for FakeNotifier {
    fn open(&self) -> Result<Box<dyn NotifyHandle>> {
        let mut state = self.state.lock().unwrap();
        if state.fail_open {
            return Err(DevloopError::Notify(notify::Error::generic("fake open failure")));
        }
        state.opens += 1;
        state.registrations.push(Vec::new());

        Ok(Box::new(FakeHandle {
            state: Arc::clone(&self.state),
            feed_rx: Arc::clone(&self.feed_rx),
        }))
    }
}

struct FakeHandle {
    state: Arc<Mutex<State>>,
    feed_rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Feed>>>,
}

impl NotifyHandle for FakeHandle {
    fn add(&mut self, path: &Path) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.failing.contains(path) {
            return Err(DevloopError::Notify(
                notify::Error::path_not_found().add_path(path.to_path_buf()),
            ));
        }
        if let Some(current) = state.registrations.last_mut() {
            current.push(path.to_path_buf());
        }
        Ok(())
    }

    fn next(&mut self) -> Pin<Box<dyn Future<Output = Option<notify::Result<Event>>> + Send + '_>> {
        Box::pin(async move {
            let mut rx = self.feed_rx.lock().await;
            rx.recv().await.flatten()
        })
    }
}
