// src/watch/session.rs

//! Watch-reload loop.
//!
//! A [`WatchSession`] owns one background task that, once started, does the
//! following until cancelled or until a fatal error:
//!
//! 1. open a fresh notification handle (failure is fatal),
//! 2. register every path of the current targets,
//! 3. wait for a change, a backend error, or cancellation (access
//!    notifications such as plain reads are skipped),
//! 4. forward what arrived and drop the handle,
//! 5. reload every directory snapshot.
//!
//! A new handle per iteration keeps the registered set identical to the
//! current snapshot. Changes landing between dropping one handle and
//! installing the next are not seen.

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use notify::EventKind;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, trace, warn};

use crate::errors::{DevloopError, Result};
use crate::fs::{FileSystem, RealFileSystem};
use crate::watch::notifier::{Notifier, NotifyHandle, RecommendedNotifier};
use crate::watch::patterns::{identity_mapper, NameMapper, PathFilter};
use crate::watch::sink::{CloseNotify, WatchEvent, WatchMessage, WatchSink};
use crate::watch::target::{WatchTarget, WatchTargets};

/// Loop tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchOptions {
    /// Pause after an iteration that registered nothing (e.g. the watched
    /// file is briefly missing during an editor's atomic save).
    pub retry_delay: Duration,
    /// Consecutive empty iterations tolerated before the session gives up.
    pub max_registration_failures: u32,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_millis(250),
            max_registration_failures: 40,
        }
    }
}

/// What to watch and how to snapshot directories.
#[derive(Clone)]
pub struct WatchConfig {
    pub filter: PathFilter,
    pub mapper: NameMapper,
    pub options: WatchOptions,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            filter: PathFilter::allow_all(),
            mapper: identity_mapper(),
            options: WatchOptions::default(),
        }
    }
}

impl std::fmt::Debug for WatchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchConfig")
            .field("filter", &self.filter)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// External collaborators of a session.
#[derive(Clone)]
pub struct WatchBackend {
    pub fs: Arc<dyn FileSystem>,
    pub notifier: Arc<dyn Notifier>,
}

impl Default for WatchBackend {
    fn default() -> Self {
        Self {
            fs: Arc::new(RealFileSystem),
            notifier: Arc::new(RecommendedNotifier::default()),
        }
    }
}

/// Roots of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchRoots {
    /// One file or directory. Failing to stat it ends the session.
    Single(PathBuf),
    /// Files and directories intermixed. Roots that fail to stat are
    /// reported and skipped; the session ends only if none remain.
    Set(Vec<PathBuf>),
}

/// Cloneable handle that can cancel a session.
#[derive(Debug, Clone)]
pub struct SessionCanceller {
    tx: Arc<watch::Sender<bool>>,
}

impl SessionCanceller {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// A running (or not yet started) watch session.
///
/// Dropping the session and every [`SessionCanceller`] cloned from it
/// cancels the loop.
#[derive(Debug)]
pub struct WatchSession {
    trigger_tx: mpsc::Sender<bool>,
    canceller: SessionCanceller,
    targets: Arc<OnceLock<WatchTargets>>,
    join: JoinHandle<()>,
}

impl WatchSession {
    /// Spawn a session task that waits for [`WatchSession::start`].
    ///
    /// Everything the session observes is sent on `events_tx`; the last
    /// message is always [`WatchMessage::Closed`].
    pub fn spawn(
        roots: WatchRoots,
        config: WatchConfig,
        backend: WatchBackend,
        events_tx: mpsc::Sender<WatchMessage>,
    ) -> Self {
        let (trigger_tx, trigger_rx) = mpsc::channel::<bool>(1);
        let (cancel_tx, close) = CloseNotify::pair();
        let sink = WatchSink::new(events_tx, close);
        let targets = Arc::new(OnceLock::new());

        let join = tokio::spawn(run_session(
            roots,
            config,
            backend,
            sink,
            trigger_rx,
            Arc::clone(&targets),
        ));

        Self {
            trigger_tx,
            canceller: SessionCanceller {
                tx: Arc::new(cancel_tx),
            },
            targets,
            join,
        }
    }

    /// Send the start trigger. Returns false if the session already started
    /// or has ended.
    pub fn start(&self) -> bool {
        self.trigger_tx.try_send(true).is_ok()
    }

    pub fn cancel(&self) {
        self.canceller.cancel();
    }

    pub fn canceller(&self) -> SessionCanceller {
        self.canceller.clone()
    }

    /// Classified targets, available once the session has started and its
    /// roots were found.
    pub fn targets(&self) -> Option<&WatchTargets> {
        self.targets.get()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the session task to end without cancelling it.
    pub async fn join(self) -> Result<()> {
        let WatchSession {
            join, canceller, ..
        } = self;
        let res = join.await;
        drop(canceller);
        res.map_err(|e| DevloopError::Other(e.into()))
    }
}

/// Watch a single file or directory with the real backend, started
/// immediately.
pub fn spawn_watch(
    root: impl Into<PathBuf>,
    config: WatchConfig,
    events_tx: mpsc::Sender<WatchMessage>,
) -> WatchSession {
    let session = WatchSession::spawn(
        WatchRoots::Single(root.into()),
        config,
        WatchBackend::default(),
        events_tx,
    );
    session.start();
    session
}

/// Watch a set of files and directories with the real backend, started
/// immediately.
pub fn spawn_watch_set(
    roots: Vec<PathBuf>,
    config: WatchConfig,
    events_tx: mpsc::Sender<WatchMessage>,
) -> WatchSession {
    let session = WatchSession::spawn(
        WatchRoots::Set(roots),
        config,
        WatchBackend::default(),
        events_tx,
    );
    session.start();
    session
}

async fn run_session(
    roots: WatchRoots,
    config: WatchConfig,
    backend: WatchBackend,
    sink: WatchSink,
    mut trigger_rx: mpsc::Receiver<bool>,
    cell: Arc<OnceLock<WatchTargets>>,
) {
    let mut close = sink.close_notify();

    if !wait_for_start(&mut trigger_rx, &mut close).await {
        debug!("watch session ended before it was started");
        sink.close().await;
        return;
    }
    // Later triggers are ignored.
    drop(trigger_rx);

    let Some(targets) = classify_roots(&roots, &config, &backend, &sink).await else {
        sink.close().await;
        return;
    };
    let _ = cell.set(targets.clone());

    info!(
        dirs = targets.dirs.len(),
        files = targets.files.len(),
        "watch session started"
    );

    match watch_loop(&targets, &config.options, backend.notifier.as_ref(), &sink, &mut close).await {
        Ok(()) => info!("watch session finished"),
        Err(err) => {
            error!(error = %err, "watch session failed");
            sink.reply_error(err).await;
        }
    }

    sink.close().await;
}

/// Returns true once a `true` trigger arrives, false on cancellation or if
/// every trigger sender is gone.
async fn wait_for_start(trigger_rx: &mut mpsc::Receiver<bool>, close: &mut CloseNotify) -> bool {
    loop {
        tokio::select! {
            biased;
            _ = close.notified() => return false,
            trigger = trigger_rx.recv() => match trigger {
                Some(true) => return true,
                Some(false) => continue,
                None => return false,
            },
        }
    }
}

async fn classify_roots(
    roots: &WatchRoots,
    config: &WatchConfig,
    backend: &WatchBackend,
    sink: &WatchSink,
) -> Option<WatchTargets> {
    let mut targets = WatchTargets::default();

    match roots {
        WatchRoots::Single(root) => {
            match WatchTarget::classify(&backend.fs, root, &config.filter, &config.mapper) {
                Ok(target) => targets.push(target),
                Err(err) => {
                    error!(root = ?root, error = %err, "cannot watch root");
                    sink.reply_error(err).await;
                    return None;
                }
            }
        }
        WatchRoots::Set(roots) => {
            for root in roots {
                match WatchTarget::classify(&backend.fs, root, &config.filter, &config.mapper) {
                    Ok(target) => targets.push(target),
                    Err(err) => {
                        warn!(root = ?root, error = %err, "skipping invalid watch root");
                        sink.reply_error(err).await;
                    }
                }
            }

            if targets.is_empty() {
                info!("no valid watch roots; closing session");
                return None;
            }
        }
    }

    Some(targets)
}

/// Outcome of the three-way wait.
enum Wake {
    Cancelled,
    Event(notify::Event),
    Error(notify::Error),
    BackendClosed,
}

/// Ok on cancellation or when the consumer went away; Err on fatal failure.
async fn watch_loop(
    targets: &WatchTargets,
    options: &WatchOptions,
    notifier: &dyn Notifier,
    sink: &WatchSink,
    close: &mut CloseNotify,
) -> Result<()> {
    let mut empty_iterations = 0u32;

    loop {
        let mut handle = notifier.open()?;

        let (registered, failures) = register(handle.as_mut(), targets);
        for err in failures {
            if !sink.reply_error(err).await {
                return Ok(());
            }
        }

        let wake = if registered == 0 {
            None
        } else {
            trace!(registered, "registration installed");
            Some(wait_for_change(handle.as_mut(), close).await)
        };

        let delivered = match wake {
            Some(Wake::Cancelled) => {
                debug!("watch session cancelled");
                return Ok(());
            }
            Some(Wake::Event(event)) => {
                debug!(kind = ?event.kind, paths = ?event.paths, "change observed");
                empty_iterations = 0;
                sink.reply(WatchEvent::from(event)).await
            }
            Some(Wake::Error(err)) => {
                warn!(error = %err, "notification backend error");
                empty_iterations = 0;
                sink.reply_error(err).await
            }
            Some(Wake::BackendClosed) | None => {
                drop(handle);
                empty_iterations += 1;
                if empty_iterations >= options.max_registration_failures {
                    return Err(DevloopError::RegistrationExhausted {
                        attempts: empty_iterations,
                    });
                }
                warn!(
                    attempt = empty_iterations,
                    retry_in = ?options.retry_delay,
                    "nothing could be watched this round; retrying"
                );
                tokio::select! {
                    biased;
                    _ = close.notified() => return Ok(()),
                    _ = sleep(options.retry_delay) => {}
                }
                if !reload_all(targets, sink).await {
                    return Ok(());
                }
                continue;
            }
        };

        if !delivered {
            return Ok(());
        }

        // Released before the reload so the next iteration starts clean.
        drop(handle);

        if !reload_all(targets, sink).await {
            return Ok(());
        }
    }
}

/// Three-way wait. Access notifications (opens, reads, closes) are not
/// changes and are skipped without leaving the wait.
async fn wait_for_change(handle: &mut dyn NotifyHandle, close: &mut CloseNotify) -> Wake {
    loop {
        tokio::select! {
            biased;
            _ = close.notified() => return Wake::Cancelled,
            next = handle.next() => match next {
                Some(Ok(event)) if !is_change(&event.kind) => {
                    trace!(kind = ?event.kind, paths = ?event.paths, "ignoring access notification");
                }
                Some(Ok(event)) => return Wake::Event(event),
                Some(Err(err)) => return Wake::Error(err),
                None => return Wake::BackendClosed,
            },
        }
    }
}

/// Whether a notification describes a change to the watched tree.
pub fn is_change(kind: &EventKind) -> bool {
    !matches!(kind, EventKind::Access(_))
}

fn register(handle: &mut dyn NotifyHandle, targets: &WatchTargets) -> (usize, Vec<DevloopError>) {
    let mut registered = 0usize;
    let mut failures = Vec::new();

    targets.visit_paths(|path| match handle.add(path) {
        Ok(()) => registered += 1,
        Err(err) => {
            debug!(path = ?path, error = %err, "failed to register path");
            failures.push(err);
        }
    });

    (registered, failures)
}

/// Reload every directory snapshot, forwarding failures. Returns false if
/// the consumer went away.
async fn reload_all(targets: &WatchTargets, sink: &WatchSink) -> bool {
    for listing in &targets.dirs {
        if let Err(err) = listing.reload() {
            warn!(root = ?listing.root(), error = %err, "snapshot reload failed");
            if !sink.reply_error(err).await {
                return false;
            }
        }
    }
    true
}
