// src/watch/sink.rs

//! Outbound side of a watch session.
//!
//! A session reports through a [`WatchSink`]: change events, recoverable
//! errors, and a final [`WatchMessage::Closed`]. The same sink carries the
//! session's cancellation source ([`CloseNotify`]). The sink never reads
//! anything back from the consumer.

use std::path::PathBuf;

use notify::{Event, EventKind};
use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::errors::DevloopError;

/// A single filesystem change, as delivered by the notification backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    /// The path the backend attributed the change to (its first path).
    pub path: PathBuf,
    pub kind: EventKind,
    /// Every path carried by the underlying notification.
    pub paths: Vec<PathBuf>,
}

impl From<Event> for WatchEvent {
    fn from(event: Event) -> Self {
        Self {
            path: event.paths.first().cloned().unwrap_or_default(),
            kind: event.kind,
            paths: event.paths,
        }
    }
}

/// Messages emitted by a watch session.
#[derive(Debug)]
pub enum WatchMessage {
    Event(WatchEvent),
    Error(DevloopError),
    /// The session ended. Nothing follows this message.
    Closed,
}

/// Cancellation source for a session.
///
/// Fires when the owner cancels explicitly or drops its cancel handle.
#[derive(Debug, Clone)]
pub struct CloseNotify {
    rx: watch::Receiver<bool>,
}

impl CloseNotify {
    /// Create a cancellation pair. Sending `true` (or dropping the sender)
    /// cancels.
    pub fn pair() -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        (tx, Self { rx })
    }

    /// Resolve once cancellation has been requested.
    pub async fn notified(&mut self) {
        // Err means the sender was dropped, which counts as cancellation.
        let _ = self.rx.wait_for(|closed| *closed).await;
    }

    pub fn is_closed(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }
}

/// Event/error emitter plus cancellation source handed to a watch session.
#[derive(Debug)]
pub struct WatchSink {
    tx: mpsc::Sender<WatchMessage>,
    close: CloseNotify,
}

impl WatchSink {
    pub fn new(tx: mpsc::Sender<WatchMessage>, close: CloseNotify) -> Self {
        Self { tx, close }
    }

    /// Forward a change event. Returns false if the consumer is gone.
    pub async fn reply(&self, event: WatchEvent) -> bool {
        self.send(WatchMessage::Event(event)).await
    }

    /// Forward a recoverable or fatal error. Returns false if the consumer is
    /// gone.
    pub async fn reply_error(&self, err: impl Into<DevloopError>) -> bool {
        self.send(WatchMessage::Error(err.into())).await
    }

    pub fn close_notify(&self) -> CloseNotify {
        self.close.clone()
    }

    /// Signal the end of the session.
    pub async fn close(self) {
        self.send(WatchMessage::Closed).await;
    }

    async fn send(&self, msg: WatchMessage) -> bool {
        match self.tx.send(msg).await {
            Ok(()) => true,
            Err(err) => {
                debug!(message = ?err.0, "watch consumer dropped; discarding message");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dropping_the_sender_counts_as_cancellation() {
        let (tx, mut close) = CloseNotify::pair();
        assert!(!close.is_closed());
        drop(tx);
        close.notified().await;
        assert!(close.is_closed());
    }

    #[tokio::test]
    async fn sink_reports_consumer_gone() {
        let (tx, rx) = mpsc::channel(1);
        let (_cancel, close) = CloseNotify::pair();
        let sink = WatchSink::new(tx, close);
        drop(rx);
        assert!(!sink.reply_error(DevloopError::Config("x".into())).await);
    }
}
