#![allow(dead_code)]

use std::error::Error;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use devloop::watch::WatchMessage;

#[allow(unused_imports)]
pub use devloop_test_utils::{eventually, init_tracing, with_timeout};

pub type TestResult = Result<(), Box<dyn Error>>;

/// Receive the next message, failing the test after 5 seconds.
pub async fn next_message(rx: &mut mpsc::Receiver<WatchMessage>) -> WatchMessage {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a watch message")
        .expect("watch channel closed without a Closed message")
}

/// Receive messages until `Closed`, returning everything before it.
pub async fn drain_until_closed(rx: &mut mpsc::Receiver<WatchMessage>) -> Vec<WatchMessage> {
    let mut seen = Vec::new();
    loop {
        match next_message(rx).await {
            WatchMessage::Closed => return seen,
            other => seen.push(other),
        }
    }
}

/// Assert nothing arrives for `wait`.
pub async fn assert_quiet(rx: &mut mpsc::Receiver<WatchMessage>, wait: Duration) {
    if let Ok(Some(msg)) = timeout(wait, rx.recv()).await {
        panic!("expected no watch message, got {msg:?}");
    }
}
