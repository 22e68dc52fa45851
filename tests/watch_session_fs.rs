// tests/watch_session_fs.rs
//
// These tests use the platform notification backend on real temporary
// directories. Registration happens asynchronously, so each test keeps
// touching the filesystem until the session reports a change.

mod common;
use crate::common::{drain_until_closed, eventually, init_tracing, with_timeout, TestResult};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::EventKind;
use tokio::sync::mpsc;
use tokio::time::timeout;

use devloop::watch::{spawn_watch, spawn_watch_set, WatchConfig, WatchEvent, WatchMessage, WatchOptions};

fn fast_config() -> WatchConfig {
    WatchConfig {
        options: WatchOptions {
            retry_delay: Duration::from_millis(20),
            max_registration_failures: 1000,
        },
        ..WatchConfig::default()
    }
}

/// Run `poke` until an event arrives, ignoring forwarded errors.
async fn poke_until_event(
    rx: &mut mpsc::Receiver<WatchMessage>,
    mut poke: impl FnMut(),
) -> WatchEvent {
    for _ in 0..50 {
        poke();
        while let Ok(msg) = timeout(Duration::from_millis(100), rx.recv()).await {
            match msg {
                Some(WatchMessage::Event(event)) => return event,
                Some(WatchMessage::Error(_)) => continue,
                Some(WatchMessage::Closed) | None => panic!("session closed before an event"),
            }
        }
    }
    panic!("no event after repeated changes");
}

/// Collect every change event that arrives within `window`.
async fn collect_events(rx: &mut mpsc::Receiver<WatchMessage>, window: Duration) -> Vec<WatchEvent> {
    let deadline = tokio::time::Instant::now() + window;
    let mut events = Vec::new();
    while let Ok(msg) = tokio::time::timeout_at(deadline, rx.recv()).await {
        match msg {
            Some(WatchMessage::Event(event)) => events.push(event),
            Some(WatchMessage::Error(_)) => continue,
            Some(WatchMessage::Closed) | None => break,
        }
    }
    events
}

fn is_write(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Modify(_) | EventKind::Create(_))
}

/// Give the session time to install its first registration.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(300)).await;
}

fn write(path: &Path, contents: &str) {
    fs::write(path, contents).expect("write test file");
}

#[tokio::test]
async fn modifying_a_watched_file_produces_an_event() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let file = dir.path().join("config.toml");
    write(&file, "a = 1");

    let (tx, mut rx) = mpsc::channel(64);
    let session = spawn_watch(&file, fast_config(), tx);

    let mut n = 0;
    let event = poke_until_event(&mut rx, || {
        n += 1;
        write(&file, &format!("a = {n}"));
    })
    .await;
    assert!(event.paths.iter().any(|p| p.ends_with("config.toml")));

    session.cancel();
    with_timeout(drain_until_closed(&mut rx)).await;
    Ok(())
}

#[tokio::test]
async fn deleting_and_recreating_a_watched_file_keeps_the_session_alive() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let file = dir.path().join("main.go");
    write(&file, "package main");

    let (tx, mut rx) = mpsc::channel(64);
    let session = spawn_watch(&file, fast_config(), tx);

    assert!(eventually(|| session.targets().is_some()).await);

    // While the file is gone nothing can be registered; the session keeps
    // retrying instead of failing.
    fs::remove_file(&file)?;
    tokio::time::sleep(Duration::from_millis(200)).await;
    write(&file, "package main");

    let mut n = 0;
    poke_until_event(&mut rx, || {
        n += 1;
        write(&file, &format!("package main // {n}"));
    })
    .await;
    assert!(!session.is_finished());

    session.cancel();
    with_timeout(drain_until_closed(&mut rx)).await;
    Ok(())
}

#[tokio::test]
async fn directory_round_trip_reports_one_change_per_write() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    write(&dir.path().join("a.txt"), "a");
    write(&dir.path().join("b.txt"), "b");

    let (tx, mut rx) = mpsc::channel(64);
    let session = spawn_watch(dir.path(), fast_config(), tx);

    assert!(eventually(|| session.targets().is_some()).await);
    let listing = session.targets().map(|t| t.dirs[0].clone()).expect("directory target");
    let root = listing.root().to_path_buf();
    assert!(listing.contains_file(&root.join("a.txt")));
    assert!(listing.contains_file(&root.join("b.txt")));
    assert!(!listing.contains_file(&root.join("c.txt")));
    settle().await;

    write(&dir.path().join("a.txt"), "a2");
    let events = collect_events(&mut rx, Duration::from_secs(2)).await;
    assert_eq!(events.len(), 1, "expected exactly one change, got {events:?}");
    assert!(is_write(&events[0].kind), "unexpected kind {:?}", events[0].kind);
    assert!(events[0].path.starts_with(&root));

    write(&dir.path().join("c.txt"), "c");
    let events = collect_events(&mut rx, Duration::from_secs(2)).await;
    assert_eq!(events.len(), 1, "expected exactly one change, got {events:?}");
    assert!(is_write(&events[0].kind), "unexpected kind {:?}", events[0].kind);
    assert!(events[0].path.starts_with(&root));

    // The reload after the event picks the new file up.
    assert!(eventually(|| listing.contains_file(&root.join("c.txt"))).await);

    session.cancel();
    with_timeout(drain_until_closed(&mut rx)).await;
    Ok(())
}

#[tokio::test]
async fn reading_watched_files_is_not_a_change() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let main = dir.path().join("main.rs");
    write(&main, "fn main() {}");

    let (tx, mut rx) = mpsc::channel(64);
    let session = spawn_watch(dir.path(), fast_config(), tx);

    assert!(eventually(|| session.targets().is_some()).await);
    settle().await;

    let contents = fs::read_to_string(&main)?;
    assert_eq!(contents, "fn main() {}");
    let events = collect_events(&mut rx, Duration::from_secs(1)).await;
    assert!(events.is_empty(), "read produced events: {events:?}");

    session.cancel();
    with_timeout(drain_until_closed(&mut rx)).await;
    Ok(())
}

#[tokio::test]
async fn new_subdirectories_enter_the_snapshot() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    write(&dir.path().join("a.txt"), "a");

    let (tx, mut rx) = mpsc::channel(64);
    let session = spawn_watch(dir.path(), fast_config(), tx);

    assert!(eventually(|| session.targets().is_some()).await);
    let listing = session.targets().map(|t| t.dirs[0].clone()).expect("directory target");
    let root = listing.root().to_path_buf();

    fs::create_dir(dir.path().join("nested"))?;
    let mut rounds = 0;
    while !listing.snapshot().contains_key(&root.join("nested")) {
        rounds += 1;
        assert!(rounds < 50, "nested directory never showed up in the snapshot");
        poke_until_event(&mut rx, || write(&dir.path().join("trigger.txt"), "t")).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    session.cancel();
    with_timeout(drain_until_closed(&mut rx)).await;
    Ok(())
}

#[tokio::test]
async fn watch_set_mixes_files_and_directories() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let src = dir.path().join("src");
    fs::create_dir(&src)?;
    write(&src.join("lib.rs"), "");
    let manifest = dir.path().join("Cargo.toml");
    write(&manifest, "[package]");

    let roots: Vec<PathBuf> = vec![src.clone(), manifest.clone(), dir.path().join("missing")];
    let (tx, mut rx) = mpsc::channel(64);
    let session = spawn_watch_set(roots, fast_config(), tx);

    let mut n = 0;
    let event = poke_until_event(&mut rx, || {
        n += 1;
        write(&manifest, &format!("[package] # {n}"));
    })
    .await;
    assert!(event.paths.iter().any(|p| p.ends_with("Cargo.toml")));

    let targets = session.targets().expect("targets");
    assert_eq!(targets.dirs.len(), 1);
    assert_eq!(targets.files.len(), 1);

    session.cancel();
    with_timeout(drain_until_closed(&mut rx)).await;
    Ok(())
}
