// tests/supervisor_restart.rs

mod common;
use crate::common::{eventually, init_tracing, with_timeout, TestResult};

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use devloop::exec::{
    run_bin, run_go, CommandSpec, RestartSupervisor, SupervisorHooks, SupervisorOptions,
    SupervisorState,
};
use devloop_test_utils::{FakeSpawner, ProcessEvent};

use ProcessEvent::{Exited, Interrupted, Killed, Spawned};

fn server() -> CommandSpec {
    CommandSpec::new("./server", ["--port", "8080"])
}

#[tokio::test]
async fn restart_stops_old_instance_before_starting_new_one() -> TestResult {
    init_tracing();

    let spawner = FakeSpawner::new();
    let log = spawner.log();
    let handle =
        RestartSupervisor::new(spawner, server(), SupervisorOptions::default(), SupervisorHooks::default())
            .spawn();

    handle.restart().await?;
    assert!(eventually(|| log.spawned() == 1).await);

    handle.restart().await?;
    assert!(eventually(|| log.spawned() == 2).await);

    assert_eq!(
        log.events(),
        vec![Spawned(1), Interrupted(1), Exited(1), Spawned(2)]
    );
    assert_eq!(log.max_live(), 1);
    assert_eq!(log.commands()[0], "./server --port 8080");

    with_timeout(handle.shutdown()).await?;
    assert_eq!(log.live(), 0);
    Ok(())
}

#[tokio::test]
async fn stop_while_idle_does_nothing() -> TestResult {
    init_tracing();

    let spawner = FakeSpawner::new();
    let log = spawner.log();
    let handle =
        RestartSupervisor::new(spawner, server(), SupervisorOptions::default(), SupervisorHooks::default())
            .spawn();

    handle.stop().await?;
    handle.stop().await?;
    handle.restart().await?;
    handle.stop().await?;

    with_timeout(handle.shutdown()).await?;
    assert_eq!(log.events(), vec![Spawned(1), Interrupted(1), Exited(1)]);
    Ok(())
}

#[tokio::test]
async fn failed_spawn_leaves_supervisor_idle() -> TestResult {
    init_tracing();

    let spawner = FakeSpawner::new();
    let log = spawner.log();
    let fail = spawner.fail_spawn();
    fail.store(true, Ordering::SeqCst);

    let mut supervisor =
        RestartSupervisor::new(spawner, server(), SupervisorOptions::default(), SupervisorHooks::default());

    supervisor.apply(true).await;
    assert_eq!(supervisor.state(), SupervisorState::Idle);
    assert_eq!(log.commands().len(), 1);
    assert_eq!(log.spawned(), 0);

    // The next signal tries again.
    fail.store(false, Ordering::SeqCst);
    supervisor.apply(true).await;
    assert_eq!(supervisor.state(), SupervisorState::Running);
    assert_eq!(log.events(), vec![Spawned(1)]);

    supervisor.apply(false).await;
    assert_eq!(supervisor.state(), SupervisorState::Idle);
    Ok(())
}

#[tokio::test]
async fn process_ignoring_interrupt_is_killed_after_timeout() -> TestResult {
    init_tracing();

    let spawner = FakeSpawner::new().ignoring_interrupt();
    let log = spawner.log();
    let options = SupervisorOptions {
        stop_timeout: Some(Duration::from_millis(50)),
    };
    let mut supervisor = RestartSupervisor::new(spawner, server(), options, SupervisorHooks::default());

    supervisor.apply(true).await;
    with_timeout(supervisor.apply(true)).await;

    assert_eq!(
        log.events(),
        vec![Spawned(1), Interrupted(1), Killed(1), Exited(1), Spawned(2)]
    );
    assert_eq!(log.max_live(), 1);
    Ok(())
}

#[tokio::test]
async fn closing_the_channel_stops_process_and_fires_hooks() -> TestResult {
    init_tracing();

    let started = Arc::new(AtomicUsize::new(0));
    let stopped = Arc::new(AtomicBool::new(false));
    let hooks = SupervisorHooks {
        on_started: Some(Box::new({
            let started = Arc::clone(&started);
            move || {
                started.fetch_add(1, Ordering::SeqCst);
            }
        })),
        on_stopped: Some(Box::new({
            let stopped = Arc::clone(&stopped);
            move || stopped.store(true, Ordering::SeqCst)
        })),
    };

    let spawner = FakeSpawner::new();
    let log = spawner.log();
    let handle = RestartSupervisor::new(spawner, server(), SupervisorOptions::default(), hooks).spawn();

    handle.restart().await?;
    handle.restart().await?;
    with_timeout(handle.shutdown()).await?;

    assert_eq!(started.load(Ordering::SeqCst), 2);
    assert!(stopped.load(Ordering::SeqCst));
    assert_eq!(log.live(), 0);
    assert_eq!(log.events().last(), Some(&Exited(2)));
    Ok(())
}

#[tokio::test]
async fn extra_control_senders_keep_supervisor_alive() -> TestResult {
    init_tracing();

    let spawner = FakeSpawner::new();
    let log = spawner.log();
    let handle =
        RestartSupervisor::new(spawner, server(), SupervisorOptions::default(), SupervisorHooks::default())
            .spawn();

    let control = handle.control();
    let shutdown = tokio::spawn(handle.shutdown());

    control.send(true).await?;
    assert!(eventually(|| log.spawned() == 1).await);
    assert!(!shutdown.is_finished());

    drop(control);
    with_timeout(shutdown).await??;
    assert_eq!(log.live(), 0);
    Ok(())
}

fn counting_hooks() -> (SupervisorHooks, Arc<AtomicUsize>, Arc<AtomicBool>) {
    let started = Arc::new(AtomicUsize::new(0));
    let stopped = Arc::new(AtomicBool::new(false));
    let hooks = SupervisorHooks {
        on_started: Some(Box::new({
            let started = Arc::clone(&started);
            move || {
                started.fetch_add(1, Ordering::SeqCst);
            }
        })),
        on_stopped: Some(Box::new({
            let stopped = Arc::clone(&stopped);
            move || stopped.store(true, Ordering::SeqCst)
        })),
    };
    (hooks, started, stopped)
}

#[cfg(unix)]
#[tokio::test]
async fn run_bin_supervises_a_real_binary() -> TestResult {
    init_tracing();

    let (hooks, started, stopped) = counting_hooks();
    let options = SupervisorOptions {
        stop_timeout: Some(Duration::from_secs(5)),
    };
    let args = vec!["-c".to_string(), "sleep 30".to_string()];
    let handle = run_bin("sh", &args, options, hooks);

    handle.restart().await?;
    assert!(eventually(|| started.load(Ordering::SeqCst) == 1).await);

    with_timeout(handle.shutdown()).await?;
    assert!(stopped.load(Ordering::SeqCst));
    assert_eq!(started.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn run_go_shuts_down_whether_or_not_go_is_installed() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let (hooks, _started, stopped) = counting_hooks();
    let options = SupervisorOptions {
        stop_timeout: Some(Duration::from_secs(5)),
    };
    let handle = run_go(dir.path().join("main.go"), &[], options, hooks);

    // A missing toolchain is a failed start, not a crash.
    handle.restart().await?;
    tokio::time::sleep(Duration::from_millis(100)).await;

    with_timeout(handle.shutdown()).await?;
    assert!(stopped.load(Ordering::SeqCst));
    Ok(())
}

#[test]
fn debug_output_reports_state_before_spawning() {
    let supervisor = RestartSupervisor::new(
        FakeSpawner::new(),
        server(),
        SupervisorOptions::default(),
        SupervisorHooks::default(),
    );
    assert_eq!(supervisor.state(), SupervisorState::Idle);

    let text = format!("{supervisor:?}");
    assert!(text.contains("RestartSupervisor"));
    assert!(text.contains("state: Idle"));
}
