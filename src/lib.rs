// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod watch;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_optional;
use crate::config::model::{BuildSection, ConfigFile, RunSection};
use crate::config::validate::validate_config;
use crate::engine::{CommandBuilder, EngineCore, Runtime, RuntimeOptions};
use crate::exec::{spawn_supervisor, SupervisorHooks};
use crate::watch::{
    identity_mapper, spawn_watch, spawn_watch_set, PathFilter, WatchConfig, WatchMessage,
};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading + CLI overrides
/// - the watch session
/// - the restart supervisor
/// - the engine runtime that connects them
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = effective_config(&args)?;
    validate_config(&cfg)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let Some(run) = cfg.run.as_ref() else {
        // validate_config guarantees a [run] section.
        return Err(anyhow::anyhow!("no command to run"));
    };

    let filter = PathFilter::from_excludes(&cfg.watch.exclude, cfg.watch.default_excludes)?;
    let watch_config = WatchConfig {
        filter,
        mapper: identity_mapper(),
        options: cfg.watch.options(),
    };

    // Watch message channel.
    let (events_tx, events_rx) = mpsc::channel::<WatchMessage>(64);

    let session = match cfg.watch.paths.as_slice() {
        [single] => spawn_watch(single.clone(), watch_config, events_tx),
        paths => spawn_watch_set(paths.to_vec(), watch_config, events_tx),
    };

    let supervisor = spawn_supervisor(
        run.command(),
        run.supervisor_options(),
        SupervisorHooks::default(),
    );

    // Ctrl-C → cancel the watch session; the runtime then sees `Closed`.
    {
        let canceller = session.canceller();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("Ctrl+C received; shutting down");
            canceller.cancel();
        });
    }

    let builder = cfg
        .build
        .as_ref()
        .and_then(BuildSection::command)
        .map(CommandBuilder::new);

    let options = RuntimeOptions {
        initial_run: !args.no_initial_run,
    };

    // Pure core plus the async IO shell around it.
    let core = EngineCore::new(builder.is_some(), options);
    let runtime = Runtime::new(core, events_rx, builder, supervisor);
    runtime.run().await?;

    session.join().await?;
    Ok(())
}

/// Load the config file (if any) and layer the CLI flags on top.
///
/// - `--watch` replaces `[watch].paths`
/// - `--exclude` is appended to `[watch].exclude`
/// - `--build` replaces `[build]`
/// - a trailing command replaces `[run]`, keeping its stop timeout
pub fn effective_config(args: &CliArgs) -> Result<ConfigFile> {
    let mut cfg = load_optional(args.config.as_deref())?;

    if !args.watch.is_empty() {
        cfg.watch.paths = args.watch.clone();
    }
    cfg.watch.exclude.extend(args.exclude.iter().cloned());

    if let Some(build) = &args.build {
        cfg.build = Some(BuildSection {
            cmd: build.clone(),
            cwd: None,
        });
    }

    if let Some((program, rest)) = args.command.split_first() {
        let mut run = RunSection::new(program.clone(), rest.to_vec());
        if let Some(previous) = &cfg.run {
            run.stop_timeout_ms = previous.stop_timeout_ms;
        }
        cfg.run = Some(run);
    }

    Ok(cfg)
}

/// Simple dry-run output: print what would be watched, built and run.
fn print_dry_run(cfg: &ConfigFile) {
    println!("devloop dry-run");
    println!();

    println!("watch ({}):", cfg.watch.paths.len());
    for path in &cfg.watch.paths {
        println!("  - {}", path.display());
    }
    if !cfg.watch.exclude.is_empty() {
        println!("  exclude: {:?}", cfg.watch.exclude);
    }
    println!("  default_excludes: {}", cfg.watch.default_excludes);
    println!("  retry_delay_ms: {}", cfg.watch.retry_delay_ms);
    println!(
        "  max_registration_failures: {}",
        cfg.watch.max_registration_failures
    );

    if let Some(cmd) = cfg.build.as_ref().and_then(BuildSection::command) {
        println!("build: {cmd}");
    }

    if let Some(run) = &cfg.run {
        println!("run: {}", run.command());
        println!("  stop_timeout_ms: {}", run.stop_timeout_ms);
    }

    debug!("dry-run complete (no execution)");
}
