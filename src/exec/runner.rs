// src/exec/runner.rs

//! Fire-and-forget command runner.
//!
//! Every `true` on the control channel launches each configured command once,
//! without waiting for any of them, then calls the `done` hook. `false` is
//! ignored. Closing the channel ends the runner; launched processes keep
//! running.

use std::process::Stdio;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::exec::process::CommandSpec;

/// Spawn the runner task. Returns the control sender and the task handle.
///
/// Command lines are split on whitespace; a line with fewer than two words
/// is skipped.
pub fn spawn_command_runner(
    commands: Vec<String>,
    mut done: Option<Box<dyn FnMut() + Send>>,
) -> (mpsc::Sender<bool>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<bool>(1);

    let specs: Vec<CommandSpec> = commands
        .iter()
        .filter_map(|line| CommandSpec::parse(line))
        .filter(|spec| {
            let keep = !spec.args.is_empty();
            if !keep {
                debug!(cmd = %spec, "skipping command without arguments");
            }
            keep
        })
        .collect();

    let join = tokio::spawn(async move {
        while let Some(run) = rx.recv().await {
            if !run {
                continue;
            }

            info!(count = specs.len(), "running commands");
            for spec in &specs {
                let mut cmd = spec.to_command();
                cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
                match cmd.spawn() {
                    Ok(child) => debug!(cmd = %spec, pid = ?child.id(), "command launched"),
                    Err(err) => error!(cmd = %spec, error = %err, "error executing command"),
                }
            }

            if let Some(done) = done.as_mut() {
                done();
            }
        }
        debug!("command runner finished (channel closed)");
    });

    (tx, join)
}
