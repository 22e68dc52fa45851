// src/exec/build.rs

//! Build step: run a command to completion and capture its output.

use std::path::Path;
use std::process::Stdio;

use tracing::{debug, info};

use crate::errors::{DevloopError, Result};
use crate::exec::process::CommandSpec;

/// Output of a successful build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutput {
    /// stdout followed by stderr.
    pub output: String,
    pub exit_code: Option<i32>,
}

/// Run `command` and wait for it.
///
/// A non-zero exit becomes [`DevloopError::Build`] carrying the captured
/// output.
pub async fn run_build(command: &CommandSpec) -> Result<BuildOutput> {
    info!(cmd = %command, "running build");

    let output = command
        .to_command()
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|source| DevloopError::Spawn {
            command: command.to_string(),
            source,
        })?;

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));

    if !output.status.success() {
        return Err(DevloopError::Build {
            command: command.to_string(),
            status: output.status.to_string(),
            output: combined,
        });
    }

    debug!(cmd = %command, bytes = combined.len(), "build succeeded");
    Ok(BuildOutput {
        output: combined,
        exit_code: output.status.code(),
    })
}

/// `go build <args...> -o <dir>/<name>` (`.exe` appended on Windows).
pub fn go_build_command(dir: &Path, name: &str, args: &[String]) -> CommandSpec {
    let name = if cfg!(windows) {
        format!("{name}.exe")
    } else {
        name.to_string()
    };
    let target = dir.join(name);

    let mut all = vec!["build".to_string()];
    all.extend(args.iter().cloned());
    all.push("-o".to_string());
    all.push(target.to_string_lossy().into_owned());
    CommandSpec::new("go", all)
}

/// Build a Go binary into `dir`.
pub async fn go_build(dir: &Path, name: &str, args: &[String]) -> Result<BuildOutput> {
    run_build(&go_build_command(dir, name, args)).await
}
