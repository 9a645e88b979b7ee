//! Command execution utilities for scheduler queries.

use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Error type for command execution.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Empty command template")]
    Empty,
    #[error("Failed to execute {command}: {error}")]
    Execution { command: String, error: String },
    #[error("Command {command} failed ({status}): {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },
    #[error("Command {command} timed out after {seconds}s")]
    Timeout { command: String, seconds: u64 },
}

/// Build a command from an argument vector, appending `extra` arguments.
///
/// The first element is the program, the rest are passed through verbatim.
pub fn command_from_argv<S: AsRef<str>>(
    argv: &[S],
    extra: &[&str],
) -> Result<Command, CommandError> {
    let (program, args) = argv.split_first().ok_or(CommandError::Empty)?;
    let mut cmd = Command::new(AsRef::<str>::as_ref(program));
    cmd.args(args.iter().map(AsRef::<str>::as_ref));
    cmd.args(extra);
    Ok(cmd)
}

/// Execute a command and return stdout as a string.
///
/// The child is killed if it does not finish within `timeout`, so a hung
/// scheduler command cannot stall the caller.
pub async fn run_command(
    cmd: &mut Command,
    name: &str,
    timeout: Duration,
) -> Result<String, CommandError> {
    cmd.kill_on_drop(true);
    tracing::trace!("Running {}", name);

    let output = match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(result) => result.map_err(|e| CommandError::Execution {
            command: name.to_string(),
            error: e.to_string(),
        })?,
        Err(_) => {
            return Err(CommandError::Timeout {
                command: name.to_string(),
                seconds: timeout.as_secs(),
            });
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CommandError::Failed {
            command: name.to_string(),
            status: output.status.to_string(),
            stderr: stderr.trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Run an argument vector with extra trailing arguments, see [`run_command`].
pub async fn run_argv<S: AsRef<str>>(
    argv: &[S],
    extra: &[&str],
    timeout: Duration,
) -> Result<String, CommandError> {
    let mut cmd = command_from_argv(argv, extra)?;
    let name = argv
        .first()
        .map(|s| AsRef::<str>::as_ref(s).to_string())
        .unwrap_or_default();
    run_command(&mut cmd, &name, timeout).await
}
