//! Job submission via qsub.

use bullet_parsers::{run_argv, CommandError};
use camino::Utf8Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("Failed to submit {script}: {source}")]
    Command {
        script: String,
        #[source]
        source: CommandError,
    },
    #[error("qsub printed no job id for {0}")]
    NoJobId(String),
}

/// Submit `script` and return the job id qsub assigned.
///
/// qsub prints `<id>.<server>`; the id is everything before the first dot.
pub async fn submit_job(
    submit_command: &[String],
    script: &Utf8Path,
    timeout: Duration,
) -> Result<String, SubmitError> {
    let output = run_argv(submit_command, &[script.as_str()], timeout)
        .await
        .map_err(|source| SubmitError::Command {
            script: script.to_string(),
            source,
        })?;

    let job_id = parse_job_id(&output).ok_or_else(|| SubmitError::NoJobId(script.to_string()))?;
    tracing::info!("Submitted {} as job {}", script, job_id);
    Ok(job_id)
}

fn parse_job_id(output: &str) -> Option<String> {
    let id = output.trim().split('.').next()?.trim();
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}
