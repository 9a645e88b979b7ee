//! Scheduler commands that act on the watched job.

use crate::types::JobIdentity;
use bullet_parsers::{run_argv, CommandError};
use std::future::Future;
use std::time::Duration;

/// Status, deletion and start-estimate queries for one job.
pub trait JobControl {
    /// Raw `qstat -f <job_id>` output.
    fn query_status(&self) -> impl Future<Output = Result<String, CommandError>> + Send;

    /// Delete the job. Only the exit status matters.
    fn kill(&self) -> impl Future<Output = Result<(), CommandError>> + Send;

    /// Free-text start estimate from `showstart <job_id>`.
    fn start_estimate(&self) -> impl Future<Output = Result<String, CommandError>> + Send;
}

/// Runs the identity's command templates as external processes.
#[derive(Debug, Clone)]
pub struct PbsCommands {
    identity: JobIdentity,
    timeout: Duration,
}

impl PbsCommands {
    pub fn new(identity: JobIdentity, timeout: Duration) -> Self {
        Self { identity, timeout }
    }

    pub fn identity(&self) -> &JobIdentity {
        &self.identity
    }
}

impl JobControl for PbsCommands {
    async fn query_status(&self) -> Result<String, CommandError> {
        tracing::debug!("Checking status for job {}", self.identity.job_id);
        run_argv(
            &self.identity.status_command,
            &[self.identity.job_id.as_str()],
            self.timeout,
        )
        .await
    }

    async fn kill(&self) -> Result<(), CommandError> {
        tracing::warn!("Deleting job {}", self.identity.job_id);
        run_argv(
            &self.identity.kill_command,
            &[self.identity.job_id.as_str()],
            self.timeout,
        )
        .await
        .map(|_| ())
    }

    async fn start_estimate(&self) -> Result<String, CommandError> {
        run_argv(
            &self.identity.start_estimate_command,
            &[self.identity.job_id.as_str()],
            self.timeout,
        )
        .await
    }
}
