//! PBS job types.

use crate::status::StatusError;
use std::collections::{BTreeSet, HashMap};

/// Attribute keys consumed from `qstat -f`.
pub mod keys {
    pub const JOB_STATE: &str = "job_state";
    pub const JOB_NAME: &str = "Job_Name";
    pub const EXEC_HOST: &str = "exec_host";
    pub const START_TIME: &str = "start_time";
    pub const WALLTIME_REMAINING: &str = "Walltime.Remaining";
    pub const WALLTIME_REQUESTED: &str = "Resource_List.walltime";
}

/// State code PBS reports for a running job.
pub const RUNNING_STATE: &str = "R";

/// Names of the nodes a job executes on.
pub type NodeSet = BTreeSet<String>;

/// Who the watcher is watching and how to talk to the scheduler about it.
///
/// Each command is an argument vector; the job id is appended when run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobIdentity {
    /// PBS job ID
    pub job_id: String,

    /// Status query, e.g. `qstat -f`
    pub status_command: Vec<String>,

    /// Job deletion, e.g. `qdel`
    pub kill_command: Vec<String>,

    /// Start-time estimate, e.g. `showstart`
    pub start_estimate_command: Vec<String>,
}

impl JobIdentity {
    pub fn new(
        job_id: impl Into<String>,
        status_command: Vec<String>,
        kill_command: Vec<String>,
        start_estimate_command: Vec<String>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            status_command,
            kill_command,
            start_estimate_command,
        }
    }

    /// Identity using the stock PBS/Moab tool names.
    pub fn with_default_commands(job_id: impl Into<String>) -> Self {
        Self::new(
            job_id,
            vec!["qstat".to_string(), "-f".to_string()],
            vec!["qdel".to_string()],
            vec!["showstart".to_string()],
        )
    }
}

/// Job attributes parsed from one `qstat -f` poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobAttributes {
    values: HashMap<String, String>,
}

impl JobAttributes {
    pub fn new(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Look up an attribute that must be present.
    pub fn require(&self, key: &str) -> Result<&str, StatusError> {
        self.get(key)
            .ok_or_else(|| StatusError::MissingAttribute(key.to_string()))
    }

    /// Single character state code (`R`, `Q`, `H`, `E`, `C`, ...).
    pub fn job_state(&self) -> Result<&str, StatusError> {
        self.require(keys::JOB_STATE).map(str::trim)
    }

    /// Whether PBS reports the job as running. Every other state,
    /// queued or completed alike, counts as not running.
    pub fn is_running(&self) -> Result<bool, StatusError> {
        Ok(self.job_state()? == RUNNING_STATE)
    }

    pub fn job_name(&self) -> Option<&str> {
        self.get(keys::JOB_NAME)
    }

    /// Execution nodes from `exec_host`.
    pub fn nodes(&self) -> Result<NodeSet, StatusError> {
        self.require(keys::EXEC_HOST).map(parse_exec_host)
    }
}

impl FromIterator<(String, String)> for JobAttributes {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Parse an `exec_host` value such as `node01/0+node01/1+node02/0`.
///
/// Slots are dropped and duplicate nodes collapse, so token order does
/// not matter.
pub fn parse_exec_host(exec_host: &str) -> NodeSet {
    exec_host
        .split('+')
        .filter_map(|token| token.split('/').next())
        .map(str::trim)
        .filter(|node| !node.is_empty())
        .map(str::to_string)
        .collect()
}
