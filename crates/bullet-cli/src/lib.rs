//! CLI argument parsing for pbs-bullet.

use bullet_parsers::split_template;
use bullet_pbs::JobIdentity;
use bullet_watcher::{NotifyEvent, WatcherConfig};
use camino::Utf8PathBuf;
use clap::Parser;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "pbs-bullet")]
#[command(about = "Watch a PBS job, kill it on low node memory, and push notes about it")]
pub struct Args {
    /// PBS job ID to watch
    #[arg(required_unless_present = "submit", conflicts_with = "submit")]
    pub job_id: Option<String>,

    /// Submit this script first and watch the resulting job
    #[arg(long)]
    pub submit: Option<Utf8PathBuf>,

    /// Pushbullet access token; without one no notes are sent
    #[arg(long, env = "PUSHBULLET_TOKEN", hide_env_values = true)]
    pub pushbullet_token: Option<String>,

    /// Events to send notes for
    #[arg(
        long,
        value_delimiter = ',',
        num_args = 1..,
        default_values = ["start", "finish", "kill", "error"]
    )]
    pub notify_on: Vec<NotifyEvent>,

    /// Kill the job when free memory on any node drops below this percentage
    #[arg(long, default_value = "0", value_parser = parse_percent)]
    pub low_mem: f64,

    /// Status poll interval in seconds
    #[arg(long, default_value = "300", value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_interval: u64,

    /// Timeout for every external command, in seconds
    #[arg(long, default_value = "30", value_parser = clap::value_parser!(u64).range(1..))]
    pub command_timeout: u64,

    /// Status command; the job id is appended
    #[arg(long, default_value = "qstat -f")]
    pub qstat: String,

    /// Delete command; the job id is appended
    #[arg(long, default_value = "qdel")]
    pub qdel: String,

    /// Start estimate command; the job id is appended
    #[arg(long, default_value = "showstart")]
    pub showstart: String,

    /// Submit command; the script path is appended
    #[arg(long, default_value = "qsub")]
    pub qsub: String,

    /// Remote shell used to sample memory on execution nodes
    #[arg(long, default_value = "rsh")]
    pub remote_shell: String,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Scheduler commands for `job_id`.
    pub fn identity(&self, job_id: impl Into<String>) -> JobIdentity {
        JobIdentity::new(
            job_id,
            split_template(&self.qstat),
            split_template(&self.qdel),
            split_template(&self.showstart),
        )
    }

    pub fn watcher_config(&self) -> WatcherConfig {
        WatcherConfig {
            low_mem_threshold: self.low_mem,
            events: self.notify_on.iter().copied().collect(),
        }
    }

    pub fn submit_command(&self) -> Vec<String> {
        split_template(&self.qsub)
    }

    pub fn remote_shell(&self) -> Vec<String> {
        split_template(&self.remote_shell)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout)
    }
}

fn parse_percent(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("{s:?} is not a number"))?;
    if (0.0..=100.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{value} is not a percentage between 0 and 100"))
    }
}
