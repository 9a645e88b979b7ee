//! Shared parsing utilities for PBS command output.
//!
//! Command execution with bounded timeouts and the time formats used
//! by `qstat`, shared by bullet-pbs and bullet-watcher.

pub mod command;
pub mod time;

pub use command::{command_from_argv, run_argv, run_command, CommandError};
pub use time::{
    finish_estimate, format_hms, format_pbs_timestamp, parse_duration, parse_duration_secs,
    parse_pbs_timestamp,
};

/// Split a whitespace-separated command template into an argument vector.
pub fn split_template(template: &str) -> Vec<String> {
    template.split_whitespace().map(str::to_string).collect()
}
