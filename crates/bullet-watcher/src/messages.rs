//! Notification titles and bodies.

use bullet_parsers::{finish_estimate, format_hms, parse_duration_secs};
use bullet_pbs::types::keys;
use bullet_pbs::{FreeMemorySample, JobAttributes, NodeSet};
use std::fmt::Display;

/// A titled note ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub title: String,
    pub body: String,
}

impl Note {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

/// Name and id of the watched job, for titles.
#[derive(Debug, Clone, Copy)]
pub struct JobLabel<'a> {
    pub name: &'a str,
    pub id: &'a str,
}

pub fn started(job: JobLabel<'_>, nodes: &NodeSet, attrs: &JobAttributes) -> Note {
    let nodes = nodes.iter().map(String::as_str).collect::<Vec<_>>().join(", ");
    let start_time = attrs.get(keys::START_TIME);
    let mut body = format!(
        "Running on nodes {}, and started {}.",
        nodes,
        start_time.unwrap_or("at an unknown time")
    );
    let due = start_time.zip(attrs.get(keys::WALLTIME_REQUESTED));
    if let Some(due) = due.and_then(|(start, walltime)| finish_estimate(start, walltime)) {
        body.push_str(&format!(" Due to finish {}.", due));
    }
    Note::new(format!("{}, id: {}, started.", job.name, job.id), body)
}

pub fn finished(job: JobLabel<'_>) -> Note {
    Note::new(format!("{}, id: {}, finished.", job.name, job.id), "")
}

pub fn killing(job: JobLabel<'_>, sample: Option<&FreeMemorySample>) -> Note {
    Note::new(
        format!("Attempting to kill job {}, id: {}.", job.name, job.id),
        free_memory_body(sample),
    )
}

pub fn watcher_error(job: JobLabel<'_>, error: &dyn Display) -> Note {
    Note::new(
        format!("{}, id: {}, watcher error.", job.name, job.id),
        error.to_string(),
    )
}

pub fn start_estimate(job: JobLabel<'_>, output: &str) -> Note {
    Note::new(
        format!("Job {} ({}) Start Time", job.name, job.id),
        output.trim(),
    )
}

pub fn start_estimate_failed(error: &dyn Display) -> Note {
    Note::new("Showstart failed.", error.to_string())
}

/// Remaining and requested walltime as `<remaining>:<requested>`.
pub fn walltime(job: JobLabel<'_>, attrs: &JobAttributes) -> Note {
    let remaining = attrs
        .require(keys::WALLTIME_REMAINING)
        .map_err(|e| e.to_string())
        .and_then(|raw| {
            parse_duration_secs(raw).ok_or_else(|| format!("Unreadable remaining walltime {raw:?}"))
        });
    let requested = attrs
        .require(keys::WALLTIME_REQUESTED)
        .map_err(|e| e.to_string());

    match remaining.and_then(|r| requested.map(|q| (r, q))) {
        Ok((remaining, requested)) => Note::new(
            format!("Job {} ({}) Walltime", job.name, job.id),
            format!("{}:{}", format_hms(remaining), requested.trim()),
        ),
        Err(reason) => Note::new("Walltime check failed.", reason),
    }
}

pub fn kill_failed(error: &dyn Display) -> Note {
    Note::new("qdel failed.", error.to_string())
}

pub fn free_memory(job: JobLabel<'_>, sample: Option<&FreeMemorySample>) -> Note {
    match sample {
        Some(_) => Note::new(
            format!("Job {} ({}) Free Memory", job.name, job.id),
            free_memory_body(sample),
        ),
        None => Note::new("Freemem check failed.", "No free memory sample taken yet."),
    }
}

pub fn stopping(job: JobLabel<'_>) -> Note {
    Note::new(
        format!("Watcher for {} ({}) stopping.", job.name, job.id),
        "The job itself is left alone.",
    )
}

fn free_memory_body(sample: Option<&FreeMemorySample>) -> String {
    match sample {
        Some(sample) => format!("Free memory - {}", sample),
        None => "Free memory - not sampled yet".to_string(),
    }
}
