//! Time parsing utilities for PBS output.

use chrono::{NaiveDateTime, TimeDelta};
use std::time::Duration;

/// Timestamp layout used by `qstat -f` (e.g. "Wed Oct 14 09:30:00 2026").
pub const PBS_TIMESTAMP_FORMAT: &str = "%a %b %d %H:%M:%S %Y";

/// Parse a PBS timestamp such as `start_time = Wed Oct 14 09:30:00 2026`.
///
/// Returns None for empty strings or anything that doesn't match.
pub fn parse_pbs_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    NaiveDateTime::parse_from_str(s, PBS_TIMESTAMP_FORMAT).ok()
}

/// Format a timestamp the way PBS prints it.
pub fn format_pbs_timestamp(dt: &NaiveDateTime) -> String {
    dt.format(PBS_TIMESTAMP_FORMAT).to_string()
}

/// Estimated finish time: a PBS start timestamp plus a walltime.
///
/// Returns None if either part doesn't parse.
pub fn finish_estimate(start_time: &str, walltime: &str) -> Option<String> {
    let start = parse_pbs_timestamp(start_time)?;
    let secs = i64::try_from(parse_duration_secs(walltime)?).ok()?;
    let finish = start.checked_add_signed(TimeDelta::try_seconds(secs)?)?;
    Some(format_pbs_timestamp(&finish))
}

/// Parse a duration in various formats.
///
/// Supports:
/// - HH:MM:SS (PBS walltime, hours may exceed 24)
/// - MM:SS
/// - Seconds as integer
///
/// Returns None for empty strings, unparseable input, or totals that
/// overflow a `u64` of seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() || s == "-" {
        return None;
    }

    let parts: Vec<&str> = s.split(':').collect();
    let mut values = Vec::with_capacity(parts.len());
    for part in parts {
        values.push(part.trim().parse::<u64>().ok()?);
    }

    let (h, m, s) = match values.as_slice() {
        [h, m, s] => (*h, *m, *s),
        [m, s] => (0, *m, *s),
        [s] => (0, 0, *s),
        _ => return None,
    };
    let seconds = h
        .checked_mul(3600)?
        .checked_add(m.checked_mul(60)?)?
        .checked_add(s)?;

    Some(Duration::from_secs(seconds))
}

/// Parse duration to seconds, see [`parse_duration`].
pub fn parse_duration_secs(s: &str) -> Option<u64> {
    parse_duration(s).map(|d| d.as_secs())
}

/// Format seconds as HH:MM:SS, letting hours run past 24 like PBS does.
pub fn format_hms(seconds: u64) -> String {
    let hours = seconds / 3600;
    let mins = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, mins, secs)
}
