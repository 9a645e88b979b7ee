//! Parse `qstat -f` output into job attributes.

use crate::types::JobAttributes;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatusError {
    #[error("Malformed qstat output: {line:?}")]
    Malformed { line: String },
    #[error("Missing job attribute: {0}")]
    MissingAttribute(String),
}

/// Separator between attribute name and value.
const SEPARATOR: &str = " = ";

/// Wrapped values continue on the next line after a newline and a tab.
const CONTINUATION: &str = "\n\t";

/// Turn the full `qstat -f` listing of one job into attributes.
///
/// qstat frames the listing with a `Job Id:` header and a trailing blank
/// line; both are dropped. Later duplicates of a key win.
pub fn parse_status(raw: &str) -> Result<JobAttributes, StatusError> {
    let joined = raw.replace(CONTINUATION, "");
    let lines: Vec<&str> = joined.lines().collect();
    if lines.len() < 2 {
        return Err(StatusError::Malformed {
            line: raw.trim().to_string(),
        });
    }

    let mut attributes = Vec::with_capacity(lines.len() - 2);
    for line in &lines[1..lines.len() - 1] {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (key, value) = line
            .split_once(SEPARATOR)
            .ok_or_else(|| StatusError::Malformed {
                line: line.to_string(),
            })?;
        attributes.push((key.trim().to_string(), value.to_string()));
    }

    Ok(attributes.into_iter().collect())
}
