//! Events a watcher can send notifications for.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NotifyEvent {
    /// Job seen running for the first time
    Start,
    /// Job left the running state
    Finish,
    /// Job killed for low memory
    Kill,
    /// Watcher hit a fatal polling error
    Error,
}

impl NotifyEvent {
    pub const ALL: [NotifyEvent; 4] = [Self::Start, Self::Finish, Self::Kill, Self::Error];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Finish => "finish",
            Self::Kill => "kill",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for NotifyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown event {0:?}, expected one of start, finish, kill, error")]
pub struct UnknownEvent(pub String);

impl FromStr for NotifyEvent {
    type Err = UnknownEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "start" => Ok(Self::Start),
            "finish" => Ok(Self::Finish),
            "kill" | "killed" => Ok(Self::Kill),
            "error" | "fail" => Ok(Self::Error),
            other => Err(UnknownEvent(other.to_string())),
        }
    }
}

/// Subscribed events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyEvents(BTreeSet<NotifyEvent>);

impl NotifyEvents {
    pub fn all() -> Self {
        NotifyEvent::ALL.into_iter().collect()
    }

    pub fn none() -> Self {
        Self(BTreeSet::new())
    }

    pub fn contains(&self, event: NotifyEvent) -> bool {
        self.0.contains(&event)
    }
}

impl Default for NotifyEvents {
    fn default() -> Self {
        Self::all()
    }
}

impl FromIterator<NotifyEvent> for NotifyEvents {
    fn from_iter<I: IntoIterator<Item = NotifyEvent>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
