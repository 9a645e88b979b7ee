//! Job watcher state machine for pbs-bullet.
//!
//! Tracks one PBS job from queued to finished, kills it when a node runs
//! low on memory, and answers commands pushed to its listener.

pub mod dispatch;
pub mod error;
pub mod events;
pub mod messages;
pub mod watcher;

#[cfg(test)]
mod testing;

pub use dispatch::{parse_commands, RemoteCommand};
pub use error::WatchError;
pub use events::{NotifyEvent, NotifyEvents, UnknownEvent};
pub use messages::Note;
pub use watcher::{JobPhase, Watcher, WatcherConfig};
