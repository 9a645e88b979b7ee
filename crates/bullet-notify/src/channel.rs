//! Notification channel interface.

use std::future::Future;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Failed to register listener {name}: {reason}")]
    Registration { name: String, reason: String },
    #[error("Channel request failed: {0}")]
    Http(String),
    #[error("Failed to decode channel response: {0}")]
    Decode(String),
    #[error("Channel task failed: {0}")]
    Task(String),
}

/// A message pushed to this watcher's listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Free-text body
    pub body: String,

    /// Listener that sent it, if any; replies go back there.
    pub source_id: Option<String>,
}

impl InboundMessage {
    pub fn new(body: impl Into<String>, source_id: Option<String>) -> Self {
        Self {
            body: body.into(),
            source_id,
        }
    }
}

/// Pub/sub transport the watcher registers on.
///
/// Listener ids are opaque strings handed out by `register`.
pub trait NotificationChannel {
    /// Register a listener under `display_name` and return its id.
    fn register(
        &self,
        display_name: &str,
    ) -> impl Future<Output = Result<String, ChannelError>> + Send;

    fn unregister(&self, listener_id: &str)
    -> impl Future<Output = Result<(), ChannelError>> + Send;

    /// Send a note from `listener_id`, to `target` or to every listener.
    fn send(
        &self,
        listener_id: &str,
        title: &str,
        body: &str,
        target: Option<&str>,
    ) -> impl Future<Output = Result<(), ChannelError>> + Send;

    /// Fetch and remove every message waiting for `listener_id`,
    /// oldest first. Fetched messages are gone from the server.
    fn poll_and_drain(
        &self,
        listener_id: &str,
    ) -> impl Future<Output = Result<Vec<InboundMessage>, ChannelError>> + Send;
}
