//! Owned listener registration.

use crate::channel::{ChannelError, InboundMessage, NotificationChannel};

/// A live listener on a notification channel.
///
/// Created by [`Notifier::register`] and torn down by [`Notifier::release`].
/// Unregistering is async, so dropping a notifier without releasing it
/// leaves the listener behind on the server; that is logged.
pub struct Notifier<C: NotificationChannel> {
    channel: C,
    listener_id: String,
    display_name: String,
    released: bool,
}

impl<C: NotificationChannel> Notifier<C> {
    /// Register `display_name` on `channel`.
    pub async fn register(
        channel: C,
        display_name: impl Into<String>,
    ) -> Result<Self, ChannelError> {
        let display_name = display_name.into();
        tracing::debug!("Registering listener {}", display_name);
        let listener_id = channel.register(&display_name).await?;
        tracing::info!("Registered listener {} as {}", display_name, listener_id);
        Ok(Self {
            channel,
            listener_id,
            display_name,
            released: false,
        })
    }

    pub fn listener_id(&self) -> &str {
        &self.listener_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub async fn send(
        &self,
        title: &str,
        body: &str,
        target: Option<&str>,
    ) -> Result<(), ChannelError> {
        tracing::debug!("Sending note {:?} to {}", title, target.unwrap_or("all listeners"));
        self.channel
            .send(&self.listener_id, title, body, target)
            .await
    }

    /// Messages pushed to this listener since the last drain, oldest first.
    pub async fn drain(&self) -> Result<Vec<InboundMessage>, ChannelError> {
        self.channel.poll_and_drain(&self.listener_id).await
    }

    /// Unregister the listener.
    pub async fn release(mut self) -> Result<(), ChannelError> {
        tracing::debug!("Unregistering listener {}", self.listener_id);
        self.released = true;
        self.channel.unregister(&self.listener_id).await
    }
}

impl<C: NotificationChannel> Drop for Notifier<C> {
    fn drop(&mut self) {
        if !self.released {
            tracing::warn!(
                "Listener {} ({}) dropped without unregistering",
                self.display_name,
                self.listener_id
            );
        }
    }
}
