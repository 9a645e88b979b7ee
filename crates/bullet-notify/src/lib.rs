//! Push notification channel for pbs-bullet.
//!
//! A generic listener/note interface, the owned listener handle the
//! watcher keeps, and a Pushbullet implementation.

pub mod channel;
pub mod notifier;
pub mod pushbullet;

pub use channel::{ChannelError, InboundMessage, NotificationChannel};
pub use notifier::Notifier;
pub use pushbullet::PushbulletChannel;
