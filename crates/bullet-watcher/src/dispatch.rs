//! Commands pushed to the watcher's listener.
//!
//! A message body is matched case-insensitively against every keyword, so
//! "please run showstart and then cancel" runs both. Matching commands run
//! in the order of [`RemoteCommand::ALL`], whatever order they appear in
//! the message.

use crate::messages;
use crate::watcher::Watcher;
use bullet_notify::{InboundMessage, NotificationChannel};
use bullet_pbs::{JobControl, MemoryProbe};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RemoteCommand {
    /// Reply with the scheduler's start estimate.
    ShowStart,
    /// Reply with remaining and requested walltime.
    Walltime,
    /// Delete the job.
    Cancel,
    /// Reply with the last free memory sample.
    FreeMem,
    /// Stop watching. The job keeps running.
    KillWatcher,
}

impl RemoteCommand {
    pub const ALL: [RemoteCommand; 5] = [
        RemoteCommand::ShowStart,
        RemoteCommand::Walltime,
        RemoteCommand::Cancel,
        RemoteCommand::FreeMem,
        RemoteCommand::KillWatcher,
    ];

    pub fn keyword(self) -> &'static str {
        match self {
            RemoteCommand::ShowStart => "showstart",
            RemoteCommand::Walltime => "walltime",
            RemoteCommand::Cancel => "cancel",
            RemoteCommand::FreeMem => "freemem",
            RemoteCommand::KillWatcher => "killwatcher",
        }
    }

    /// Whether `body` contains this command's keyword, ignoring case.
    pub fn matches(self, body: &str) -> bool {
        body.to_lowercase().contains(self.keyword())
    }
}

/// Commands found in `body`, in execution order.
pub fn parse_commands(body: &str) -> Vec<RemoteCommand> {
    RemoteCommand::ALL
        .into_iter()
        .filter(|c| c.matches(body))
        .collect()
}

impl<J, P, C> Watcher<J, P, C>
where
    J: JobControl,
    P: MemoryProbe,
    C: NotificationChannel,
{
    /// Run every command in `message` and return the keywords executed.
    ///
    /// Replies go to the message's sender when it has one. Killwatcher only
    /// acknowledges here; stopping is left to the caller. A message with no
    /// commands does nothing.
    pub async fn dispatch(&self, message: &InboundMessage) -> BTreeSet<&'static str> {
        let commands = parse_commands(&message.body);
        if commands.is_empty() {
            tracing::debug!("Ignoring push {:?}", message.body);
            return BTreeSet::new();
        }

        let target = message.source_id.as_deref();
        let mut executed = BTreeSet::new();
        for command in commands {
            tracing::info!("Running remote command {}", command.keyword());
            self.run_remote(command, target).await;
            executed.insert(command.keyword());
        }
        executed
    }

    async fn run_remote(&self, command: RemoteCommand, target: Option<&str>) {
        let note = match command {
            RemoteCommand::ShowStart => match self.control.start_estimate().await {
                Ok(output) => messages::start_estimate(self.label(), &output),
                Err(e) => {
                    tracing::error!("showstart failed: {}", e);
                    messages::start_estimate_failed(&e)
                }
            },
            RemoteCommand::Walltime => messages::walltime(self.label(), &self.attributes),
            RemoteCommand::Cancel => match self.control.kill().await {
                Ok(()) => messages::killing(self.label(), self.sample.as_ref()),
                Err(e) => {
                    tracing::error!("qdel command failed: {}", e);
                    messages::kill_failed(&e)
                }
            },
            RemoteCommand::FreeMem => messages::free_memory(self.label(), self.sample.as_ref()),
            RemoteCommand::KillWatcher => messages::stopping(self.label()),
        };
        self.notify(&note, target).await;
    }
}
