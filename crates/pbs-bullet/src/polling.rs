//! Fixed-interval driver for a watcher.

use bullet_notify::NotificationChannel;
use bullet_pbs::{JobControl, MemoryProbe};
use bullet_watcher::{JobPhase, WatchError, Watcher};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{interval, MissedTickBehavior};

#[derive(Error, Debug)]
pub enum PollError {
    #[error(transparent)]
    Watch(#[from] WatchError),
    #[error("Interrupted, watcher stopped")]
    Interrupted,
}

/// Configuration for the poll loop.
#[derive(Debug, Clone)]
pub struct PollingConfig {
    /// Time between status polls.
    pub interval: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
        }
    }
}

pub struct PollLoop {
    config: PollingConfig,
}

/// Resolves on Ctrl-C. If the handler cannot be installed it never
/// resolves, so the loop runs until the job ends.
pub async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

impl PollLoop {
    pub fn new(config: PollingConfig) -> Self {
        Self { config }
    }

    /// Update `watcher` every interval until the job finishes or
    /// `shutdown` resolves.
    ///
    /// One update is in flight at a time. Shutdown abandons the current
    /// update; the listener is unregistered on every way out.
    pub async fn run<J, P, C, S>(
        &self,
        watcher: &mut Watcher<J, P, C>,
        shutdown: S,
    ) -> Result<(), PollError>
    where
        J: JobControl,
        P: MemoryProbe,
        C: NotificationChannel,
        S: Future<Output = ()>,
    {
        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            let interrupted = tokio::select! {
                _ = ticker.tick() => false,
                _ = &mut shutdown => true,
            };
            if interrupted {
                return Self::interrupted(watcher).await;
            }

            let outcome = tokio::select! {
                result = watcher.update() => Some(result),
                _ = &mut shutdown => None,
            };
            match outcome {
                None => return Self::interrupted(watcher).await,
                Some(Ok(JobPhase::Finished)) => {
                    tracing::info!("Job {} done, watcher exiting", watcher.job_id());
                    return Ok(());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    async fn interrupted<J, P, C>(watcher: &mut Watcher<J, P, C>) -> Result<(), PollError>
    where
        J: JobControl,
        P: MemoryProbe,
        C: NotificationChannel,
    {
        tracing::warn!("Interrupted, stopping watcher for job {}", watcher.job_id());
        watcher.remove_notifier().await;
        Err(PollError::Interrupted)
    }
}
