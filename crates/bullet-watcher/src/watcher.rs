//! The per-job watcher.
//!
//! Each [`Watcher::update`] polls qstat once, moves the job through
//! not started -> running -> finished, runs the free memory check while the
//! job is running, and finally drains and runs any pushed commands.

use crate::dispatch::RemoteCommand;
use crate::error::WatchError;
use crate::events::{NotifyEvent, NotifyEvents};
use crate::messages::{self, JobLabel, Note};
use bullet_notify::{NotificationChannel, Notifier};
use bullet_pbs::{
    parse_status, sample_free_memory, FreeMemorySample, JobAttributes, JobControl, JobIdentity,
    MemoryProbe, NodeSet,
};

/// Policy knobs for a watcher.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Kill the job when free memory on any one node drops below this percentage.
    pub low_mem_threshold: f64,
    /// Events that produce a notification.
    pub events: NotifyEvents,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            low_mem_threshold: 0.0,
            events: NotifyEvents::all(),
        }
    }
}

/// Where the watched job is, as far as this watcher has seen.
///
/// A job that is never seen running stays `NotStarted` forever, whether it
/// is still queued or finished before the watcher attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    NotStarted,
    Running,
    Finished,
}

pub struct Watcher<J, P, C: NotificationChannel> {
    pub(crate) identity: JobIdentity,
    pub(crate) control: J,
    probe: P,
    config: WatcherConfig,

    started: bool,
    finished: bool,
    nodes: NodeSet,
    pub(crate) job_name: Option<String>,
    pub(crate) attributes: JobAttributes,
    pub(crate) sample: Option<FreeMemorySample>,
    pub(crate) notifier: Option<Notifier<C>>,
}

impl<J, P, C> Watcher<J, P, C>
where
    J: JobControl,
    P: MemoryProbe,
    C: NotificationChannel,
{
    pub fn new(identity: JobIdentity, control: J, probe: P, config: WatcherConfig) -> Self {
        Self {
            identity,
            control,
            probe,
            config,
            started: false,
            finished: false,
            nodes: NodeSet::new(),
            job_name: None,
            attributes: JobAttributes::default(),
            sample: None,
            notifier: None,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.identity.job_id
    }

    /// Job name from qstat, or the job id until one has been seen.
    pub fn job_name(&self) -> &str {
        self.job_name.as_deref().unwrap_or(&self.identity.job_id)
    }

    pub fn phase(&self) -> JobPhase {
        match (self.started, self.finished) {
            (_, true) => JobPhase::Finished,
            (true, false) => JobPhase::Running,
            (false, false) => JobPhase::NotStarted,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Nodes captured when the job was first seen running.
    pub fn nodes(&self) -> &NodeSet {
        &self.nodes
    }

    pub fn latest_attributes(&self) -> &JobAttributes {
        &self.attributes
    }

    /// Last successful free memory sample.
    pub fn latest_sample(&self) -> Option<&FreeMemorySample> {
        self.sample.as_ref()
    }

    pub fn has_notifier(&self) -> bool {
        self.notifier.is_some()
    }

    pub(crate) fn label(&self) -> JobLabel<'_> {
        JobLabel {
            name: self.job_name(),
            id: &self.identity.job_id,
        }
    }

    /// Attach a listener on `channel`, replacing any existing one.
    ///
    /// The old listener is unregistered before the new one registers, so
    /// there is never more than one.
    pub async fn set_notifier(&mut self, channel: C) -> Result<(), WatchError> {
        self.remove_notifier().await;
        let display_name = format!("{} - {}", self.job_name(), self.identity.job_id);
        let notifier = Notifier::register(channel, display_name)
            .await
            .map_err(WatchError::Registration)?;
        self.notifier = Some(notifier);
        Ok(())
    }

    /// Unregister the listener, if any. Safe to call more than once.
    pub async fn remove_notifier(&mut self) {
        if let Some(notifier) = self.notifier.take() {
            if let Err(e) = notifier.release().await {
                tracing::error!("Failed to unregister listener: {}", e);
            }
        }
    }

    /// Refresh job attributes from qstat without acting on them.
    pub async fn poll_status(&mut self) -> Result<(), WatchError> {
        let raw = self.control.query_status().await?;
        let attributes = parse_status(&raw)?;
        if let Some(name) = attributes.job_name() {
            self.job_name = Some(name.to_string());
        }
        self.attributes = attributes;
        Ok(())
    }

    /// Run one poll cycle.
    ///
    /// Status failures are fatal: an error note goes out if subscribed and
    /// the listener is torn down before the error is returned. The same
    /// teardown happens when the job finishes or a killwatcher command
    /// arrives.
    pub async fn update(&mut self) -> Result<JobPhase, WatchError> {
        if self.finished {
            return Ok(JobPhase::Finished);
        }

        if let Err(e) = self.advance().await {
            tracing::error!("qstat failed for job {}. Bailing out: {}", self.identity.job_id, e);
            if self.config.events.contains(NotifyEvent::Error) {
                let note = messages::watcher_error(self.label(), &e);
                self.notify(&note, None).await;
            }
            self.remove_notifier().await;
            return Err(e);
        }

        let stop_requested = self.check_pushes().await;

        if stop_requested {
            self.remove_notifier().await;
            return Err(WatchError::KillRequested);
        }
        if self.finished {
            self.remove_notifier().await;
        }
        Ok(self.phase())
    }

    async fn advance(&mut self) -> Result<(), WatchError> {
        self.poll_status().await?;
        let running = self.attributes.is_running()?;

        match (self.started, running) {
            (false, true) => {
                self.nodes = self.attributes.nodes()?;
                self.started = true;
                tracing::info!(
                    "Job {} started on {}",
                    self.identity.job_id,
                    self.nodes.iter().cloned().collect::<Vec<_>>().join(", ")
                );
                if self.config.events.contains(NotifyEvent::Start) {
                    let note = messages::started(self.label(), &self.nodes, &self.attributes);
                    self.notify(&note, None).await;
                }
                self.memory_safety().await;
            }
            (true, true) => {
                tracing::debug!("Job {} is running", self.identity.job_id);
                self.memory_safety().await;
            }
            (true, false) => {
                self.finished = true;
                tracing::info!("Job {} finished", self.identity.job_id);
                if self.config.events.contains(NotifyEvent::Finish) {
                    let note = messages::finished(self.label());
                    self.notify(&note, None).await;
                }
            }
            (false, false) => {
                tracing::debug!(
                    "Job {} not running (state {})",
                    self.identity.job_id,
                    self.attributes.job_state().unwrap_or("?")
                );
            }
        }
        Ok(())
    }

    /// Sample free memory and kill the job if any node is below threshold.
    ///
    /// A failed sample is logged and never leads to a kill.
    async fn memory_safety(&mut self) {
        let nodes = self.nodes.iter().cloned().collect::<Vec<_>>().join(", ");
        tracing::debug!("Checking memory on {}", nodes);

        let sample = match sample_free_memory(&self.probe, &self.nodes).await {
            Ok(sample) => sample,
            Err(e) => {
                tracing::error!("Freemem check failed: {}", e);
                return;
            }
        };
        tracing::debug!("Free memory - {}", sample);

        let threshold = self.config.low_mem_threshold;
        let violated = sample.any_below(threshold);
        self.sample = Some(sample);
        if !violated {
            return;
        }

        tracing::warn!(
            "Free memory below {}% on job {}. Killing the job.",
            threshold,
            self.identity.job_id
        );
        if let Err(e) = self.control.kill().await {
            tracing::error!("qdel command failed: {}", e);
        }
        if self.config.events.contains(NotifyEvent::Kill) {
            let note = messages::killing(self.label(), self.sample.as_ref());
            self.notify(&note, None).await;
        }
    }

    /// Drain pushed messages and run them oldest first. Returns whether a
    /// killwatcher command was among them.
    async fn check_pushes(&mut self) -> bool {
        let Some(notifier) = &self.notifier else {
            return false;
        };
        let messages = match notifier.drain().await {
            Ok(messages) => messages,
            Err(e) => {
                tracing::error!("Failed to check pushes: {}", e);
                return false;
            }
        };

        for message in &messages {
            let executed = self.dispatch(message).await;
            if executed.contains(RemoteCommand::KillWatcher.keyword()) {
                return true;
            }
        }
        false
    }

    /// Send a note if a listener is attached. Failures are logged only.
    pub(crate) async fn notify(&self, note: &Note, target: Option<&str>) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        if let Err(e) = notifier.send(&note.title, &note.body, target).await {
            tracing::error!("Failed to send {:?}: {}", note.title, e);
        }
    }
}
