//! In-memory scheduler, probe and channel for watcher tests.
//!
//! All three mocks share one state so that tests can assert on the order
//! of calls across them.

use crate::watcher::{Watcher, WatcherConfig};
use bullet_notify::{ChannelError, InboundMessage, NotificationChannel};
use bullet_parsers::CommandError;
use bullet_pbs::{JobControl, JobIdentity, MemoryProbe, ProbeError};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

pub const START_ESTIMATE: &str = "Estimated start time for 4242 is Thu Oct 15 01:00:00 2026";

#[derive(Default)]
pub struct State {
    log: Vec<String>,
    sent: Vec<(String, String, Option<String>)>,
    statuses: VecDeque<Result<String, String>>,
    status_polls: usize,
    kills: usize,
    fail_kills: bool,
    start_estimate: Option<String>,
    fail_start_estimate: bool,
    memory: HashMap<String, VecDeque<Option<f64>>>,
    inbox: VecDeque<Vec<InboundMessage>>,
    next_listener: usize,
    live: BTreeSet<String>,
    fail_sends: bool,
}

pub type Shared = Arc<Mutex<State>>;

fn lock(state: &Shared) -> MutexGuard<'_, State> {
    state.lock().unwrap()
}

fn failed(command: &str, stderr: &str) -> CommandError {
    CommandError::Failed {
        command: command.to_string(),
        status: "exit status: 1".to_string(),
        stderr: stderr.to_string(),
    }
}

/// Full `qstat -f` listing for job 4242.
pub fn qstat(state: &str, exec_host: Option<&str>) -> String {
    let mut out = String::from("Job Id: 4242.master\n");
    out.push_str("    Job_Name = align_reads\n");
    out.push_str(&format!("    job_state = {state}\n"));
    if let Some(exec_host) = exec_host {
        out.push_str(&format!("    exec_host = {exec_host}\n"));
    }
    out.push_str("    start_time = Wed Oct 14 22:30:00 2026\n");
    out.push_str("    Resource_List.walltime = 02:00:00\n");
    out.push_str("    Walltime.Remaining = 3532\n");
    out.push('\n');
    out
}

pub struct MockControl {
    state: Shared,
}

impl JobControl for MockControl {
    async fn query_status(&self) -> Result<String, CommandError> {
        let mut state = lock(&self.state);
        state.status_polls += 1;
        match state.statuses.pop_front() {
            Some(Ok(raw)) => Ok(raw),
            Some(Err(stderr)) => Err(failed("qstat -f 4242", &stderr)),
            None => Err(failed("qstat -f 4242", "no more statuses")),
        }
    }

    async fn kill(&self) -> Result<(), CommandError> {
        let mut state = lock(&self.state);
        state.kills += 1;
        state.log.push("kill".to_string());
        if state.fail_kills {
            return Err(failed("qdel 4242", "qdel: Unauthorized Request"));
        }
        Ok(())
    }

    async fn start_estimate(&self) -> Result<String, CommandError> {
        let state = lock(&self.state);
        if state.fail_start_estimate {
            return Err(failed("showstart 4242", "showstart: not found"));
        }
        Ok(state
            .start_estimate
            .clone()
            .unwrap_or_else(|| START_ESTIMATE.to_string()))
    }
}

pub struct MockProbe {
    state: Shared,
}

impl MemoryProbe for MockProbe {
    async fn probe_free_memory(&self, node: &str) -> Result<f64, ProbeError> {
        let mut state = lock(&self.state);
        state
            .memory
            .get_mut(node)
            .and_then(VecDeque::pop_front)
            .flatten()
            .ok_or_else(|| ProbeError::Parse {
                node: node.to_string(),
                output: String::new(),
            })
    }
}

/// Channel that hands out `listener-N` ids.
pub struct MockChannel {
    state: Shared,
    refuse: bool,
}

impl MockChannel {
    /// A channel whose registrations always fail.
    pub fn refusing(state: Shared) -> Self {
        Self {
            state,
            refuse: true,
        }
    }
}

impl NotificationChannel for MockChannel {
    async fn register(&self, display_name: &str) -> Result<String, ChannelError> {
        if self.refuse {
            return Err(ChannelError::Registration {
                name: display_name.to_string(),
                reason: "HTTP 401: invalid access token".to_string(),
            });
        }
        let mut state = lock(&self.state);
        state.log.push(format!("register {display_name}"));
        state.next_listener += 1;
        let id = format!("listener-{}", state.next_listener);
        state.live.insert(id.clone());
        Ok(id)
    }

    async fn unregister(&self, listener_id: &str) -> Result<(), ChannelError> {
        let mut state = lock(&self.state);
        state.log.push(format!("unregister {listener_id}"));
        state.live.remove(listener_id);
        Ok(())
    }

    async fn send(
        &self,
        _listener_id: &str,
        title: &str,
        body: &str,
        target: Option<&str>,
    ) -> Result<(), ChannelError> {
        let mut state = lock(&self.state);
        if state.fail_sends {
            return Err(ChannelError::Http("connection refused".to_string()));
        }
        state.log.push(format!("send {title}"));
        state
            .sent
            .push((title.to_string(), body.to_string(), target.map(str::to_string)));
        Ok(())
    }

    async fn poll_and_drain(
        &self,
        _listener_id: &str,
    ) -> Result<Vec<InboundMessage>, ChannelError> {
        Ok(lock(&self.state).inbox.pop_front().unwrap_or_default())
    }
}

/// Builds mocks over a shared state and reads back what happened.
pub struct Harness {
    state: Shared,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            state: Shared::default(),
        }
    }

    pub fn watcher(&self, config: WatcherConfig) -> Watcher<MockControl, MockProbe, MockChannel> {
        Watcher::new(
            JobIdentity::with_default_commands("4242"),
            MockControl {
                state: Arc::clone(&self.state),
            },
            MockProbe {
                state: Arc::clone(&self.state),
            },
            config,
        )
    }

    pub fn channel(&self) -> MockChannel {
        MockChannel {
            state: Arc::clone(&self.state),
            refuse: false,
        }
    }

    pub fn log_handle(&self) -> Shared {
        Arc::clone(&self.state)
    }

    pub fn push_status(&self, raw: String) {
        lock(&self.state).statuses.push_back(Ok(raw));
    }

    pub fn push_status_error(&self, stderr: &str) {
        lock(&self.state).statuses.push_back(Err(stderr.to_string()));
    }

    /// Queue one reading per cycle for `node`; `None` makes that probe fail.
    pub fn push_memory(&self, node: &str, readings: &[Option<f64>]) {
        lock(&self.state)
            .memory
            .entry(node.to_string())
            .or_default()
            .extend(readings.iter().copied());
    }

    /// Queue one drain's worth of messages, each from `phone`.
    pub fn push_inbox(&self, bodies: &[&str]) {
        let batch = bodies
            .iter()
            .map(|b| InboundMessage::new(*b, Some("phone".to_string())))
            .collect();
        lock(&self.state).inbox.push_back(batch);
    }

    pub fn push_inbox_messages(&self, messages: Vec<InboundMessage>) {
        lock(&self.state).inbox.push_back(messages);
    }

    pub fn fail_kills(&self) {
        lock(&self.state).fail_kills = true;
    }

    pub fn fail_start_estimate(&self) {
        lock(&self.state).fail_start_estimate = true;
    }

    pub fn fail_sends(&self) {
        lock(&self.state).fail_sends = true;
    }

    pub fn log(&self) -> Vec<String> {
        lock(&self.state).log.clone()
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        lock(&self.state)
            .sent
            .iter()
            .map(|(title, body, _)| (title.clone(), body.clone()))
            .collect()
    }

    pub fn sent_titles(&self) -> Vec<String> {
        lock(&self.state)
            .sent
            .iter()
            .map(|(title, _, _)| title.clone())
            .collect()
    }

    pub fn sent_targets(&self) -> Vec<Option<String>> {
        lock(&self.state)
            .sent
            .iter()
            .map(|(_, _, target)| target.clone())
            .collect()
    }

    pub fn status_polls(&self) -> usize {
        lock(&self.state).status_polls
    }

    pub fn kills(&self) -> usize {
        lock(&self.state).kills
    }

    pub fn live_listeners(&self) -> usize {
        lock(&self.state).live.len()
    }
}
