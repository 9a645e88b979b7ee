//! Free memory sampling on a job's execution nodes.

use crate::types::NodeSet;
use bullet_parsers::{run_argv, CommandError};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Memory probe on {node} failed: {source}")]
    Command {
        node: String,
        #[source]
        source: CommandError,
    },
    #[error("Memory probe on {node} returned {output:?}")]
    Parse { node: String, output: String },
}

/// Percentage of free memory on `free`'s Mem line, computed on the node.
pub const DEFAULT_PROBE_SCRIPT: &str = "free | awk 'FNR == 2 {print $4/($3+$4)*100}'";

/// Asks a single node how much of its memory is free.
pub trait MemoryProbe {
    /// Free memory on `node` as a percentage of used + free.
    fn probe_free_memory(
        &self,
        node: &str,
    ) -> impl Future<Output = Result<f64, ProbeError>> + Send;
}

/// Probe that runs a shell pipeline on the node through `rsh` (or `ssh`).
#[derive(Debug, Clone)]
pub struct RemoteShellProbe {
    remote_shell: Vec<String>,
    script: String,
    timeout: Duration,
}

impl RemoteShellProbe {
    pub fn new(remote_shell: Vec<String>, timeout: Duration) -> Self {
        Self {
            remote_shell,
            script: DEFAULT_PROBE_SCRIPT.to_string(),
            timeout,
        }
    }

    /// Replace the remote pipeline. It must print a single number.
    pub fn with_script(mut self, script: impl Into<String>) -> Self {
        self.script = script.into();
        self
    }
}

impl MemoryProbe for RemoteShellProbe {
    async fn probe_free_memory(&self, node: &str) -> Result<f64, ProbeError> {
        let output = run_argv(&self.remote_shell, &[node, self.script.as_str()], self.timeout)
            .await
            .map_err(|source| ProbeError::Command {
                node: node.to_string(),
                source,
            })?;
        parse_percentage(node, &output)
    }
}

fn parse_percentage(node: &str, output: &str) -> Result<f64, ProbeError> {
    output
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ProbeError::Parse {
            node: node.to_string(),
            output: output.trim().to_string(),
        })
}

/// Free memory reading for one node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeMemory {
    pub node: String,
    pub free_percent: f64,
}

/// One reading per node, taken in a single poll.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FreeMemorySample {
    pub readings: Vec<NodeMemory>,
}

impl FreeMemorySample {
    pub fn new(readings: Vec<NodeMemory>) -> Self {
        Self { readings }
    }

    /// Nodes whose free memory is strictly below `threshold` percent.
    pub fn below(&self, threshold: f64) -> impl Iterator<Item = &NodeMemory> {
        self.readings
            .iter()
            .filter(move |r| r.free_percent < threshold)
    }

    pub fn any_below(&self, threshold: f64) -> bool {
        self.below(threshold).next().is_some()
    }
}

impl fmt::Display for FreeMemorySample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, reading) in self.readings.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {:.2}%", reading.node, reading.free_percent)?;
        }
        Ok(())
    }
}

/// Probe every node. Any failure fails the whole sample, so a partial
/// sample is never returned.
pub async fn sample_free_memory<P: MemoryProbe>(
    probe: &P,
    nodes: &NodeSet,
) -> Result<FreeMemorySample, ProbeError> {
    let mut readings = Vec::with_capacity(nodes.len());
    for node in nodes {
        let free_percent = probe.probe_free_memory(node).await?;
        readings.push(NodeMemory {
            node: node.clone(),
            free_percent,
        });
    }
    Ok(FreeMemorySample::new(readings))
}
