//! PBS integration for pbs-bullet.
//!
//! Query job status via qstat, kill via qdel, estimate start via showstart,
//! and probe free memory on the job's execution nodes.

pub mod control;
pub mod memory;
pub mod status;
pub mod submit;
pub mod types;

pub use control::{JobControl, PbsCommands};
pub use memory::{
    sample_free_memory, FreeMemorySample, MemoryProbe, NodeMemory, ProbeError, RemoteShellProbe,
};
pub use status::{parse_status, StatusError};
pub use submit::{submit_job, SubmitError};
pub use types::{parse_exec_host, JobAttributes, JobIdentity, NodeSet};
