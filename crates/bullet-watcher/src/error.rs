use bullet_notify::ChannelError;
use bullet_parsers::CommandError;
use bullet_pbs::StatusError;
use thiserror::Error;

/// Conditions that end the watch.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("qstat failed: {0}")]
    Status(#[from] CommandError),
    #[error(transparent)]
    Parse(#[from] StatusError),
    #[error(transparent)]
    Registration(ChannelError),
    #[error("Stopped by remote killwatcher command")]
    KillRequested,
}
