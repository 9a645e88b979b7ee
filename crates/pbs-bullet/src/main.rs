//! pbs-bullet - watch a PBS job and push notes about it.

mod logging;
mod polling;

use bullet_cli::Args;
use bullet_notify::PushbulletChannel;
use bullet_pbs::{submit_job, PbsCommands, RemoteShellProbe};
use bullet_watcher::Watcher;
use clap::Parser;
use miette::{miette, IntoDiagnostic, Result};
use polling::{PollLoop, PollingConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(&args.log_level);

    let timeout = args.command_timeout();
    let job_id = match (&args.job_id, &args.submit) {
        (Some(job_id), _) => job_id.clone(),
        (None, Some(script)) => submit_job(&args.submit_command(), script, timeout)
            .await
            .into_diagnostic()?,
        (None, None) => return Err(miette!("Either a job id or --submit is required")),
    };

    let identity = args.identity(job_id);
    let control = PbsCommands::new(identity.clone(), timeout);
    let probe = RemoteShellProbe::new(args.remote_shell(), timeout);
    let mut watcher: Watcher<_, _, PushbulletChannel> =
        Watcher::new(identity, control, probe, args.watcher_config());

    // Learn the job name for the listener before anything else.
    watcher.poll_status().await.into_diagnostic()?;
    tracing::info!("Watching job {} ({})", watcher.job_id(), watcher.job_name());

    match &args.pushbullet_token {
        Some(token) => watcher
            .set_notifier(PushbulletChannel::new(token.clone()))
            .await
            .into_diagnostic()?,
        None => tracing::info!("No Pushbullet token given, running without notifications"),
    }

    let poll_loop = PollLoop::new(PollingConfig {
        interval: args.poll_interval(),
    });
    poll_loop
        .run(&mut watcher, polling::ctrl_c())
        .await
        .into_diagnostic()
}
