mod args;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use args::Args;
use common::rpc::default_socket_path;
use mrs_coordinator::{server, MRCoordinator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = args.config();
    let socket = args.socket.clone().unwrap_or_else(default_socket_path);

    let coordinator = Arc::new(MRCoordinator::new(args.inputs, &config)?);
    let listener = server::bind(&socket)
        .with_context(|| format!("failed to bind {}", socket.display()))?;
    info!(
        "coordinator listening on {} (R={}, timeout={:?})",
        socket.display(),
        config.n_reduce,
        config.task_timeout
    );

    let served = server::serve_until_done(
        listener,
        coordinator.clone(),
        Duration::from_secs(args.done_poll.max(1)),
        Duration::from_secs(args.linger),
    )
    .await;
    let _ = std::fs::remove_file(&socket);
    served?;

    if let Some((kind, task_id)) = coordinator.poisoned().await {
        bail!("job aborted: {kind:?} task {task_id} exceeded the retry limit");
    }

    info!("job complete");
    Ok(())
}
