mod args;

use anyhow::{anyhow, Context};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use args::Args;
use common::rpc::default_socket_path;
use mrs_worker::MRWorker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let workload = workload::try_named(&args.workload).ok_or_else(|| {
        anyhow!(
            "the workload `{}` is not a known workload (expected one of {})",
            args.workload,
            workload::NAMES.join(", ")
        )
    })?;
    let socket = args.socket.clone().unwrap_or_else(default_socket_path);

    let worker = MRWorker::connect(&socket, workload, args.config())
        .await
        .with_context(|| format!("cannot start worker against {}", socket.display()))?;
    info!("worker running `{}` in {}", args.workload, args.work_dir.display());

    let summary = worker.run().await.context("lost contact with the coordinator")?;
    info!(
        "worker exiting: {} map and {} reduce tasks succeeded, {} failed",
        summary.maps_succeeded,
        summary.reduces_succeeded,
        summary.maps_failed + summary.reduces_failed
    );
    Ok(())
}
