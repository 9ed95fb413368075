mod args;
use args::{Args, Commands};

mod core;

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use common::client::CoordinatorClient;
use common::rpc::default_socket_path;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let socket = args.socket.unwrap_or_else(default_socket_path);
    let mut client = CoordinatorClient::connect(&socket)
        .await
        .with_context(|| format!("is a coordinator running at {}?", socket.display()))?;

    match args.command {
        Commands::Done => {
            if !core::done(&mut client).await? {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Status => core::status(&mut client).await?,
        Commands::Wait { interval } => {
            core::wait(&mut client, Duration::from_secs(interval.max(1))).await?
        }
    }

    Ok(ExitCode::SUCCESS)
}
