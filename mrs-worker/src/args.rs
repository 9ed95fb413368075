use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use mrs_worker::WorkerConfig;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// The application to run. One of `wc`, `indexer`, `vertex-degree`.
    #[arg(short, long, default_value = "wc")]
    pub workload: String,

    /// Directory holding intermediate files and output shards.
    #[arg(short = 'd', long, default_value = ".")]
    pub work_dir: PathBuf,

    /// Path of the coordinator socket. Defaults to a per-user socket in /var/tmp.
    #[arg(short, long)]
    pub socket: Option<PathBuf>,

    /// Seconds to sleep when the coordinator has nothing to hand out.
    #[arg(long, default_value_t = 10)]
    pub wait_backoff: u64,

    /// Seconds to pause after finishing a task.
    #[arg(long, default_value_t = 1)]
    pub poll_interval: u64,
}

impl Args {
    pub fn config(&self) -> WorkerConfig {
        WorkerConfig {
            work_dir: self.work_dir.clone(),
            wait_backoff: Duration::from_secs(self.wait_backoff),
            poll_interval: Duration::from_secs(self.poll_interval),
        }
    }
}
