use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use common::SHUTDOWN_LINGER;
use mrs_coordinator::CoordinatorConfig;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Input files, one map task each. With none the job only runs the
    /// reduce phase and writes empty shards.
    pub inputs: Vec<String>,

    /// Number of reduce partitions.
    #[arg(short = 'r', long, default_value = "10")]
    pub n_reduce: u32,

    /// Socket to listen on. Defaults to a per-user path under /var/tmp.
    #[arg(short, long)]
    pub socket: Option<PathBuf>,

    /// Seconds before a running task may be handed to another worker.
    #[arg(short, long, default_value = "10")]
    pub task_timeout: u64,

    /// Abort the job once a task has failed this many times.
    #[arg(short, long)]
    pub max_attempts: Option<u32>,

    /// Seconds between completion checks.
    #[arg(long, default_value = "1")]
    pub done_poll: u64,

    /// Seconds to keep answering after the job is done, so workers backing
    /// off on `Wait` still receive `Shutdown`.
    #[arg(long, default_value_t = SHUTDOWN_LINGER.as_secs())]
    pub linger: u64,
}

impl Args {
    pub fn config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            n_reduce: self.n_reduce,
            task_timeout: Duration::from_secs(self.task_timeout),
            max_attempts: self.max_attempts,
        }
    }
}
