use std::path::PathBuf;
use std::time::Duration;

use common::{POLL_INTERVAL, WAIT_BACKOFF};

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Where intermediate files and output shards live. Shared by every
    /// worker of the job.
    pub work_dir: PathBuf,

    /// Sleep after the coordinator answers `Wait`.
    pub wait_backoff: Duration,

    /// Pause after each finished task before asking again.
    pub poll_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("."),
            wait_backoff: WAIT_BACKOFF,
            poll_interval: POLL_INTERVAL,
        }
    }
}
