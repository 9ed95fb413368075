use std::time::Duration;

use common::TASK_TIMEOUT;

/// Parameters fixed for the lifetime of one job.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Number of reduce partitions, `R`.
    pub n_reduce: u32,

    /// A running task older than this may be handed to another worker.
    pub task_timeout: Duration,

    /// Abort the job once a task has failed after this many dispatches.
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            n_reduce: 10,
            task_timeout: TASK_TIMEOUT,
            max_attempts: None,
        }
    }
}
