use std::time::{Duration, Instant};

use anyhow::ensure;
use tracing::{debug, error, info, warn};

use common::rpc::{Assignment, JobSnapshot, ProtocolError, TaskId, TaskKind};

use crate::config::CoordinatorConfig;
use crate::scheduler::{self, Selection, TaskState, TaskStatus};

/// A map task, bound to one input file.
#[derive(Debug, Clone)]
pub struct MapTaskRecord {
    /// The input file, as named on the coordinator's command line.
    pub input: String,

    pub state: TaskState,
}

/// A reduce task. Its partition is its position in the registry.
#[derive(Debug, Clone, Default)]
pub struct ReduceTaskRecord {
    pub state: TaskState,
}

/// Registry for the tasks of one job.
///
/// Records are created once, in a stable order, and never removed. Map tasks
/// are numbered by input position, reduce tasks by partition.
#[derive(Debug)]
pub struct TaskRegistry {
    map_tasks: Vec<MapTaskRecord>,
    reduce_tasks: Vec<ReduceTaskRecord>,
    n_reduce: u32,
    timeout: Duration,
    max_attempts: Option<u32>,

    /// The task that exceeded `max_attempts`, if any.
    poisoned: Option<(TaskKind, TaskId)>,
}

impl TaskRegistry {
    /// One idle map task per input and `config.n_reduce` idle reduce tasks.
    pub fn new(inputs: Vec<String>, config: &CoordinatorConfig) -> anyhow::Result<Self> {
        ensure!(config.n_reduce > 0, "a job needs at least one reduce partition");
        ensure!(
            u32::try_from(inputs.len()).is_ok(),
            "too many input files ({})",
            inputs.len()
        );
        ensure!(
            config.max_attempts != Some(0),
            "max attempts must be at least 1"
        );

        let map_tasks = inputs
            .into_iter()
            .map(|input| MapTaskRecord {
                input,
                state: TaskState::default(),
            })
            .collect();
        let reduce_tasks = (0..config.n_reduce)
            .map(|_| ReduceTaskRecord::default())
            .collect();

        Ok(Self {
            map_tasks,
            reduce_tasks,
            n_reduce: config.n_reduce,
            timeout: config.task_timeout,
            max_attempts: config.max_attempts,
            poisoned: None,
        })
    }

    /// Pick the next task for a worker and mark it running.
    ///
    /// Map tasks are exhausted before any reduce task is considered.
    pub fn request_assignment(&mut self, now: Instant) -> Assignment {
        if self.poisoned.is_some() {
            return Assignment::Shutdown;
        }

        let map_states = self.map_tasks.iter_mut().map(|task| &mut task.state);
        match scheduler::select(map_states, now, self.timeout) {
            Selection::Dispatched { index, previous } => {
                let record = &self.map_tasks[index];
                log_dispatch(TaskKind::Map, index, previous, record.state.attempts);
                return Assignment::Map {
                    task_id: index as TaskId,
                    input: record.input.clone(),
                    reduce_count: self.n_reduce,
                };
            }
            Selection::Busy => return Assignment::Wait,
            Selection::Exhausted => {}
        }

        let reduce_states = self.reduce_tasks.iter_mut().map(|task| &mut task.state);
        match scheduler::select(reduce_states, now, self.timeout) {
            Selection::Dispatched { index, previous } => {
                let attempts = self.reduce_tasks[index].state.attempts;
                log_dispatch(TaskKind::Reduce, index, previous, attempts);
                Assignment::Reduce {
                    partition: index as u32,
                    map_count: self.map_tasks.len() as u32,
                }
            }
            Selection::Busy => Assignment::Wait,
            Selection::Exhausted => Assignment::Shutdown,
        }
    }

    /// Record the outcome a worker reported for a task.
    ///
    /// Running tasks take whatever is reported. A failed task still accepts
    /// a late success, since another executor of it may have finished the
    /// work after a reassigned duplicate failed. A finished task ignores
    /// every further report, so late duplicates are harmless.
    pub fn report_outcome(
        &mut self,
        kind: TaskKind,
        task_id: TaskId,
        success: bool,
    ) -> Result<(), ProtocolError> {
        let state = self
            .state_mut(kind, task_id)
            .ok_or(ProtocolError::UnknownTask { kind, task_id })?;

        match state.status {
            TaskStatus::Running => {}
            TaskStatus::Failed if success => {
                state.status = TaskStatus::Finished;
                info!("{kind:?} task {task_id} finished by an earlier executor");
                return Ok(());
            }
            TaskStatus::Finished => {
                debug!("{kind:?} task {task_id} already finished, ignoring report");
                return Ok(());
            }
            status => {
                warn!("{kind:?} task {task_id} is {status:?}, ignoring report (success={success})");
                return Ok(());
            }
        }

        if success {
            state.status = TaskStatus::Finished;
            info!("{kind:?} task {task_id} finished");
            return Ok(());
        }

        state.status = TaskStatus::Failed;
        let attempts = state.attempts;
        warn!("{kind:?} task {task_id} failed (attempt {attempts})");

        if let Some(max_attempts) = self.max_attempts {
            if attempts >= max_attempts && self.poisoned.is_none() {
                error!("{kind:?} task {task_id} failed {attempts} times, aborting job");
                self.poisoned = Some((kind, task_id));
            }
        }

        Ok(())
    }

    /// True iff every map and reduce task is finished.
    pub fn is_complete(&self) -> bool {
        self.map_tasks.iter().all(|task| task.state.is_finished())
            && self.reduce_tasks.iter().all(|task| task.state.is_finished())
    }

    /// The task that made the job give up, if the retry ceiling was hit.
    pub fn poisoned(&self) -> Option<(TaskKind, TaskId)> {
        self.poisoned
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            map_finished: self
                .map_tasks
                .iter()
                .filter(|task| task.state.is_finished())
                .count(),
            map_total: self.map_tasks.len(),
            reduce_finished: self
                .reduce_tasks
                .iter()
                .filter(|task| task.state.is_finished())
                .count(),
            reduce_total: self.reduce_tasks.len(),
        }
    }

    pub fn map_task(&self, task_id: TaskId) -> Option<&MapTaskRecord> {
        self.map_tasks.get(task_id as usize)
    }

    pub fn reduce_task(&self, partition: u32) -> Option<&ReduceTaskRecord> {
        self.reduce_tasks.get(partition as usize)
    }

    fn state_mut(&mut self, kind: TaskKind, task_id: TaskId) -> Option<&mut TaskState> {
        let index = task_id as usize;
        match kind {
            TaskKind::Map => self.map_tasks.get_mut(index).map(|task| &mut task.state),
            TaskKind::Reduce => self.reduce_tasks.get_mut(index).map(|task| &mut task.state),
        }
    }
}

fn log_dispatch(kind: TaskKind, index: usize, previous: TaskStatus, attempts: u32) {
    match previous {
        TaskStatus::Running => {
            warn!("{kind:?} task {index} timed out, reassigning (attempt {attempts})")
        }
        TaskStatus::Failed => info!("retrying {kind:?} task {index} (attempt {attempts})"),
        _ => info!("assigning {kind:?} task {index}"),
    }
}
