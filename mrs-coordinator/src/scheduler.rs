//! Task selection.
//!
//! The scheduler decides which task a requesting worker gets. It holds no
//! state of its own; records are owned by the [`TaskRegistry`] and scanned
//! here in their stable order.
//!
//! [`TaskRegistry`]: crate::registry::TaskRegistry

use std::time::{Duration, Instant};

/// Status of a single map or reduce task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Never dispatched.
    Idle,
    Running,
    /// Terminal.
    Finished,
    Failed,
}

/// Scheduling state shared by map and reduce records.
#[derive(Debug, Clone)]
pub struct TaskState {
    pub status: TaskStatus,

    /// When the task was last handed to a worker.
    pub last_dispatch: Option<Instant>,

    /// How many times the task has been handed out.
    pub attempts: u32,
}

impl Default for TaskState {
    fn default() -> Self {
        Self {
            status: TaskStatus::Idle,
            last_dispatch: None,
            attempts: 0,
        }
    }
}

impl TaskState {
    /// Whether the task may be handed to a worker at `now`.
    ///
    /// Idle and failed tasks always are. A running task is only when its
    /// last dispatch is strictly older than `timeout`.
    pub fn is_eligible(&self, now: Instant, timeout: Duration) -> bool {
        match self.status {
            TaskStatus::Idle | TaskStatus::Failed => true,
            TaskStatus::Running => self
                .last_dispatch
                .map_or(true, |at| now.saturating_duration_since(at) > timeout),
            TaskStatus::Finished => false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status == TaskStatus::Finished
    }

    /// Mark the task running and stamp it. Returns the previous status.
    pub fn dispatch(&mut self, now: Instant) -> TaskStatus {
        let previous = self.status;
        self.status = TaskStatus::Running;
        self.last_dispatch = Some(now);
        self.attempts += 1;
        previous
    }
}

/// Result of scanning one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// The task at this position was dispatched.
    Dispatched { index: usize, previous: TaskStatus },

    /// Unfinished tasks remain but none can be handed out right now.
    Busy,

    /// Every task of the phase is finished.
    Exhausted,
}

/// Scan `tasks` in order and dispatch the first eligible one.
pub fn select<'a, I>(tasks: I, now: Instant, timeout: Duration) -> Selection
where
    I: IntoIterator<Item = &'a mut TaskState>,
{
    let mut unfinished = false;

    for (index, task) in tasks.into_iter().enumerate() {
        if task.is_eligible(now, timeout) {
            let previous = task.dispatch(now);
            return Selection::Dispatched { index, previous };
        }

        if !task.is_finished() {
            unfinished = true;
        }
    }

    if unfinished {
        Selection::Busy
    } else {
        Selection::Exhausted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(10);

    fn state(status: TaskStatus, last_dispatch: Option<Instant>) -> TaskState {
        TaskState {
            status,
            last_dispatch,
            attempts: 0,
        }
    }

    #[test]
    fn running_task_becomes_eligible_only_after_timeout() {
        let start = Instant::now();
        let task = state(TaskStatus::Running, Some(start));

        assert!(!task.is_eligible(start, TIMEOUT));
        assert!(!task.is_eligible(start + TIMEOUT, TIMEOUT));
        assert!(task.is_eligible(start + TIMEOUT + Duration::from_millis(1), TIMEOUT));
    }

    #[test]
    fn finished_task_is_never_eligible() {
        let start = Instant::now();
        let task = state(TaskStatus::Finished, Some(start));
        assert!(!task.is_eligible(start + TIMEOUT * 100, TIMEOUT));
    }

    #[test]
    fn select_picks_first_eligible_in_order() {
        let now = Instant::now();
        let mut tasks = vec![
            state(TaskStatus::Finished, Some(now)),
            state(TaskStatus::Running, Some(now)),
            state(TaskStatus::Failed, Some(now)),
            state(TaskStatus::Idle, None),
        ];

        let selection = select(tasks.iter_mut(), now, TIMEOUT);
        assert_eq!(
            selection,
            Selection::Dispatched {
                index: 2,
                previous: TaskStatus::Failed
            }
        );
        assert_eq!(tasks[2].status, TaskStatus::Running);
        assert_eq!(tasks[2].attempts, 1);
        assert_eq!(tasks[3].status, TaskStatus::Idle);
    }

    #[test]
    fn select_reports_busy_and_exhausted() {
        let now = Instant::now();
        let mut busy = vec![
            state(TaskStatus::Finished, Some(now)),
            state(TaskStatus::Running, Some(now)),
        ];
        assert_eq!(select(busy.iter_mut(), now, TIMEOUT), Selection::Busy);

        let mut done = vec![state(TaskStatus::Finished, Some(now)); 3];
        assert_eq!(select(done.iter_mut(), now, TIMEOUT), Selection::Exhausted);

        let mut empty: Vec<TaskState> = Vec::new();
        assert_eq!(select(empty.iter_mut(), now, TIMEOUT), Selection::Exhausted);
    }
}
