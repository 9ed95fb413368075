use std::path::Path;

use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use common::client::CoordinatorClient;
use common::rpc::{Assignment, ProtocolError, TaskId, TaskKind};
use common::Workload;

use crate::config::WorkerConfig;
use crate::error::TaskError;
use crate::map::perform_map;
use crate::reduce::perform_reduce;

/// Tasks a worker ran before it was told to shut down.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSummary {
    pub maps_succeeded: usize,
    pub maps_failed: usize,
    pub reduces_succeeded: usize,
    pub reduces_failed: usize,
}

impl WorkerSummary {
    fn record(&mut self, kind: TaskKind, success: bool) {
        let counter = match (kind, success) {
            (TaskKind::Map, true) => &mut self.maps_succeeded,
            (TaskKind::Map, false) => &mut self.maps_failed,
            (TaskKind::Reduce, true) => &mut self.reduces_succeeded,
            (TaskKind::Reduce, false) => &mut self.reduces_failed,
        };
        *counter += 1;
    }
}

/// A stateless worker: asks for a task, runs it, reports, repeats.
pub struct MRWorker {
    client: CoordinatorClient,
    workload: Workload,
    config: WorkerConfig,
}

impl MRWorker {
    pub fn new(client: CoordinatorClient, workload: Workload, config: WorkerConfig) -> Self {
        Self {
            client,
            workload,
            config,
        }
    }

    pub async fn connect(
        socket: impl AsRef<Path>,
        workload: Workload,
        config: WorkerConfig,
    ) -> Result<Self, ProtocolError> {
        let client = CoordinatorClient::connect(socket).await?;
        Ok(Self::new(client, workload, config))
    }

    /// Work until the coordinator answers `Shutdown`.
    ///
    /// Task failures are reported and never end the loop. Failing to reach
    /// the coordinator for a new assignment does.
    pub async fn run(mut self) -> Result<WorkerSummary, ProtocolError> {
        let mut summary = WorkerSummary::default();

        loop {
            match self.client.request_assignment().await? {
                Assignment::Map {
                    task_id,
                    input,
                    reduce_count,
                } => {
                    let workload = self.workload;
                    let work_dir = self.config.work_dir.clone();
                    let result = execute(move || {
                        perform_map(&workload, &input, task_id, reduce_count, &work_dir)
                    })
                    .await;
                    self.finish(&mut summary, TaskKind::Map, task_id, result.map(|_| ()))
                        .await;
                }
                Assignment::Reduce {
                    partition,
                    map_count,
                } => {
                    let workload = self.workload;
                    let work_dir = self.config.work_dir.clone();
                    let result = execute(move || {
                        perform_reduce(&workload, partition, map_count, &work_dir)
                    })
                    .await;
                    self.finish(&mut summary, TaskKind::Reduce, partition, result.map(|_| ()))
                        .await;
                }
                Assignment::Wait => {
                    debug!("no task available, backing off for {:?}", self.config.wait_backoff);
                    sleep(self.config.wait_backoff).await;
                }
                Assignment::Shutdown => {
                    info!("coordinator asked us to shut down: {summary:?}");
                    return Ok(summary);
                }
            }
        }
    }

    async fn finish(
        &mut self,
        summary: &mut WorkerSummary,
        kind: TaskKind,
        task_id: TaskId,
        result: Result<(), TaskError>,
    ) {
        let success = match result {
            Ok(()) => true,
            Err(e) => {
                error!("{kind:?} task {task_id} failed: {e}");
                false
            }
        };
        summary.record(kind, success);

        // The coordinator reassigns the task once it goes stale, so a lost
        // report only costs time.
        if let Err(e) = self.client.report_outcome(kind, task_id, success).await {
            warn!("failed to report {kind:?} task {task_id}: {e}");
        }

        sleep(self.config.poll_interval).await;
    }
}

/// Run a blocking executor off the async runtime.
async fn execute<F, T>(task: F) -> Result<T, TaskError>
where
    F: FnOnce() -> Result<T, TaskError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| TaskError::Aborted(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::time::Duration;

    use tokio::net::UnixListener;

    use common::rpc::{self, MessageKind, Request, Response, TaskReply, TaskRequest};
    use common::{layout, KeyValue};

    use super::*;

    fn split(_input: &str, contents: &str) -> common::MapOutput {
        Ok(contents
            .split_whitespace()
            .map(|w| KeyValue::new(w, "1"))
            .collect())
    }

    fn count(_key: &str, values: &[String]) -> anyhow::Result<String> {
        Ok(values.len().to_string())
    }

    const COUNT: Workload = Workload {
        map_fn: split,
        reduce_fn: count,
    };

    fn fast(work_dir: &Path) -> WorkerConfig {
        WorkerConfig {
            work_dir: work_dir.to_path_buf(),
            wait_backoff: Duration::from_millis(10),
            poll_interval: Duration::from_millis(1),
        }
    }

    fn reply(kind: MessageKind, task_id: TaskId, task_name: &str) -> Response {
        Response::Assignment(TaskReply {
            kind,
            task_id,
            task_name: task_name.to_string(),
            reduce_count: 1,
            map_count: 1,
        })
    }

    /// Plays coordinator on one connection: hands out `script` in order,
    /// acknowledges every report and records it.
    async fn scripted_coordinator(listener: UnixListener, script: Vec<Response>) -> Vec<TaskRequest> {
        let (stream, _) = listener.accept().await.unwrap();
        let mut conn = rpc::framed(stream);
        let mut script = script.into_iter();
        let mut reports = Vec::new();

        while let Some(request) = rpc::recv_frame::<_, Request>(&mut conn).await.unwrap() {
            let response = match request {
                Request::RequestAssignment(_) => script.next().unwrap(),
                Request::ReportOutcome(report) => {
                    reports.push(report);
                    Response::Ack
                }
                other => panic!("unexpected request {other:?}"),
            };
            rpc::send_frame(&mut conn, &response).await.unwrap();
        }
        reports
    }

    #[tokio::test]
    async fn runs_tasks_and_reports_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.txt");
        fs::write(&input, "a b a").unwrap();
        let socket = dir.path().join("c.sock");
        let listener = UnixListener::bind(&socket).unwrap();

        let script = vec![
            reply(MessageKind::MapAlloc, 0, &input.to_string_lossy()),
            reply(MessageKind::Wait, 0, ""),
            reply(MessageKind::MapAlloc, 1, "/definitely/not/here"),
            reply(MessageKind::ReduceAlloc, 0, ""),
            reply(MessageKind::Shutdown, 0, ""),
        ];
        let coordinator = tokio::spawn(scripted_coordinator(listener, script));

        let worker = MRWorker::connect(&socket, COUNT, fast(dir.path())).await.unwrap();
        let summary = worker.run().await.unwrap();
        assert_eq!(
            summary,
            WorkerSummary {
                maps_succeeded: 1,
                maps_failed: 1,
                reduces_succeeded: 1,
                reduces_failed: 0,
            }
        );

        let reports: Vec<_> = coordinator
            .await
            .unwrap()
            .into_iter()
            .map(|r| (r.kind, r.task_id))
            .collect();
        assert_eq!(
            reports,
            [
                (MessageKind::MapSuccess, 0),
                (MessageKind::MapFailed, 1),
                (MessageKind::ReduceSuccess, 0),
            ]
        );

        let shard = fs::read_to_string(layout::output_path(dir.path(), 0)).unwrap();
        assert_eq!(shard, "a 2\nb 1\n");
    }

    #[tokio::test]
    async fn lost_coordinator_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("c.sock");
        let listener = UnixListener::bind(&socket).unwrap();
        let coordinator = tokio::spawn(async move {
            // accept, then hang up without answering
            let _ = listener.accept().await.unwrap();
        });

        let worker = MRWorker::connect(&socket, COUNT, fast(dir.path())).await.unwrap();
        coordinator.await.unwrap();
        assert!(worker.run().await.is_err());
    }
}
