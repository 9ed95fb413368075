use std::time::Instant;

use tokio::sync::Mutex;
use tracing::debug;

use common::rpc::{
    Assignment, JobSnapshot, MessageKind, ProtocolError, Request, Response, TaskId, TaskKind,
    TaskRequest,
};

use crate::config::CoordinatorConfig;
use crate::registry::TaskRegistry;

/// The coordinator service.
///
/// Owns the job's [`TaskRegistry`]; every protocol call takes the same lock,
/// so scheduling decisions are totally ordered. The lock is only held while
/// the registry is read or updated.
#[derive(Debug)]
pub struct MRCoordinator {
    registry: Mutex<TaskRegistry>,
}

impl MRCoordinator {
    pub fn new(inputs: Vec<String>, config: &CoordinatorConfig) -> anyhow::Result<Self> {
        Ok(Self {
            registry: Mutex::new(TaskRegistry::new(inputs, config)?),
        })
    }

    /// Worker asks for its next task.
    pub async fn request_assignment(
        &self,
        request: TaskRequest,
    ) -> Result<Assignment, ProtocolError> {
        if request.kind != MessageKind::AskForTask {
            return Err(ProtocolError::BadMessageKind(request.kind));
        }

        let now = Instant::now();
        let assignment = { self.registry.lock().await.request_assignment(now) };
        debug!("assignment: {:?}", assignment);
        Ok(assignment)
    }

    /// Worker reports how a task went.
    pub async fn report_outcome(&self, request: TaskRequest) -> Result<(), ProtocolError> {
        let (kind, success) = request
            .kind
            .as_outcome()
            .ok_or(ProtocolError::BadMessageKind(request.kind))?;

        let mut registry = self.registry.lock().await;
        registry.report_outcome(kind, request.task_id, success)
    }

    /// Whether the job driver can stop: every task finished, or the job
    /// was abandoned after hitting the retry ceiling.
    pub async fn is_done(&self) -> bool {
        let registry = self.registry.lock().await;
        registry.is_complete() || registry.poisoned().is_some()
    }

    pub async fn is_complete(&self) -> bool {
        self.registry.lock().await.is_complete()
    }

    pub async fn poisoned(&self) -> Option<(TaskKind, TaskId)> {
        self.registry.lock().await.poisoned()
    }

    pub async fn snapshot(&self) -> JobSnapshot {
        self.registry.lock().await.snapshot()
    }

    /// Serve one protocol call.
    pub async fn handle(&self, request: Request) -> Response {
        let result = match request {
            Request::RequestAssignment(request) => self
                .request_assignment(request)
                .await
                .map(|assignment| Response::Assignment(assignment.into())),
            Request::ReportOutcome(request) => {
                self.report_outcome(request).await.map(|_| Response::Ack)
            }
            Request::QueryDone => Ok(Response::Done(self.is_done().await)),
            Request::QueryStatus => Ok(Response::Status(self.snapshot().await)),
        };

        result.unwrap_or_else(|e| {
            debug!("rejecting request: {e}");
            Response::Error(e)
        })
    }
}
