use std::path::Path;

use tokio::net::UnixStream;
use tracing::debug;

use crate::rpc::{
    self, Assignment, Connection, JobSnapshot, ProtocolError, Request, Response, TaskId,
    TaskKind, TaskRequest,
};

/// Client side of the coordination protocol.
///
/// Holds one connection to the coordinator and issues calls over it one at a
/// time.
pub struct CoordinatorClient {
    conn: Connection<UnixStream>,
}

impl CoordinatorClient {
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self, ProtocolError> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path).await.map_err(|e| {
            ProtocolError::Transport(format!("cannot reach coordinator at {}: {e}", path.display()))
        })?;
        debug!("connected to coordinator at {}", path.display());

        Ok(Self {
            conn: rpc::framed(stream),
        })
    }

    async fn call(&mut self, request: &Request) -> Result<Response, ProtocolError> {
        rpc::send_frame(&mut self.conn, request).await?;
        match rpc::recv_frame(&mut self.conn).await? {
            Some(Response::Error(e)) => Err(e),
            Some(response) => Ok(response),
            None => Err(ProtocolError::Closed),
        }
    }

    /// Ask the coordinator for the next task.
    pub async fn request_assignment(&mut self) -> Result<Assignment, ProtocolError> {
        match self.call(&Request::RequestAssignment(TaskRequest::ask())).await? {
            Response::Assignment(reply) => Assignment::try_from(reply),
            other => Err(unexpected(other)),
        }
    }

    pub async fn report_outcome(
        &mut self,
        kind: TaskKind,
        task_id: TaskId,
        success: bool,
    ) -> Result<(), ProtocolError> {
        let request = Request::ReportOutcome(TaskRequest::outcome(kind, task_id, success));
        match self.call(&request).await? {
            Response::Ack => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Whether the job is over.
    pub async fn query_done(&mut self) -> Result<bool, ProtocolError> {
        match self.call(&Request::QueryDone).await? {
            Response::Done(done) => Ok(done),
            other => Err(unexpected(other)),
        }
    }

    pub async fn query_status(&mut self) -> Result<JobSnapshot, ProtocolError> {
        match self.call(&Request::QueryStatus).await? {
            Response::Status(snapshot) => Ok(snapshot),
            other => Err(unexpected(other)),
        }
    }
}

fn unexpected(response: Response) -> ProtocolError {
    ProtocolError::UnexpectedResponse(format!("{response:?}"))
}
