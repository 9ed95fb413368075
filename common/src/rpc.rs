//! The coordination protocol spoken between workers, the job driver and the
//! coordinator.
//!
//! Every call is a single request frame answered by a single response frame.
//! Frames are length-delimited JSON documents carried over a Unix domain
//! socket.

use std::path::PathBuf;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

/// Map tasks are numbered by input position, reduce tasks by partition.
pub type TaskId = u32;

/// The default socket of the coordinator for the invoking user.
///
/// Only one job per user can run on a host at a time.
pub fn default_socket_path() -> PathBuf {
    PathBuf::from(format!(
        "/var/tmp/mrs-coordinator-{}.sock",
        whoami::username()
    ))
}

/////////////////////////////////////////////////////////////////////////////
// Messages
/////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    /// Worker asks for a task.
    AskForTask,
    /// Coordinator hands out a map task.
    MapAlloc,
    /// Coordinator hands out a reduce task.
    ReduceAlloc,
    MapSuccess,
    MapFailed,
    ReduceSuccess,
    ReduceFailed,
    /// Every task is finished, the worker should exit.
    Shutdown,
    /// Nothing can be handed out right now, ask again later.
    Wait,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    Map,
    Reduce,
}

impl MessageKind {
    /// The outcome report for a task of `kind`.
    pub fn outcome_for(kind: TaskKind, success: bool) -> Self {
        match (kind, success) {
            (TaskKind::Map, true) => MessageKind::MapSuccess,
            (TaskKind::Map, false) => MessageKind::MapFailed,
            (TaskKind::Reduce, true) => MessageKind::ReduceSuccess,
            (TaskKind::Reduce, false) => MessageKind::ReduceFailed,
        }
    }

    /// Decode an outcome report into the kind of task it refers to and
    /// whether the task succeeded. `None` for every non-report kind.
    pub fn as_outcome(self) -> Option<(TaskKind, bool)> {
        match self {
            MessageKind::MapSuccess => Some((TaskKind::Map, true)),
            MessageKind::MapFailed => Some((TaskKind::Map, false)),
            MessageKind::ReduceSuccess => Some((TaskKind::Reduce, true)),
            MessageKind::ReduceFailed => Some((TaskKind::Reduce, false)),
            _ => None,
        }
    }
}

/// Sent by a worker, either to ask for work or to report on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRequest {
    pub kind: MessageKind,
    pub task_id: TaskId,
}

impl TaskRequest {
    pub fn ask() -> Self {
        Self {
            kind: MessageKind::AskForTask,
            task_id: 0,
        }
    }

    pub fn outcome(kind: TaskKind, task_id: TaskId, success: bool) -> Self {
        Self {
            kind: MessageKind::outcome_for(kind, success),
            task_id,
        }
    }
}

/// The coordinator's answer to [`Request::RequestAssignment`].
///
/// `task_name` and `reduce_count` are only meaningful for map tasks,
/// `map_count` only for reduce tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskReply {
    pub kind: MessageKind,
    pub task_id: TaskId,
    #[serde(default)]
    pub task_name: String,
    #[serde(default)]
    pub reduce_count: u32,
    #[serde(default)]
    pub map_count: u32,
}

/// Progress counters of the running job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub map_finished: usize,
    pub map_total: usize,
    pub reduce_finished: usize,
    pub reduce_total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    RequestAssignment(TaskRequest),
    ReportOutcome(TaskRequest),
    QueryDone,
    QueryStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    Assignment(TaskReply),
    Ack,
    Done(bool),
    Status(JobSnapshot),
    Error(ProtocolError),
}

/////////////////////////////////////////////////////////////////////////////
// Assignments
/////////////////////////////////////////////////////////////////////////////

/// What a worker should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignment {
    Map {
        task_id: TaskId,
        input: String,
        reduce_count: u32,
    },
    Reduce {
        partition: u32,
        map_count: u32,
    },
    Wait,
    Shutdown,
}

impl From<Assignment> for TaskReply {
    fn from(assignment: Assignment) -> Self {
        let empty = |kind| TaskReply {
            kind,
            task_id: 0,
            task_name: String::new(),
            reduce_count: 0,
            map_count: 0,
        };

        match assignment {
            Assignment::Map {
                task_id,
                input,
                reduce_count,
            } => TaskReply {
                task_id,
                task_name: input,
                reduce_count,
                ..empty(MessageKind::MapAlloc)
            },
            Assignment::Reduce {
                partition,
                map_count,
            } => TaskReply {
                task_id: partition,
                map_count,
                ..empty(MessageKind::ReduceAlloc)
            },
            Assignment::Wait => empty(MessageKind::Wait),
            Assignment::Shutdown => empty(MessageKind::Shutdown),
        }
    }
}

impl TryFrom<TaskReply> for Assignment {
    type Error = ProtocolError;

    fn try_from(reply: TaskReply) -> Result<Self, Self::Error> {
        match reply.kind {
            MessageKind::MapAlloc if reply.reduce_count == 0 => Err(ProtocolError::Codec(
                "map assignment without reduce partitions".to_string(),
            )),
            MessageKind::MapAlloc => Ok(Assignment::Map {
                task_id: reply.task_id,
                input: reply.task_name,
                reduce_count: reply.reduce_count,
            }),
            MessageKind::ReduceAlloc => Ok(Assignment::Reduce {
                partition: reply.task_id,
                map_count: reply.map_count,
            }),
            MessageKind::Wait => Ok(Assignment::Wait),
            MessageKind::Shutdown => Ok(Assignment::Shutdown),
            other => Err(ProtocolError::BadMessageKind(other)),
        }
    }
}

/////////////////////////////////////////////////////////////////////////////
// Errors
/////////////////////////////////////////////////////////////////////////////

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolError {
    /// The message kind is not valid for the call it was sent with.
    #[error("bad message type: {0:?}")]
    BadMessageKind(MessageKind),

    /// An outcome report names a task the job does not have.
    #[error("no {kind:?} task with id {task_id}")]
    UnknownTask { kind: TaskKind, task_id: TaskId },

    /// The peer answered a call with a response of the wrong shape.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("malformed frame: {0}")]
    Codec(String),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("connection closed by peer")]
    Closed,
}

/////////////////////////////////////////////////////////////////////////////
// Framing
/////////////////////////////////////////////////////////////////////////////

/// A socket carrying length-delimited protocol frames.
pub type Connection<T> = Framed<T, LengthDelimitedCodec>;

pub fn framed<T: AsyncRead + AsyncWrite>(io: T) -> Connection<T> {
    Framed::new(io, LengthDelimitedCodec::new())
}

/// Serialize `message` and write it as one frame.
pub async fn send_frame<T, M>(conn: &mut Connection<T>, message: &M) -> Result<(), ProtocolError>
where
    T: AsyncRead + AsyncWrite + Unpin,
    M: Serialize,
{
    let body = serde_json::to_vec(message).map_err(|e| ProtocolError::Codec(e.to_string()))?;
    conn.send(Bytes::from(body))
        .await
        .map_err(|e| ProtocolError::Transport(e.to_string()))
}

/// Read the next frame. `Ok(None)` means the peer closed the connection
/// cleanly between frames.
pub async fn recv_frame<T, M>(conn: &mut Connection<T>) -> Result<Option<M>, ProtocolError>
where
    T: AsyncRead + AsyncWrite + Unpin,
    M: DeserializeOwned,
{
    match conn.next().await {
        None => Ok(None),
        Some(Err(e)) => Err(ProtocolError::Transport(e.to_string())),
        Some(Ok(frame)) => serde_json::from_slice(&frame)
            .map(Some)
            .map_err(|e| ProtocolError::Codec(e.to_string())),
    }
}
