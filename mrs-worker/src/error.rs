use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Why a map or reduce task failed.
///
/// Task errors never take the worker down; they are reported to the
/// coordinator as a failed outcome and the task is retried.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("failed to read input {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("failed to list intermediate files: {0}")]
    List(String),

    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("map function failed on {input}: {cause:#}")]
    MapFunction { input: String, cause: anyhow::Error },

    #[error("reduce function failed on key {key:?}: {cause:#}")]
    ReduceFunction { key: String, cause: anyhow::Error },

    #[error("partition {partition}: found {found} of {expected} intermediate files and no output shard")]
    IncompleteInput {
        partition: u32,
        found: usize,
        expected: usize,
    },

    /// The executor panicked or was cancelled.
    #[error("task aborted: {0}")]
    Aborted(String),
}
