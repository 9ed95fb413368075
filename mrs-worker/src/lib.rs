//! MapReduce worker: pulls tasks from the coordinator and runs them against
//! a shared work directory.

pub mod config;
pub mod core;
pub mod error;
pub mod map;
mod persist;
pub mod reduce;

pub use crate::config::WorkerConfig;
pub use crate::core::{MRWorker, WorkerSummary};
pub use crate::error::TaskError;
