//! Coordinator of a MapReduce job: the task registry, the scheduler and
//! the service that exposes both over the coordination protocol.

pub mod config;
pub mod core;
pub mod registry;
pub mod scheduler;
pub mod server;

pub use crate::config::CoordinatorConfig;
pub use crate::core::MRCoordinator;
