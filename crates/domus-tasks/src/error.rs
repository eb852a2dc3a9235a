//! Scheduler and task errors

use thiserror::Error;

/// Errors raised when creating pools or submitting work
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler is shut down")]
    ShutDown,

    #[error("failed to start {pool} pool: {source}")]
    Runtime {
        pool: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid scheduler configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// How a task ended, when it did not succeed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("task failed: {0}")]
    Failed(String),

    #[error("task panicked: {0}")]
    Panicked(String),

    #[error("task cancelled before completion")]
    Cancelled,
}
