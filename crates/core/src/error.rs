use thiserror::Error;

use crate::task::{JobId, TaskId};

/// Errors surfaced by scheduler operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("job does not exist: {0}")]
    NonExistingJob(JobId),

    #[error("job not deleted (not in a terminal status): {0}")]
    JobNotDeleted(JobId),

    #[error("no job found for task: {0}")]
    NoJobForTask(TaskId),

    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Error raised by a task body. Terminates the job in `Failed` status.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task failed: {0}")]
    Failed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error raised when writing a result to an output sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink rejected value: {0}")]
    Rejected(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
