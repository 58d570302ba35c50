use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::error::{SinkError, TaskError};

/// Stable identifier of a task definition.
pub type TaskId = String;

/// Identifier of one tracked execution attempt of a task.
///
/// Generated per submission; traceable back to the originating task.
pub type JobId = String;

/// Build a job id for a submission of `task_id`.
///
/// The uuid suffix keeps repeated submissions of the same task unique for
/// the lifetime of the process.
pub fn new_job_id(task_id: &str) -> JobId {
    format!("job_id_{}_{}", task_id, Uuid::new_v4())
}

/// A unit of work the scheduler can execute.
///
/// Implementations are opaque to the scheduler: it only needs the id for
/// logging/lookup, the callable body, and the declared output sinks that
/// results are delivered to positionally.
pub trait Task: Send + Sync {
    /// Stable identifier, shared by every submission of this task.
    fn id(&self) -> &str;

    /// Run the task, producing zero or more results.
    fn run(&self) -> Result<Vec<Value>, TaskError>;

    /// Output sinks declared by this task, in positional order.
    fn outputs(&self) -> Vec<Arc<dyn OutputSink>>;
}

/// Destination a task result can be written to.
pub trait OutputSink: Send + Sync {
    /// Name for log lines.
    fn name(&self) -> &str;

    /// Write one result value into the sink.
    fn write(&self, value: Value) -> Result<(), SinkError>;
}
