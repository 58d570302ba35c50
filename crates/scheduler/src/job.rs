use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use taskmill_core::{new_job_id, JobId, Task};

/// Status of a job. Variant order is the lifecycle order, so `PartialOrd`
/// can reject backward transitions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum JobStatus {
    /// Constructed, not yet admitted.
    Created,
    /// Enqueued, awaiting a free execution slot.
    Pending,
    /// Handed to the executor.
    Running,
    /// Task ran without error. Terminal.
    Completed,
    /// Task raised or panicked. Terminal.
    Failed,
}

impl JobStatus {
    /// True for the two terminal statuses.
    pub fn is_finished(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Created => write!(f, "Created"),
            JobStatus::Pending => write!(f, "Pending"),
            JobStatus::Running => write!(f, "Running"),
            JobStatus::Completed => write!(f, "Completed"),
            JobStatus::Failed => write!(f, "Failed"),
        }
    }
}

/// Handler invoked synchronously with the job on every status change.
pub type StatusListener = Arc<dyn Fn(&Job) + Send + Sync>;

struct JobInner {
    id: JobId,
    task: Arc<dyn Task>,
    /// Creation-sequence ordering key; greater = more recently submitted.
    sequence: u64,
    created_at: DateTime<Utc>,
    status: RwLock<JobStatus>,
    /// Fixed at creation; invoked in registration order.
    listeners: Vec<StatusListener>,
}

/// One tracked execution attempt of a task.
///
/// Cheap to clone: clones share the same status and listeners. The
/// scheduler's registry owns the canonical set of jobs; handles held by the
/// admission queue, worker threads, and callers all point at the same state.
#[derive(Clone)]
pub struct Job {
    inner: Arc<JobInner>,
}

impl Job {
    /// Create a job for one submission of `task`.
    ///
    /// `sequence` must be unique and monotonically increasing across the
    /// owning scheduler; it defines the "latest job" order for a task.
    pub fn new(task: Arc<dyn Task>, sequence: u64, listeners: Vec<StatusListener>) -> Self {
        let id = new_job_id(task.id());
        Self {
            inner: Arc::new(JobInner {
                id,
                task,
                sequence,
                created_at: Utc::now(),
                status: RwLock::new(JobStatus::Created),
                listeners,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn task(&self) -> &Arc<dyn Task> {
        &self.inner.task
    }

    pub fn sequence(&self) -> u64 {
        self.inner.sequence
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }

    pub fn status(&self) -> JobStatus {
        *self.inner.status.read().unwrap()
    }

    pub fn is_finished(&self) -> bool {
        self.status().is_finished()
    }

    /// Mark the job as admitted to the queue.
    pub fn pending(&self) {
        self.transition(JobStatus::Pending);
    }

    /// Mark the job as handed to the executor.
    pub fn running(&self) {
        self.transition(JobStatus::Running);
    }

    /// Mark the job as successfully finished.
    pub fn completed(&self) {
        self.transition(JobStatus::Completed);
    }

    /// Mark the job as finished in error.
    pub fn failed(&self) {
        self.transition(JobStatus::Failed);
    }

    /// Advance the status, then notify listeners in registration order.
    ///
    /// Backward moves and moves out of a terminal status are refused. The
    /// status lock is released before listeners run, so listeners may read
    /// the job freely.
    fn transition(&self, next: JobStatus) {
        {
            let mut status = self.inner.status.write().unwrap();
            if status.is_finished() || next <= *status {
                warn!(
                    job = %self.inner.id,
                    from = %status,
                    to = %next,
                    "refusing non-monotonic status transition"
                );
                return;
            }
            debug!(job = %self.inner.id, from = %status, to = %next, "job status change");
            *status = next;
        }
        self.notify();
    }

    /// A panicking listener is isolated: it is logged and the remaining
    /// listeners still run.
    fn notify(&self) {
        for listener in &self.inner.listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(self))).is_err() {
                error!(job = %self.inner.id, "status listener panicked; continuing");
            }
        }
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.inner.id)
            .field("task", &self.inner.task.id())
            .field("sequence", &self.inner.sequence)
            .field("status", &self.status())
            .finish()
    }
}
