use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, TryLockError};

use tracing::{debug, error, info, warn};

use taskmill_core::{JobId, SchedulerConfig, SchedulerError, Task};

use crate::executor::Executor;
use crate::job::{Job, StatusListener};
use crate::metrics::SchedulerMetrics;
use crate::queue::AdmissionQueue;

struct SchedulerInner {
    /// Registry of every live job, keyed by job id. Guarded on its own;
    /// the admission lock does not protect it.
    jobs: RwLock<HashMap<JobId, Job>>,
    /// The admission lock. Holding it is the only way to touch the queue,
    /// so at most one admission pass observes queue/capacity state at a time.
    admission: Mutex<AdmissionQueue>,
    executor: Executor,
    /// Creation-sequence source; defines the "latest job" order per task.
    sequence: AtomicU64,
    metrics: RwLock<SchedulerMetrics>,
}

impl SchedulerInner {
    /// Admission pass: dispatch queued jobs while capacity lasts.
    ///
    /// Callers must hold the admission lock (`queue` is its guard's
    /// contents). Capacity is re-checked before every dispatch.
    fn drain(&self, queue: &mut AdmissionQueue) {
        while !queue.is_empty() && self.executor.can_execute() {
            if let Some(job) = queue.dequeue() {
                debug!(job = %job.id(), "dispatching job to executor");
                self.executor.execute(job);
            }
        }
    }

    /// Internal status listener: when a job finishes, try a new admission
    /// pass so queued work drains without external polling.
    ///
    /// The lock is acquired non-blocking. Losing the race is fine: whoever
    /// holds the lock re-checks capacity before each dispatch and drains as
    /// far as capacity allows. Blocking here would let a worker thread wait
    /// on a pass that may itself be dispatching.
    fn on_status_change(&self, job: &Job) {
        let status = job.status();
        if !status.is_finished() {
            return;
        }

        if let Ok(mut metrics) = self.metrics.write() {
            metrics.record_finished(status);
        }

        match self.admission.try_lock() {
            Ok(mut queue) => {
                let pass = catch_unwind(AssertUnwindSafe(|| self.drain(&mut queue)));
                if pass.is_err() {
                    error!(
                        job = %job.id(),
                        "admission pass failed after job completion; queued jobs stay pending until the next pass"
                    );
                }
            }
            Err(TryLockError::WouldBlock) => {
                debug!(job = %job.id(), "admission pass already in progress; skipping re-dispatch");
            }
            Err(TryLockError::Poisoned(err)) => {
                error!(job = %job.id(), error = %err, "admission lock poisoned; skipping re-dispatch");
            }
        }
    }
}

/// Creates and schedules jobs from tasks and keeps their states.
///
/// Cheap to clone; clones share the same registry, queue, and executor.
#[derive(Clone)]
pub struct TaskScheduler {
    inner: Arc<SchedulerInner>,
}

impl TaskScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                jobs: RwLock::new(HashMap::new()),
                admission: Mutex::new(AdmissionQueue::new()),
                executor: Executor::new(&config),
                sequence: AtomicU64::new(0),
                metrics: RwLock::new(SchedulerMetrics::default()),
            }),
        }
    }

    /// Submit one execution of `task` as a new job.
    ///
    /// The job is registered, enqueued, moved to `Pending`, and one
    /// admission pass runs before this returns; with spare capacity the job
    /// may already be running. Execution itself is never awaited (except in
    /// sequential mode, where dispatched jobs run inline).
    ///
    /// `callbacks` are invoked synchronously on every status change, after
    /// the scheduler's own re-dispatch listener, on whichever thread
    /// performs the transition. They must not call `submit`.
    pub fn submit(
        &self,
        task: Arc<dyn Task>,
        callbacks: Vec<StatusListener>,
    ) -> Result<Job, SchedulerError> {
        let job = self.create_job(task, callbacks);
        info!(job = %job.id(), task = %job.task().id(), "job submitted");

        let mut queue = self
            .inner
            .admission
            .lock()
            .map_err(|e| SchedulerError::LockPoisoned(format!("admission lock: {e}")))?;
        queue.enqueue(job.clone());
        job.pending();
        self.inner.drain(&mut queue);

        Ok(job)
    }

    /// Look up a job by id.
    pub fn get_job(&self, job_id: &str) -> Result<Job, SchedulerError> {
        let jobs = self.inner.jobs.read().unwrap();
        match jobs.get(job_id) {
            Some(job) => Ok(job.clone()),
            None => {
                error!(job = %job_id, "job does not exist");
                Err(SchedulerError::NonExistingJob(job_id.to_string()))
            }
        }
    }

    /// Snapshot of every job currently in the registry.
    pub fn get_jobs(&self) -> Vec<Job> {
        self.inner.jobs.read().unwrap().values().cloned().collect()
    }

    /// Remove a finished job from the registry.
    pub fn delete(&self, job: &Job) -> Result<(), SchedulerError> {
        if !job.is_finished() {
            let err = SchedulerError::JobNotDeleted(job.id().to_string());
            warn!(job = %job.id(), status = %job.status(), "{}", err);
            return Err(err);
        }

        let removed = self.inner.jobs.write().unwrap().remove(job.id());
        if removed.is_none() {
            error!(job = %job.id(), "job does not exist");
            return Err(SchedulerError::NonExistingJob(job.id().to_string()));
        }
        debug!(job = %job.id(), "job deleted");
        Ok(())
    }

    /// The most recently submitted job for `task_id`, by creation sequence.
    pub fn get_latest_job(&self, task_id: &str) -> Result<Job, SchedulerError> {
        let jobs = self.inner.jobs.read().unwrap();
        jobs.values()
            .filter(|job| job.task().id() == task_id)
            .max_by_key(|job| job.sequence())
            .cloned()
            .ok_or_else(|| SchedulerError::NoJobForTask(task_id.to_string()))
    }

    /// Snapshot of the scheduler counters.
    pub fn metrics(&self) -> SchedulerMetrics {
        self.inner.metrics.read().unwrap().clone()
    }

    /// Number of jobs currently running.
    pub fn running_jobs(&self) -> usize {
        self.inner.executor.running_jobs()
    }

    /// Number of jobs waiting in the admission queue.
    pub fn queued_jobs(&self) -> usize {
        self.inner.admission.lock().unwrap().len()
    }

    /// Ids of queued jobs in dispatch order.
    pub fn queued_job_ids(&self) -> Vec<String> {
        self.inner.admission.lock().unwrap().queued_ids()
    }

    fn create_job(&self, task: Arc<dyn Task>, callbacks: Vec<StatusListener>) -> Job {
        let sequence = self.inner.sequence.fetch_add(1, Ordering::SeqCst) + 1;

        // The internal listener holds a weak handle: registry-held jobs must
        // not keep the scheduler alive through their own listeners.
        let weak = Arc::downgrade(&self.inner);
        let internal: StatusListener = Arc::new(move |job: &Job| {
            if let Some(inner) = weak.upgrade() {
                inner.on_status_change(job);
            }
        });

        let mut listeners = Vec::with_capacity(callbacks.len() + 1);
        listeners.push(internal);
        listeners.extend(callbacks);

        let job = Job::new(task, sequence, listeners);
        self.inner
            .jobs
            .write()
            .unwrap()
            .insert(job.id().to_string(), job.clone());
        if let Ok(mut metrics) = self.inner.metrics.write() {
            metrics.record_submission(job.task().id());
        }
        job
    }
}
