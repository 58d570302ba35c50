use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use taskmill_core::SchedulerConfig;

use crate::job::Job;

/// Runs jobs while enforcing the configured concurrency ceiling.
///
/// In parallel mode each job runs on a thread of a dedicated rayon pool
/// sized to the ceiling; in sequential mode jobs run inline on the
/// dispatching thread, one at a time.
pub struct Executor {
    max_parallel: usize,
    /// Worker pool; `None` in sequential mode.
    pool: Option<rayon::ThreadPool>,
    running: Arc<AtomicUsize>,
}

impl Executor {
    pub fn new(config: &SchedulerConfig) -> Self {
        let max_parallel = config.resolved_max_parallel();
        let pool = if config.parallel_execution {
            info!(max_parallel, "executor starting in parallel mode");
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(max_parallel)
                    .thread_name(|i| format!("taskmill-worker-{i}"))
                    .build()
                    .expect("Failed to build rayon thread pool"),
            )
        } else {
            info!("executor starting in sequential mode");
            None
        };

        Self {
            max_parallel,
            pool,
            running: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Whether a free execution slot exists right now.
    pub fn can_execute(&self) -> bool {
        let running = self.running.load(Ordering::SeqCst);
        match self.pool {
            Some(_) => running < self.max_parallel,
            None => running == 0,
        }
    }

    /// Number of jobs currently running.
    pub fn running_jobs(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Transition `job` to Running and run its task.
    ///
    /// Parallel mode returns as soon as the run is handed to the pool;
    /// sequential mode returns once the job is terminal. The running counter
    /// is decremented before the terminal transition so completion listeners
    /// observe the freed slot.
    pub fn execute(&self, job: Job) {
        job.running();
        self.running.fetch_add(1, Ordering::SeqCst);

        match &self.pool {
            Some(pool) => {
                let running = Arc::clone(&self.running);
                pool.spawn(move || {
                    let succeeded = run_job(&job);
                    running.fetch_sub(1, Ordering::SeqCst);
                    finish(&job, succeeded);
                });
            }
            None => {
                let succeeded = run_job(&job);
                self.running.fetch_sub(1, Ordering::SeqCst);
                finish(&job, succeeded);
            }
        }
    }
}

fn finish(job: &Job, succeeded: bool) {
    if succeeded {
        job.completed();
    } else {
        job.failed();
    }
}

/// Run the task body and deliver results. Returns whether the task ran
/// without raising; sink trouble never fails the job.
fn run_job(job: &Job) -> bool {
    debug!(job = %job.id(), task = %job.task().id(), "running job");

    match catch_unwind(AssertUnwindSafe(|| job.task().run())) {
        Ok(Ok(results)) => {
            deliver_results(job, results);
            true
        }
        Ok(Err(err)) => {
            warn!(job = %job.id(), error = %err, "task raised an error");
            false
        }
        Err(_) => {
            error!(job = %job.id(), "task panicked");
            false
        }
    }
}

/// Write results to the task's declared sinks, pairing them positionally.
///
/// A result/sink arity mismatch skips delivery entirely; a single failing
/// sink is logged and the remaining sinks are still attempted.
fn deliver_results(job: &Job, results: Vec<Value>) {
    let sinks = job.task().outputs();
    if sinks.is_empty() && results.is_empty() {
        return;
    }
    if sinks.len() != results.len() {
        warn!(
            job = %job.id(),
            sinks = sinks.len(),
            results = results.len(),
            "result/sink arity mismatch; skipping delivery"
        );
        return;
    }

    for (sink, value) in sinks.iter().zip(results) {
        if let Err(err) = sink.write(value) {
            error!(
                job = %job.id(),
                sink = %sink.name(),
                error = %err,
                "failed to write result to sink"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use serde_json::{json, Value};
    use taskmill_core::{OutputSink, SinkError, Task, TaskError};

    use crate::job::JobStatus;

    struct CollectingSink {
        name: String,
        fail: bool,
        values: Mutex<Vec<Value>>,
    }

    impl CollectingSink {
        fn new(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                fail: false,
                values: Mutex::new(Vec::new()),
            })
        }

        fn failing(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                fail: true,
                values: Mutex::new(Vec::new()),
            })
        }

        fn values(&self) -> Vec<Value> {
            self.values.lock().unwrap().clone()
        }
    }

    impl OutputSink for CollectingSink {
        fn name(&self) -> &str {
            &self.name
        }
        fn write(&self, value: Value) -> Result<(), SinkError> {
            if self.fail {
                return Err(SinkError::Rejected(format!("{} is read-only", self.name)));
            }
            self.values.lock().unwrap().push(value);
            Ok(())
        }
    }

    struct FixtureTask {
        id: String,
        results: Result<Vec<Value>, String>,
        sinks: Vec<Arc<CollectingSink>>,
        panics: bool,
    }

    impl Task for FixtureTask {
        fn id(&self) -> &str {
            &self.id
        }
        fn run(&self) -> Result<Vec<Value>, TaskError> {
            if self.panics {
                panic!("fixture task panicked");
            }
            self.results
                .clone()
                .map_err(TaskError::Failed)
        }
        fn outputs(&self) -> Vec<Arc<dyn OutputSink>> {
            self.sinks
                .iter()
                .map(|s| Arc::clone(s) as Arc<dyn OutputSink>)
                .collect()
        }
    }

    fn sequential_executor() -> Executor {
        Executor::new(&SchedulerConfig {
            parallel_execution: false,
            max_parallel_jobs: 1,
        })
    }

    fn job_for(task: FixtureTask) -> Job {
        Job::new(Arc::new(task), 1, Vec::new())
    }

    #[test]
    fn sequential_execute_runs_inline_to_completion() {
        let executor = sequential_executor();
        let sink = CollectingSink::new("out");
        let job = job_for(FixtureTask {
            id: "emit".into(),
            results: Ok(vec![json!(42)]),
            sinks: vec![Arc::clone(&sink)],
            panics: false,
        });

        executor.execute(job.clone());

        assert_eq!(job.status(), JobStatus::Completed);
        assert_eq!(sink.values(), vec![json!(42)]);
        assert_eq!(executor.running_jobs(), 0);
        assert!(executor.can_execute());
    }

    #[test]
    fn task_error_fails_the_job() {
        let executor = sequential_executor();
        let job = job_for(FixtureTask {
            id: "broken".into(),
            results: Err("boom".into()),
            sinks: Vec::new(),
            panics: false,
        });

        executor.execute(job.clone());
        assert_eq!(job.status(), JobStatus::Failed);
    }

    #[test]
    fn task_panic_fails_the_job_without_crashing() {
        let executor = sequential_executor();
        let job = job_for(FixtureTask {
            id: "panicky".into(),
            results: Ok(Vec::new()),
            sinks: Vec::new(),
            panics: true,
        });

        executor.execute(job.clone());
        assert_eq!(job.status(), JobStatus::Failed);
        assert_eq!(executor.running_jobs(), 0);
    }

    #[test]
    fn arity_mismatch_skips_delivery_but_completes() {
        let executor = sequential_executor();
        let a = CollectingSink::new("a");
        let b = CollectingSink::new("b");
        let job = job_for(FixtureTask {
            id: "mismatch".into(),
            results: Ok(vec![json!(1)]),
            sinks: vec![Arc::clone(&a), Arc::clone(&b)],
            panics: false,
        });

        executor.execute(job.clone());

        assert_eq!(job.status(), JobStatus::Completed);
        assert!(a.values().is_empty());
        assert!(b.values().is_empty());
    }

    #[test]
    fn failing_sink_does_not_stop_remaining_sinks() {
        let executor = sequential_executor();
        let bad = CollectingSink::failing("bad");
        let good = CollectingSink::new("good");
        let job = job_for(FixtureTask {
            id: "partial".into(),
            results: Ok(vec![json!("x"), json!("y")]),
            sinks: vec![Arc::clone(&bad), Arc::clone(&good)],
            panics: false,
        });

        executor.execute(job.clone());

        assert_eq!(job.status(), JobStatus::Completed);
        assert!(bad.values().is_empty());
        assert_eq!(good.values(), vec![json!("y")]);
    }

    #[test]
    fn parallel_capacity_reflects_running_jobs() {
        let executor = Executor::new(&SchedulerConfig {
            parallel_execution: true,
            max_parallel_jobs: 1,
        });
        assert!(executor.can_execute());

        let job = job_for(FixtureTask {
            id: "sleepy".into(),
            results: Ok(Vec::new()),
            sinks: Vec::new(),
            panics: false,
        });
        executor.execute(job.clone());

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while !job.is_finished() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(job.status(), JobStatus::Completed);
        // The slot is freed before the terminal transition, so by now the
        // counter must be back at zero.
        assert_eq!(executor.running_jobs(), 0);
        assert!(executor.can_execute());
    }
}
