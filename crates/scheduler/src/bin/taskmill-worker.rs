//! Demo worker: submits a batch of sleep-and-emit tasks and waits for the
//! scheduler to drain them.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use clap::Parser;
use serde_json::{json, Value};
use tracing::{info, warn};

use taskmill_core::{load_dotenv, OutputSink, SchedulerConfig, SinkError, Task, TaskError};
use taskmill_scheduler::TaskScheduler;

#[derive(Parser, Debug)]
#[command(name = "taskmill-worker", about = "Run a batch of demo jobs through the scheduler")]
struct Cli {
    /// Number of jobs to submit.
    #[arg(long, default_value_t = 8)]
    jobs: usize,

    /// Concurrency ceiling (0 = available parallelism).
    #[arg(long, default_value_t = 0)]
    max_parallel: usize,

    /// Run jobs inline, one at a time.
    #[arg(long, default_value_t = false)]
    sequential: bool,

    /// How long each demo task sleeps, in milliseconds.
    #[arg(long, default_value_t = 250)]
    task_millis: u64,
}

/// Sink that keeps results in memory and logs each write.
struct MemorySink {
    name: String,
    values: Mutex<Vec<Value>>,
}

impl MemorySink {
    fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            values: Mutex::new(Vec::new()),
        })
    }

    fn len(&self) -> usize {
        self.values.lock().unwrap().len()
    }
}

impl OutputSink for MemorySink {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&self, value: Value) -> Result<(), SinkError> {
        info!(sink = %self.name, %value, "sink received result");
        self.values.lock().unwrap().push(value);
        Ok(())
    }
}

/// Sleeps for the configured duration, then emits one summary value.
struct DemoTask {
    id: String,
    millis: u64,
    sink: Arc<MemorySink>,
}

impl Task for DemoTask {
    fn id(&self) -> &str {
        &self.id
    }

    fn run(&self) -> Result<Vec<Value>, TaskError> {
        std::thread::sleep(Duration::from_millis(self.millis));
        Ok(vec![json!({ "task": self.id, "slept_ms": self.millis })])
    }

    fn outputs(&self) -> Vec<Arc<dyn OutputSink>> {
        vec![Arc::clone(&self.sink) as Arc<dyn OutputSink>]
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let cli = Cli::parse();

    let mut config = SchedulerConfig::from_env();
    if cli.sequential {
        config.parallel_execution = false;
    }
    if cli.max_parallel != 0 {
        config.max_parallel_jobs = cli.max_parallel;
    }
    info!(?config, jobs = cli.jobs, "starting demo batch");

    let scheduler = TaskScheduler::new(config);
    let sink = MemorySink::new("demo_results");

    let mut jobs = Vec::with_capacity(cli.jobs);
    for i in 0..cli.jobs {
        let task = Arc::new(DemoTask {
            id: format!("demo_{i}"),
            millis: cli.task_millis,
            sink: Arc::clone(&sink),
        });
        jobs.push(scheduler.submit(task, Vec::new())?);
    }

    let deadline = Instant::now() + Duration::from_secs(60);
    while jobs.iter().any(|job| !job.is_finished()) {
        if Instant::now() > deadline {
            warn!("timed out waiting for jobs to finish");
            break;
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    let metrics = scheduler.metrics();
    info!(
        submitted = metrics.jobs_submitted,
        completed = metrics.jobs_completed,
        failed = metrics.jobs_failed,
        sink_values = sink.len(),
        "demo batch finished"
    );

    Ok(())
}
