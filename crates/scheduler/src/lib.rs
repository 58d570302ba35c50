//! Bounded-parallelism job scheduler.
//!
//! [`TaskScheduler`] creates and tracks [`Job`]s for submitted
//! [`taskmill_core::Task`]s, admits them through a FIFO backlog, and hands
//! them to the [`Executor`] whenever a slot is free. Job completion feeds
//! back into the admission queue so pending work drains without polling.

pub mod executor;
pub mod job;
pub mod metrics;
pub mod queue;
pub mod scheduler;

pub use executor::Executor;
pub use job::{Job, JobStatus, StatusListener};
pub use metrics::SchedulerMetrics;
pub use queue::AdmissionQueue;
pub use scheduler::TaskScheduler;
