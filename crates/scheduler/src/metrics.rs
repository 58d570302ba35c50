use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::job::JobStatus;

/// Scheduler operational counters, snapshotted via
/// [`crate::TaskScheduler::metrics`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerMetrics {
    /// Jobs accepted through `submit`.
    pub jobs_submitted: u64,
    /// Jobs that reached `Completed`.
    pub jobs_completed: u64,
    /// Jobs that reached `Failed`.
    pub jobs_failed: u64,
    /// Submissions per task id.
    pub jobs_per_task: HashMap<String, u64>,
    /// When the most recent submission was accepted.
    pub last_submission: Option<DateTime<Utc>>,
}

impl SchedulerMetrics {
    pub fn record_submission(&mut self, task_id: &str) {
        self.jobs_submitted += 1;
        *self.jobs_per_task.entry(task_id.to_string()).or_default() += 1;
        self.last_submission = Some(Utc::now());
    }

    pub fn record_finished(&mut self, status: JobStatus) {
        match status {
            JobStatus::Completed => self.jobs_completed += 1,
            JobStatus::Failed => self.jobs_failed += 1,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_submissions_per_task() {
        let mut m = SchedulerMetrics::default();
        m.record_submission("etl");
        m.record_submission("etl");
        m.record_submission("report");

        assert_eq!(m.jobs_submitted, 3);
        assert_eq!(m.jobs_per_task["etl"], 2);
        assert_eq!(m.jobs_per_task["report"], 1);
        assert!(m.last_submission.is_some());
    }

    #[test]
    fn records_terminal_statuses_only() {
        let mut m = SchedulerMetrics::default();
        m.record_finished(JobStatus::Running);
        m.record_finished(JobStatus::Completed);
        m.record_finished(JobStatus::Failed);
        m.record_finished(JobStatus::Completed);

        assert_eq!(m.jobs_completed, 2);
        assert_eq!(m.jobs_failed, 1);
    }
}
