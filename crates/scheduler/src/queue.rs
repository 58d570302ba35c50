use std::collections::VecDeque;

use crate::job::Job;

/// Strict FIFO backlog of jobs awaiting a free execution slot.
///
/// Every job in here is `Pending`. A job is enqueued exactly once (from
/// `submit`) and dequeued exactly once (by an admission pass). All mutation
/// happens inside the scheduler's admission critical section; the admission
/// lock *is* this queue's guard.
#[derive(Debug, Default)]
pub struct AdmissionQueue {
    jobs: VecDeque<Job>,
}

impl AdmissionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, job: Job) {
        self.jobs.push_back(job);
    }

    pub fn dequeue(&mut self) -> Option<Job> {
        self.jobs.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Ids of queued jobs in dispatch order, for diagnostics and tests.
    pub fn queued_ids(&self) -> Vec<String> {
        self.jobs.iter().map(|job| job.id().to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::Value;
    use taskmill_core::{OutputSink, Task, TaskError};

    struct NoopTask;

    impl Task for NoopTask {
        fn id(&self) -> &str {
            "noop"
        }
        fn run(&self) -> Result<Vec<Value>, TaskError> {
            Ok(Vec::new())
        }
        fn outputs(&self) -> Vec<Arc<dyn OutputSink>> {
            Vec::new()
        }
    }

    #[test]
    fn dequeues_in_submission_order() {
        let mut queue = AdmissionQueue::new();
        assert!(queue.is_empty());

        let a = Job::new(Arc::new(NoopTask), 1, Vec::new());
        let b = Job::new(Arc::new(NoopTask), 2, Vec::new());
        let c = Job::new(Arc::new(NoopTask), 3, Vec::new());
        queue.enqueue(a.clone());
        queue.enqueue(b.clone());
        queue.enqueue(c.clone());

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.queued_ids(), vec![a.id(), b.id(), c.id()]);

        assert_eq!(queue.dequeue().unwrap().id(), a.id());
        assert_eq!(queue.dequeue().unwrap().id(), b.id());
        assert_eq!(queue.dequeue().unwrap().id(), c.id());
        assert!(queue.dequeue().is_none());
        assert!(queue.is_empty());
    }
}
