use std::env;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Scheduler configuration.
///
/// Parsed from the environment via [`SchedulerConfig::from_env`] or from
/// serialized form (serde defaults match the env defaults).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Whether jobs may run on worker threads. When false the scheduler
    /// runs at most one job at a time, inline on the dispatching thread.
    #[serde(default = "default_parallel_execution")]
    pub parallel_execution: bool,
    /// Maximum number of jobs running at once. 0 = available parallelism.
    #[serde(default = "default_max_parallel_jobs")]
    pub max_parallel_jobs: usize,
}

fn default_parallel_execution() -> bool {
    true
}

fn default_max_parallel_jobs() -> usize {
    0
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            parallel_execution: default_parallel_execution(),
            max_parallel_jobs: default_max_parallel_jobs(),
        }
    }
}

impl SchedulerConfig {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Self {
        Self {
            parallel_execution: env_or("TASKMILL_PARALLEL_EXECUTION", "true") == "true",
            max_parallel_jobs: env_or("TASKMILL_MAX_PARALLEL_JOBS", "0")
                .parse()
                .unwrap_or(0),
        }
    }

    /// Resolve the concurrency ceiling (0 means use available parallelism).
    pub fn resolved_max_parallel(&self) -> usize {
        if self.max_parallel_jobs == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        } else {
            self.max_parallel_jobs
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = SchedulerConfig::default();
        assert!(config.parallel_execution);
        assert_eq!(config.max_parallel_jobs, 0);
    }

    #[test]
    fn resolved_max_parallel() {
        let mut config = SchedulerConfig::default();
        // 0 means auto-detect
        assert!(config.resolved_max_parallel() > 0);

        config.max_parallel_jobs = 2;
        assert_eq!(config.resolved_max_parallel(), 2);
    }

    #[test]
    fn deserialize_with_defaults() {
        let config: SchedulerConfig = serde_json::from_str("{}").unwrap();
        assert!(config.parallel_execution);
        assert_eq!(config.max_parallel_jobs, 0);

        let config: SchedulerConfig =
            serde_json::from_str(r#"{"parallel_execution": false, "max_parallel_jobs": 3}"#)
                .unwrap();
        assert!(!config.parallel_execution);
        assert_eq!(config.max_parallel_jobs, 3);
    }
}
