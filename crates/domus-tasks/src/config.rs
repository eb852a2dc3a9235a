//! Scheduler sizing

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{SchedulerError, SchedulerResult};

/// Threads per available CPU in the ordinary pool
const THREADS_PER_CPU: usize = 128;

/// Pool sizes and shutdown behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum worker threads of the ordinary pool
    #[serde(default = "default_max_threads")]
    pub max_threads: usize,

    /// Worker threads reserved for system work
    #[serde(default = "default_system_threads")]
    pub system_threads: usize,

    /// How long an orderly shutdown waits for running tasks
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

fn default_max_threads() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    cpus * THREADS_PER_CPU
}

fn default_system_threads() -> usize {
    8
}

fn default_shutdown_timeout_secs() -> u64 {
    5
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_threads: default_max_threads(),
            system_threads: default_system_threads(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

impl SchedulerConfig {
    /// Configuration with an explicit ordinary pool size
    pub fn with_max_threads(max_threads: usize) -> Self {
        Self {
            max_threads,
            ..Self::default()
        }
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Reject pool sizes the runtime cannot be built with
    pub fn validate(&self) -> SchedulerResult<()> {
        if self.max_threads == 0 {
            return Err(SchedulerError::InvalidConfig(
                "max_threads must be at least 1".to_string(),
            ));
        }
        if self.system_threads == 0 {
            return Err(SchedulerError::InvalidConfig(
                "system_threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
