//! Run limits and engine tuning.

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default upper bound on producer threads.
pub const DEFAULT_GENERATOR_THREADS: usize = 5;

/// Default capacity of the scheduled task queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// Limits and sizing of a single run.
///
/// The three stop conditions compose independently; a value `<= 0` disables
/// the corresponding limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Wall-clock limit in seconds.
    #[serde(default = "unlimited")]
    pub max_duration_secs: i64,

    /// Total number of tasks admitted across all producers.
    #[serde(default = "unlimited")]
    pub max_tasks: i64,

    /// Steady-state ceiling in tasks per second.
    #[serde(default = "unlimited_rate")]
    pub max_rate: f64,

    /// Upper bound on producer threads, clamped to the number of generators.
    #[serde(default = "default_generator_threads")]
    pub generator_threads: usize,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn unlimited() -> i64 {
    -1
}

fn unlimited_rate() -> f64 {
    -1.0
}

fn default_generator_threads() -> usize {
    DEFAULT_GENERATOR_THREADS
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: unlimited(),
            max_tasks: unlimited(),
            max_rate: unlimited_rate(),
            generator_threads: default_generator_threads(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl EngineConfig {
    /// Config with the three stop conditions set, defaults elsewhere.
    pub fn with_limits(max_duration_secs: i64, max_tasks: i64, max_rate: f64) -> Self {
        Self {
            max_duration_secs,
            max_tasks,
            max_rate,
            ..Self::default()
        }
    }

    pub fn generator_threads(mut self, threads: usize) -> Self {
        self.generator_threads = threads;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn duration_limit(&self) -> Option<Duration> {
        (self.max_duration_secs > 0).then(|| Duration::from_secs(self.max_duration_secs as u64))
    }

    pub fn task_limit(&self) -> Option<u64> {
        (self.max_tasks > 0).then_some(self.max_tasks as u64)
    }

    pub fn rate_limit(&self) -> Option<f64> {
        (self.max_rate > 0.0 && self.max_rate.is_finite()).then_some(self.max_rate)
    }

    /// Number of producer threads for `generators` generators.
    pub fn producer_count(&self, generators: usize) -> usize {
        self.generator_threads.min(generators)
    }

    /// Validate configuration.
    pub fn validate(&self) -> EngineResult<()> {
        if self.generator_threads == 0 {
            return Err(EngineError::invalid_config("generator_threads must be > 0"));
        }
        if self.queue_capacity == 0 {
            return Err(EngineError::invalid_config("queue_capacity must be > 0"));
        }
        if self.max_rate.is_nan() {
            return Err(EngineError::invalid_config("max_rate must be a number"));
        }
        Ok(())
    }
}
