//! Workloads shipped with the engine.
//!
//! They do no real I/O and exist to smoke-test agents and to measure the
//! engine's own overhead:
//!
//! - `noop`: endless sequence numbers, loader does nothing.
//! - `sleep`: generator sleeps `generateMs`, loader sleeps `loadMs`.
//! - `flaky`: loader sleeps `loadMs` and fails with probability `failRate`.
//!
//! All three read the number of generators and loaders from the `generators`
//! and `loaders` properties (default 1).

use rand::Rng;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::error::{WorkloadError, WorkloadResult};
use crate::metrics::{Counter, MetricRegistry};
use crate::plugin::{TypedWorkload, Workload, WorkloadFactory, WorkloadRegistry};
use crate::props::{Properties, GENERATORS, LOADERS};
use crate::workload::{many, BoxGenerator, BoxLoader, Generator, Loader};

pub const GENERATE_MS: &str = "generateMs";
pub const LOAD_MS: &str = "loadMs";
pub const FAIL_RATE: &str = "failRate";

impl WorkloadRegistry {
    /// Registry preloaded with the built-in workloads.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(NoopWorkload).register(SleepWorkload).register(FlakyWorkload);
        registry
    }
}

fn counts(props: &Properties) -> WorkloadResult<(usize, usize)> {
    let generators = props.parse_or(GENERATORS, 1usize);
    let loaders = props.parse_or(LOADERS, 1usize);
    if loaders == 0 {
        return Err(WorkloadError::new("loaders must be > 0"));
    }
    Ok((generators, loaders))
}

fn millis(props: &Properties, key: &str, default: u64) -> Duration {
    Duration::from_millis(props.parse_or(key, default))
}

/// Endless sequence numbers, optionally pausing before each one.
#[derive(Debug)]
pub struct SequenceGenerator {
    next: u64,
    pause: Duration,
}

impl SequenceGenerator {
    pub fn new(pause: Duration) -> Self {
        Self { next: 0, pause }
    }
}

impl Generator<u64> for SequenceGenerator {
    fn generate(&mut self) -> WorkloadResult<Option<u64>> {
        if !self.pause.is_zero() {
            thread::sleep(self.pause);
        }
        self.next += 1;
        Ok(Some(self.next))
    }
}

/// Sleeps for a fixed time and fails with a given probability.
#[derive(Debug)]
pub struct SleepLoader {
    pause: Duration,
    fail_rate: f64,
    failures: Option<Arc<Counter>>,
}

impl SleepLoader {
    pub fn new(pause: Duration, fail_rate: f64) -> Self {
        Self {
            pause,
            fail_rate: fail_rate.clamp(0.0, 1.0),
            failures: None,
        }
    }
}

impl Loader<u64> for SleepLoader {
    fn init(&mut self, _props: &Properties, registry: &MetricRegistry) -> WorkloadResult<()> {
        if self.fail_rate > 0.0 {
            self.failures = Some(registry.counter("flaky.injectedFailures"));
        }
        Ok(())
    }

    fn run(&mut self, task: u64) -> WorkloadResult<()> {
        if !self.pause.is_zero() {
            thread::sleep(self.pause);
        }
        if self.fail_rate > 0.0 && rand::thread_rng().gen_bool(self.fail_rate) {
            if let Some(failures) = &self.failures {
                failures.inc();
            }
            return Err(WorkloadError::new(format!("injected failure for task {task}")));
        }
        Ok(())
    }
}

fn build(
    props: &Properties,
    generator_pause: Duration,
    loader_pause: Duration,
    fail_rate: f64,
) -> WorkloadResult<Box<dyn Workload>> {
    let (generators, loaders) = counts(props)?;
    let generators: Vec<BoxGenerator<u64>> = many(generators, |_| {
        Box::new(SequenceGenerator::new(generator_pause)) as BoxGenerator<u64>
    });
    let loaders: Vec<BoxLoader<u64>> = many(loaders, |_| {
        Box::new(SleepLoader::new(loader_pause, fail_rate)) as BoxLoader<u64>
    });
    Ok(Box::new(TypedWorkload::new(generators, loaders)))
}

pub struct NoopWorkload;

impl WorkloadFactory for NoopWorkload {
    fn name(&self) -> &str {
        "noop"
    }

    fn description(&self) -> &str {
        "endless tasks executed by a loader that does nothing"
    }

    fn build(&self, props: &Properties) -> WorkloadResult<Box<dyn Workload>> {
        build(props, Duration::ZERO, Duration::ZERO, 0.0)
    }
}

pub struct SleepWorkload;

impl WorkloadFactory for SleepWorkload {
    fn name(&self) -> &str {
        "sleep"
    }

    fn description(&self) -> &str {
        "generator sleeps generateMs, loader sleeps loadMs (default 10)"
    }

    fn build(&self, props: &Properties) -> WorkloadResult<Box<dyn Workload>> {
        build(
            props,
            millis(props, GENERATE_MS, 0),
            millis(props, LOAD_MS, 10),
            0.0,
        )
    }
}

pub struct FlakyWorkload;

impl WorkloadFactory for FlakyWorkload {
    fn name(&self) -> &str {
        "flaky"
    }

    fn description(&self) -> &str {
        "loader sleeps loadMs and fails with probability failRate (default 0.1)"
    }

    fn build(&self, props: &Properties) -> WorkloadResult<Box<dyn Workload>> {
        let fail_rate: f64 = props.parse_or(FAIL_RATE, 0.1);
        if !(0.0..=1.0).contains(&fail_rate) {
            return Err(WorkloadError::new(format!(
                "{FAIL_RATE} must be within [0, 1], got {fail_rate}"
            )));
        }
        build(props, Duration::ZERO, millis(props, LOAD_MS, 0), fail_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::LoadGenerator;

    fn run(name: &str, props: Properties, max_tasks: i64) -> crate::stats::MetricsSnapshot {
        let registry = WorkloadRegistry::with_builtins();
        let workload = registry.get(name).unwrap().build(&props).unwrap();
        let engine = LoadGenerator::new(EngineConfig::with_limits(-1, max_tasks, -1.0));
        workload.start(&engine, props).unwrap();
        engine.join().unwrap();
        engine.snapshot()
    }

    #[test]
    fn test_builtins_registered() {
        let registry = WorkloadRegistry::with_builtins();
        assert_eq!(registry.names(), vec!["flaky", "noop", "sleep"]);
    }

    #[test]
    fn test_noop_runs_exact_count() {
        let props = Properties::new().with(GENERATORS, 2).with(LOADERS, 3);
        let stats = run("noop", props, 50);
        assert_eq!(stats.success.count, 50);
        assert_eq!(stats.exceptions.count, 0);
    }

    #[test]
    fn test_flaky_always_failing() {
        let props = Properties::new().with(FAIL_RATE, 1.0);
        let stats = run("flaky", props, 20);
        assert_eq!(stats.exceptions.count, 20);
        assert_eq!(stats.user_defined.counters["flaky.injectedFailures"], 20);
    }

    #[test]
    fn test_flaky_rejects_bad_rate() {
        let registry = WorkloadRegistry::with_builtins();
        let props = Properties::new().with(FAIL_RATE, 1.5);
        assert!(registry.get("flaky").unwrap().build(&props).is_err());
    }

    #[test]
    fn test_zero_loaders_rejected() {
        let registry = WorkloadRegistry::with_builtins();
        let props = Properties::new().with(LOADERS, 0);
        assert!(registry.get("sleep").unwrap().build(&props).is_err());
    }
}
