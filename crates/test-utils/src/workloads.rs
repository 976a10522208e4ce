//! Generators and loaders with predictable, observable behavior.

use load_engine::{Generator, Loader, MetricRegistry, Properties, WorkloadError, WorkloadResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Shared counters of lifecycle calls, cloned into every instance under test.
#[derive(Debug, Default)]
pub struct Probe {
    inits: AtomicUsize,
    calls: AtomicUsize,
    closes: AtomicUsize,
    props: Mutex<Vec<Properties>>,
}

impl Probe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inits(&self) -> usize {
        self.inits.load(Ordering::SeqCst)
    }

    /// `generate()` or `run()` calls.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Properties received by every `init()`, in call order.
    pub fn props(&self) -> Vec<Properties> {
        self.props.lock().expect("probe lock poisoned").clone()
    }

    fn record_init(&self, props: &Properties) {
        self.inits.fetch_add(1, Ordering::SeqCst);
        self.props
            .lock()
            .expect("probe lock poisoned")
            .push(props.clone());
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn record_close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Yields a clone of one item, forever or a fixed number of times.
#[derive(Debug)]
pub struct ConstGenerator<T> {
    item: T,
    remaining: Option<usize>,
    probe: Arc<Probe>,
}

impl<T: Clone> ConstGenerator<T> {
    pub fn endless(item: T) -> Self {
        Self {
            item,
            remaining: None,
            probe: Probe::new(),
        }
    }

    pub fn limited(item: T, count: usize) -> Self {
        Self {
            item,
            remaining: Some(count),
            probe: Probe::new(),
        }
    }

    pub fn with_probe(mut self, probe: Arc<Probe>) -> Self {
        self.probe = probe;
        self
    }
}

impl<T: Clone + Send> Generator<T> for ConstGenerator<T> {
    fn init(&mut self, props: &Properties, _registry: &MetricRegistry) -> WorkloadResult<()> {
        self.probe.record_init(props);
        Ok(())
    }

    fn generate(&mut self) -> WorkloadResult<Option<T>> {
        self.probe.record_call();
        match &mut self.remaining {
            Some(0) => Ok(None),
            Some(n) => {
                *n -= 1;
                Ok(Some(self.item.clone()))
            }
            None => Ok(Some(self.item.clone())),
        }
    }

    fn close(&mut self) -> WorkloadResult<()> {
        self.probe.record_close();
        Ok(())
    }
}

/// Endless generator that sleeps before producing each task.
#[derive(Debug)]
pub struct SleepingGenerator {
    pause: Duration,
    next: u64,
}

impl SleepingGenerator {
    pub fn new(pause: Duration) -> Self {
        Self { pause, next: 0 }
    }
}

impl Generator<u64> for SleepingGenerator {
    fn generate(&mut self) -> WorkloadResult<Option<u64>> {
        thread::sleep(self.pause);
        self.next += 1;
        Ok(Some(self.next))
    }
}

/// Generator whose `generate()` always fails.
#[derive(Debug)]
pub struct FailingGenerator {
    probe: Arc<Probe>,
}

impl FailingGenerator {
    pub fn new(probe: Arc<Probe>) -> Self {
        Self { probe }
    }
}

impl<T> Generator<T> for FailingGenerator {
    fn init(&mut self, props: &Properties, _registry: &MetricRegistry) -> WorkloadResult<()> {
        self.probe.record_init(props);
        Ok(())
    }

    fn generate(&mut self) -> WorkloadResult<Option<T>> {
        self.probe.record_call();
        Err(WorkloadError::new("generator failure"))
    }

    fn close(&mut self) -> WorkloadResult<()> {
        self.probe.record_close();
        Ok(())
    }
}

/// Loader that only counts its calls.
#[derive(Debug)]
pub struct CountingLoader {
    probe: Arc<Probe>,
}

impl CountingLoader {
    pub fn new(probe: Arc<Probe>) -> Self {
        Self { probe }
    }
}

impl<T> Loader<T> for CountingLoader {
    fn init(&mut self, props: &Properties, _registry: &MetricRegistry) -> WorkloadResult<()> {
        self.probe.record_init(props);
        Ok(())
    }

    fn run(&mut self, _task: T) -> WorkloadResult<()> {
        self.probe.record_call();
        Ok(())
    }

    fn close(&mut self) -> WorkloadResult<()> {
        self.probe.record_close();
        Ok(())
    }
}

/// Loader that sleeps for a fixed time per task.
#[derive(Debug)]
pub struct SleepingLoader {
    pause: Duration,
    probe: Arc<Probe>,
}

impl SleepingLoader {
    pub fn new(pause: Duration) -> Self {
        Self {
            pause,
            probe: Probe::new(),
        }
    }

    pub fn with_probe(mut self, probe: Arc<Probe>) -> Self {
        self.probe = probe;
        self
    }
}

impl<T> Loader<T> for SleepingLoader {
    fn run(&mut self, _task: T) -> WorkloadResult<()> {
        thread::sleep(self.pause);
        self.probe.record_call();
        Ok(())
    }

    fn close(&mut self) -> WorkloadResult<()> {
        self.probe.record_close();
        Ok(())
    }
}

/// Loader that fails every `every`-th call (every call when `every == 1`).
#[derive(Debug)]
pub struct FailingLoader {
    every: usize,
    seen: usize,
    probe: Arc<Probe>,
}

impl FailingLoader {
    pub fn always(probe: Arc<Probe>) -> Self {
        Self::every(1, probe)
    }

    pub fn every(every: usize, probe: Arc<Probe>) -> Self {
        Self {
            every: every.max(1),
            seen: 0,
            probe,
        }
    }
}

impl<T> Loader<T> for FailingLoader {
    fn run(&mut self, _task: T) -> WorkloadResult<()> {
        self.probe.record_call();
        self.seen += 1;
        if self.seen % self.every == 0 {
            Err(WorkloadError::new("loader failure"))
        } else {
            Ok(())
        }
    }

    fn close(&mut self) -> WorkloadResult<()> {
        self.probe.record_close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limited_const_generator() {
        let probe = Probe::new();
        let mut generator = ConstGenerator::limited("x", 2).with_probe(Arc::clone(&probe));
        assert_eq!(generator.generate().unwrap(), Some("x"));
        assert_eq!(generator.generate().unwrap(), Some("x"));
        assert_eq!(generator.generate().unwrap(), None);
        assert_eq!(probe.calls(), 3);
    }

    #[test]
    fn test_failing_loader_every_third() {
        let probe = Probe::new();
        let mut loader = FailingLoader::every(3, Arc::clone(&probe));
        let results: Vec<bool> = (0..6)
            .map(|i: u32| Loader::run(&mut loader, i).is_ok())
            .collect();
        assert_eq!(results, vec![true, true, false, true, true, false]);
        assert_eq!(probe.calls(), 6);
    }
}
