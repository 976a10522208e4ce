//! Run controller.
//!
//! [`LoadGenerator`] owns one run: it wires the shared pacing, admission and
//! termination state, launches producer and consumer threads from a controller
//! thread and exposes `join()` / `interrupt()` to the caller.

use crossbeam_channel::{bounded, RecvTimeoutError};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::admission::AdmissionGate;
use crate::cancel::CancelHandle;
use crate::config::EngineConfig;
use crate::consumer::Consumer;
use crate::error::{EngineError, EngineResult};
use crate::finalizer::TerminationCoordinator;
use crate::metrics::Metrics;
use crate::producer::{partition, AssignedGenerator, Producer, ProducerShared};
use crate::props::{Properties, GENERATORS, GENERATOR_THREADS, LOADERS, LOADER_INDEX};
use crate::queue::TaskQueue;
use crate::scheduler::RateScheduler;
use crate::stats::MetricsSnapshot;
use crate::workload::{BoxGenerator, BoxLoader};

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    NotStarted,
    Running,
    Completed,
    Interrupted,
}

impl RunState {
    pub fn is_finished(self) -> bool {
        matches!(self, RunState::Completed | RunState::Interrupted)
    }
}

/// Type-erased handle used to stop a running pipeline.
trait RunControl: Send + Sync {
    fn interrupt(&self);
}

struct Pipeline<T> {
    queue: TaskQueue<T>,
    coordinator: Arc<TerminationCoordinator<T>>,
    cancel: Arc<CancelHandle>,
}

impl<T: Send> RunControl for Pipeline<T> {
    fn interrupt(&self) {
        self.cancel.cancel();
        self.coordinator.wait_producers();
        let dropped = self.queue.clear();
        debug!(dropped, "queued tasks discarded");
        self.coordinator.release_consumers();
    }
}

struct Lifecycle {
    state: RunState,
    interrupted: bool,
    /// Set once every consumer has exited; the run can no longer be
    /// interrupted.
    workers_done: bool,
    /// A `start()` is initializing loaders.
    starting: bool,
    control: Option<Arc<dyn RunControl>>,
    controller: Option<JoinHandle<()>>,
}

struct Shared {
    lifecycle: Mutex<Lifecycle>,
    finished: Condvar,
}

impl Shared {
    fn interrupt(&self) -> EngineResult<()> {
        let control = {
            let mut lifecycle = self.lifecycle.lock();
            match lifecycle.state {
                RunState::NotStarted => return Err(EngineError::NotStarted),
                RunState::Completed | RunState::Interrupted => {
                    return Err(EngineError::NotRunning)
                }
                RunState::Running if lifecycle.workers_done => {
                    return Err(EngineError::NotRunning)
                }
                RunState::Running => {}
            }
            lifecycle.interrupted = true;
            lifecycle.control.clone()
        };
        if let Some(control) = control {
            info!("interrupting load generator");
            control.interrupt();
        }
        Ok(())
    }

    /// Record a run stopped by the engine itself.
    fn abort(&self) {
        self.lifecycle.lock().interrupted = true;
    }

    fn workers_finished(&self) {
        self.lifecycle.lock().workers_done = true;
    }

    fn finish(&self) {
        let mut lifecycle = self.lifecycle.lock();
        lifecycle.state = if lifecycle.interrupted {
            RunState::Interrupted
        } else {
            RunState::Completed
        };
        lifecycle.control = None;
        self.finished.notify_all();
    }
}

/// Drives generators and loaders under the configured limits.
///
/// All methods take `&self`, so a generator can be shared between the thread
/// that waits in `join()` and one that calls `interrupt()`.
pub struct LoadGenerator {
    config: EngineConfig,
    metrics: Arc<Metrics>,
    shared: Arc<Shared>,
}

impl std::fmt::Debug for LoadGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadGenerator")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}

impl LoadGenerator {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            metrics: Arc::new(Metrics::new()),
            shared: Arc::new(Shared {
                lifecycle: Mutex::new(Lifecycle {
                    state: RunState::NotStarted,
                    interrupted: false,
                    workers_done: false,
                    starting: false,
                    control: None,
                    controller: None,
                }),
                finished: Condvar::new(),
            }),
        }
    }

    /// Generator with the three stop conditions set, defaults elsewhere.
    pub fn with_limits(max_duration_secs: i64, max_tasks: i64, max_rate: f64) -> Self {
        Self::new(EngineConfig::with_limits(max_duration_secs, max_tasks, max_rate))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> RunState {
        self.shared.lifecycle.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.state() == RunState::Running
    }

    /// Live metrics of the run.
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Start the run without blocking.
    ///
    /// Loaders are initialized on the calling thread; a failing `init` aborts
    /// the start. Generators are initialized lazily by their producers. The
    /// state stays `NotStarted` while loaders initialize, and a concurrent
    /// `start()` fails with [`EngineError::AlreadyStarted`].
    pub fn start<T: Send + 'static>(
        &self,
        generators: Vec<BoxGenerator<T>>,
        loaders: Vec<BoxLoader<T>>,
        props: Properties,
    ) -> EngineResult<()> {
        {
            let mut lifecycle = self.shared.lifecycle.lock();
            if lifecycle.state != RunState::NotStarted || lifecycle.starting {
                return Err(EngineError::AlreadyStarted);
            }
            self.config.validate()?;
            if loaders.is_empty() {
                return Err(EngineError::NoLoaders);
            }
            lifecycle.starting = true;
        }

        // Loader init runs unlocked so state queries never wait on it.
        let prepared = self.prepare(generators, loaders, props);

        let mut lifecycle = self.shared.lifecycle.lock();
        lifecycle.starting = false;
        let (workers, pipeline) = prepared?;

        // Spawned under the lock so the controller can't finish the run
        // before it is marked running. On failure the workers are dropped
        // unstarted, which closes the loaders.
        let controller = thread::Builder::new()
            .name("load-engine-main".to_string())
            .spawn(move || workers.run())
            .map_err(|source| EngineError::Spawn {
                name: "load-engine-main".to_string(),
                source,
            })?;

        self.metrics.mark_start();
        lifecycle.state = RunState::Running;
        lifecycle.control = Some(Arc::new(pipeline));
        lifecycle.controller = Some(controller);
        Ok(())
    }

    fn prepare<T: Send + 'static>(
        &self,
        generators: Vec<BoxGenerator<T>>,
        mut loaders: Vec<BoxLoader<T>>,
        props: Properties,
    ) -> EngineResult<(Workers<T>, Pipeline<T>)> {
        let producers = self.config.producer_count(generators.len());
        let mut props = props;
        props.set(GENERATORS, generators.len());
        props.set(LOADERS, loaders.len());
        props.set(GENERATOR_THREADS, producers);

        self.init_loaders(&mut loaders, &props)?;

        let queue = TaskQueue::new(self.config.queue_capacity);
        let cancel = Arc::new(CancelHandle::new());
        let coordinator = Arc::new(TerminationCoordinator::new(
            producers,
            queue.clone(),
            cancel.signal(),
        ));
        // Built here so a loader is closed even if its thread never runs.
        let consumers: Vec<Consumer<T>> = loaders
            .into_iter()
            .enumerate()
            .map(|(index, loader)| {
                Consumer::new(
                    index,
                    loader,
                    queue.clone(),
                    Arc::clone(&self.metrics),
                    cancel.signal(),
                )
            })
            .collect();
        let shared = ProducerShared {
            queue: queue.clone(),
            scheduler: Arc::new(RateScheduler::new(self.config.max_rate)),
            gate: Arc::new(AdmissionGate::from_limit(self.config.task_limit())),
            metrics: Arc::clone(&self.metrics),
            cancel: cancel.signal(),
            props: Arc::new(props),
        };

        info!(
            producers,
            consumers = consumers.len(),
            max_duration_secs = self.config.max_duration_secs,
            max_tasks = self.config.max_tasks,
            max_rate = self.config.max_rate,
            "starting load generator"
        );

        let workers = Workers {
            slots: partition(generators, producers),
            consumers,
            shared,
            coordinator: Arc::clone(&coordinator),
            cancel: Arc::clone(&cancel),
            duration_limit: self.config.duration_limit(),
            engine: Arc::clone(&self.shared),
        };
        let pipeline = Pipeline {
            queue,
            coordinator,
            cancel,
        };
        Ok((workers, pipeline))
    }

    fn init_loaders<T>(&self, loaders: &mut [BoxLoader<T>], props: &Properties) -> EngineResult<()> {
        for index in 0..loaders.len() {
            let mut loader_props = props.clone();
            loader_props.set(LOADER_INDEX, index);
            if let Err(source) = loaders[index].init(&loader_props, self.metrics.registry()) {
                for loader in &mut loaders[..index] {
                    if let Err(e) = loader.close() {
                        warn!(error = %e, "failed to close loader");
                    }
                }
                return Err(EngineError::LoaderInit { index, source });
            }
        }
        Ok(())
    }

    /// Block until every worker has exited.
    pub fn join(&self) -> EngineResult<()> {
        let controller = {
            let mut lifecycle = self.shared.lifecycle.lock();
            if lifecycle.state == RunState::NotStarted {
                return Err(EngineError::NotStarted);
            }
            while lifecycle.state == RunState::Running {
                self.shared.finished.wait(&mut lifecycle);
            }
            lifecycle.controller.take()
        };
        if let Some(handle) = controller {
            if handle.join().is_err() {
                error!("load engine controller thread panicked");
            }
        }
        Ok(())
    }

    /// Stop the run: cancel producers, discard queued tasks and release
    /// consumers. Returns once producers have exited; use `join()` to wait
    /// for consumers.
    ///
    /// Fails with [`EngineError::NotRunning`] once every consumer has exited,
    /// even if the controller has not yet marked the run finished.
    pub fn interrupt(&self) -> EngineResult<()> {
        self.shared.interrupt()
    }

    /// `start()` followed by `join()`.
    pub fn run_to_completion<T: Send + 'static>(
        &self,
        generators: Vec<BoxGenerator<T>>,
        loaders: Vec<BoxLoader<T>>,
        props: Properties,
    ) -> EngineResult<MetricsSnapshot> {
        self.start(generators, loaders, props)?;
        self.join()?;
        Ok(self.snapshot())
    }
}

/// Everything the controller thread needs to run the workers.
struct Workers<T> {
    slots: Vec<Vec<AssignedGenerator<T>>>,
    consumers: Vec<Consumer<T>>,
    shared: ProducerShared<T>,
    coordinator: Arc<TerminationCoordinator<T>>,
    cancel: Arc<CancelHandle>,
    duration_limit: Option<Duration>,
    engine: Arc<Shared>,
}

impl<T: Send + 'static> Workers<T> {
    fn run(self) {
        let Workers {
            slots,
            consumers,
            shared,
            coordinator,
            cancel,
            duration_limit,
            engine,
        } = self;
        let metrics = Arc::clone(&shared.metrics);

        let consumers: Vec<JoinHandle<()>> = consumers
            .into_iter()
            .enumerate()
            .filter_map(|(index, consumer)| {
                spawn_worker(format!("load-thread-{index}"), move || consumer.run())
            })
            .collect();
        if consumers.is_empty() {
            // Producers would block on a queue nobody drains.
            error!("no consumer thread started, cancelling run");
            engine.abort();
            cancel.cancel();
        }

        let producers: Vec<JoinHandle<()>> = slots
            .into_iter()
            .enumerate()
            .filter_map(|(index, generators)| {
                let producer =
                    Producer::new(index, generators, shared.clone(), Arc::clone(&coordinator));
                spawn_worker(format!("generator-thread-{index}"), move || producer.run())
            })
            .collect();
        drop(shared);

        let timer = duration_limit.and_then(|limit| {
            let (stop_tx, stop_rx) = bounded::<()>(0);
            let engine = Arc::clone(&engine);
            let handle = spawn_worker("load-engine-timer".to_string(), move || {
                if let Err(RecvTimeoutError::Timeout) = stop_rx.recv_timeout(limit) {
                    info!(limit_secs = limit.as_secs(), "duration limit reached");
                    if let Err(e) = engine.interrupt() {
                        debug!(error = %e, "run finished before the duration limit fired");
                    }
                }
            })?;
            Some((stop_tx, handle))
        });

        join_all("producer", producers);
        debug!("all producers joined");
        join_all("consumer", consumers);
        engine.workers_finished();
        debug!("all consumers joined");

        if let Some((stop_tx, handle)) = timer {
            drop(stop_tx);
            join_all("timer", vec![handle]);
        }

        metrics.mark_end();
        info!(
            success = metrics.success_count(),
            exceptions = metrics.exception_count(),
            elapsed_ms = ?metrics.elapsed().map(|d| d.as_millis()),
            "load generator finished"
        );
        engine.finish();
    }
}

fn spawn_worker(name: String, f: impl FnOnce() + Send + 'static) -> Option<JoinHandle<()>> {
    match thread::Builder::new().name(name.clone()).spawn(f) {
        Ok(handle) => Some(handle),
        Err(e) => {
            error!(thread = %name, error = %e, "failed to spawn worker thread");
            None
        }
    }
}

fn join_all(kind: &str, handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        if handle.join().is_err() {
            error!(kind, "worker thread panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workload::{generator_fn, loader_fn};
    use std::time::Instant;

    fn endless() -> BoxGenerator<u64> {
        let mut n = 0;
        generator_fn(move || {
            n += 1;
            Ok(Some(n))
        })
    }

    fn noop() -> BoxLoader<u64> {
        loader_fn(|_: u64| Ok(()))
    }

    #[test]
    fn test_lifecycle_states() {
        let engine = LoadGenerator::with_limits(-1, 10, -1.0);
        assert_eq!(engine.state(), RunState::NotStarted);
        assert!(matches!(engine.join(), Err(EngineError::NotStarted)));
        assert!(matches!(engine.interrupt(), Err(EngineError::NotStarted)));

        engine.start(vec![endless()], vec![noop()], Properties::new()).unwrap();
        assert!(matches!(
            engine.start(vec![endless()], vec![noop()], Properties::new()),
            Err(EngineError::AlreadyStarted)
        ));
        engine.join().unwrap();

        assert_eq!(engine.state(), RunState::Completed);
        assert!(matches!(engine.interrupt(), Err(EngineError::NotRunning)));
        // Joining a finished run is a no-op.
        engine.join().unwrap();
        assert_eq!(engine.snapshot().success.count, 10);
    }

    #[test]
    fn test_interrupt_refused_once_workers_finished() {
        let engine = LoadGenerator::new(EngineConfig::default());
        engine.shared.lifecycle.lock().state = RunState::Running;
        engine.shared.workers_finished();

        assert!(matches!(engine.interrupt(), Err(EngineError::NotRunning)));
        engine.shared.finish();
        assert_eq!(engine.state(), RunState::Completed);
    }

    #[test]
    fn test_state_readable_while_loaders_initialize() {
        struct SlowInit;
        impl crate::workload::Loader<u64> for SlowInit {
            fn init(
                &mut self,
                _props: &Properties,
                _registry: &crate::metrics::MetricRegistry,
            ) -> crate::error::WorkloadResult<()> {
                thread::sleep(Duration::from_millis(200));
                Ok(())
            }

            fn run(&mut self, _task: u64) -> crate::error::WorkloadResult<()> {
                Ok(())
            }
        }

        let engine = Arc::new(LoadGenerator::with_limits(-1, 5, -1.0));
        let starter = {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                engine.start(vec![endless()], vec![Box::new(SlowInit) as BoxLoader<u64>], Properties::new())
            })
        };
        thread::sleep(Duration::from_millis(50));

        let queried = Instant::now();
        assert_eq!(engine.state(), RunState::NotStarted);
        assert!(queried.elapsed() < Duration::from_millis(100));
        assert!(matches!(
            engine.start(vec![endless()], vec![noop()], Properties::new()),
            Err(EngineError::AlreadyStarted)
        ));

        starter.join().unwrap().unwrap();
        engine.join().unwrap();
        assert_eq!(engine.state(), RunState::Completed);
        assert_eq!(engine.snapshot().success.count, 5);
    }

    #[test]
    fn test_rejects_empty_loaders() {
        let engine = LoadGenerator::new(EngineConfig::default());
        let err = engine.start(vec![endless()], vec![], Properties::new());
        assert!(matches!(err, Err(EngineError::NoLoaders)));
        assert_eq!(engine.state(), RunState::NotStarted);
    }

    #[test]
    fn test_no_generators_finishes_immediately() {
        let engine = LoadGenerator::new(EngineConfig::default());
        let snapshot = engine
            .run_to_completion(Vec::<BoxGenerator<u64>>::new(), vec![noop(), noop()], Properties::new())
            .unwrap();
        assert_eq!(snapshot.total_tasks(), 0);
        assert_eq!(engine.state(), RunState::Completed);
    }

    #[test]
    fn test_interrupt_stops_unbounded_run() {
        let engine = LoadGenerator::new(EngineConfig::default());
        engine.start(vec![endless()], vec![noop()], Properties::new()).unwrap();
        thread::sleep(Duration::from_millis(50));

        let started = Instant::now();
        engine.interrupt().unwrap();
        engine.join().unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(engine.state(), RunState::Interrupted);
        assert!(engine.snapshot().success.count > 0);
    }

    #[test]
    fn test_loader_init_failure_aborts_start() {
        struct BrokenLoader;
        impl crate::workload::Loader<u64> for BrokenLoader {
            fn init(
                &mut self,
                _props: &Properties,
                _registry: &crate::metrics::MetricRegistry,
            ) -> crate::error::WorkloadResult<()> {
                Err("missing target".into())
            }

            fn run(&mut self, _task: u64) -> crate::error::WorkloadResult<()> {
                Ok(())
            }
        }

        let engine = LoadGenerator::new(EngineConfig::default());
        let err = engine
            .start(vec![endless()], vec![noop(), Box::new(BrokenLoader)], Properties::new())
            .unwrap_err();
        assert!(matches!(err, EngineError::LoaderInit { index: 1, .. }));
        assert_eq!(engine.state(), RunState::NotStarted);
    }
}
