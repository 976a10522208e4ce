//! Rate-limited producer/consumer load generation engine.
//!
//! A run turns a set of [`Generator`]s into a bounded stream of time-stamped
//! tasks that a pool of [`Loader`]s executes, under three independent stop
//! conditions: wall-clock duration, total task count and a tasks-per-second
//! ceiling.
//!
//! ```ignore
//! use load_engine::{generator_fn, loader_fn, LoadGenerator, Properties};
//!
//! let engine = LoadGenerator::with_limits(-1, 100, 50.0);
//! let stats = engine.run_to_completion(
//!     vec![generator_fn(|| Ok(Some("GET /")))],
//!     vec![loader_fn(|_req| Ok(()))],
//!     Properties::new(),
//! )?;
//! assert_eq!(stats.success.count, 100);
//! ```

pub mod admission;
pub mod builtin;
pub mod cancel;
pub mod config;
mod consumer;
pub mod engine;
pub mod error;
pub mod finalizer;
pub mod metrics;
pub mod plugin;
mod producer;
pub mod props;
pub mod queue;
pub mod report;
pub mod scheduler;
pub mod stats;
pub mod workload;

pub use admission::AdmissionGate;
pub use config::EngineConfig;
pub use engine::{LoadGenerator, RunState};
pub use error::{EngineError, EngineResult, WorkloadError, WorkloadResult};
pub use metrics::{Counter, Gauge, Histogram, Meter, MetricRegistry, Metrics, Timer};
pub use plugin::{TypedWorkload, Workload, WorkloadFactory, WorkloadRegistry};
pub use props::Properties;
pub use report::{MetricsReporter, ResultsTable, StatsPrinter};
pub use scheduler::RateScheduler;
pub use stats::{
    Distribution, HistogramStats, MeterStats, MetricsSnapshot, TimerStats, UserDefinedStats,
};
pub use workload::{
    generator_fn, loader_fn, many, BoxGenerator, BoxLoader, FnGenerator, FnLoader, Generator,
    Loader,
};
