//! Run metrics.
//!
//! [`Metrics`] holds the fixed engine metrics of one run plus the
//! [`MetricRegistry`] workloads register their own metrics in. Every engine
//! record is also forwarded to the `metrics` facade so that an installed
//! exporter (Prometheus in the agent) sees it.

mod histogram;
mod meter;
mod registry;

pub use histogram::{Histogram, Timer};
pub use meter::Meter;
pub use registry::{Counter, Gauge, MetricRegistry};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::time::{Duration, Instant};

use crate::stats::MetricsSnapshot;

pub const GENERATOR_METRIC: &str = "generator";
pub const QUERIES_METRIC: &str = "queries";
pub const SUCCESS_METRIC: &str = "success";
pub const EXCEPTION_METRIC: &str = "exception";
pub const START_DATE_METRIC: &str = "startDate";
pub const DURATION_METRIC: &str = "duration";

#[derive(Debug, Default, Clone, Copy)]
struct Window {
    started: Option<(Instant, DateTime<Utc>)>,
    ended: Option<Instant>,
}

/// Engine metrics of a single run.
#[derive(Debug, Default)]
pub struct Metrics {
    generator: Timer,
    queries: Timer,
    success: Meter,
    exceptions: Meter,
    window: Mutex<Window>,
    registry: MetricRegistry,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry for workload-defined metrics.
    pub fn registry(&self) -> &MetricRegistry {
        &self.registry
    }

    pub fn record_generation(&self, elapsed: Duration) {
        self.generator.update(elapsed);
        ::metrics::histogram!("legion_generation_seconds").record(elapsed.as_secs_f64());
    }

    pub fn record_query(&self, elapsed: Duration) {
        self.queries.update(elapsed);
        ::metrics::histogram!("legion_query_seconds").record(elapsed.as_secs_f64());
    }

    pub fn mark_success(&self) {
        self.success.mark();
        ::metrics::counter!("legion_success_total").increment(1);
    }

    pub fn mark_exception(&self) {
        self.exceptions.mark();
        ::metrics::counter!("legion_exceptions_total").increment(1);
    }

    pub fn mark_start(&self) {
        let mut window = self.window.lock();
        if window.started.is_none() {
            window.started = Some((Instant::now(), Utc::now()));
        }
    }

    pub fn mark_end(&self) {
        let mut window = self.window.lock();
        if window.started.is_some() && window.ended.is_none() {
            window.ended = Some(Instant::now());
        }
    }

    pub fn start_date(&self) -> Option<DateTime<Utc>> {
        self.window.lock().started.map(|(_, date)| date)
    }

    /// Elapsed run time: live while running, frozen once the run ended.
    pub fn elapsed(&self) -> Option<Duration> {
        let window = *self.window.lock();
        let (started, _) = window.started?;
        Some(match window.ended {
            Some(ended) => ended.duration_since(started),
            None => started.elapsed(),
        })
    }

    pub fn success_count(&self) -> u64 {
        self.success.count()
    }

    pub fn exception_count(&self) -> u64 {
        self.exceptions.count()
    }

    pub fn generated_count(&self) -> u64 {
        self.generator.count()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            generator: self.generator.stats(),
            queries: self.queries.stats(),
            success: self.success.stats(),
            exceptions: self.exceptions.stats(),
            user_defined: self.registry.snapshot(),
            start_date: self.start_date().map_or(-1, |d| d.timestamp()),
            duration: self
                .elapsed()
                .map_or(-1, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX)),
        }
    }
}
