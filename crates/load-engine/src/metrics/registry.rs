//! Named user-defined metrics.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use super::histogram::{Histogram, Timer};
use super::meter::Meter;
use crate::stats::UserDefinedStats;

/// Incrementing and decrementing count.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicI64,
}

impl Counter {
    pub fn inc(&self) {
        self.inc_by(1);
    }

    pub fn inc_by(&self, n: i64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        self.inc_by(-1);
    }

    pub fn count(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Value read on demand from a closure.
pub struct Gauge {
    read: Box<dyn Fn() -> f64 + Send + Sync>,
}

impl Gauge {
    pub fn new(read: impl Fn() -> f64 + Send + Sync + 'static) -> Self {
        Self {
            read: Box::new(read),
        }
    }

    pub fn value(&self) -> f64 {
        (self.read)()
    }
}

impl fmt::Debug for Gauge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gauge").field("value", &self.value()).finish()
    }
}

/// Registry handed to workloads at `init()` for their own metrics.
///
/// Lookups are get-or-create: asking twice for the same name returns the same
/// metric, so several generators or loaders can share one counter.
#[derive(Debug, Default)]
pub struct MetricRegistry {
    gauges: RwLock<BTreeMap<String, Arc<Gauge>>>,
    counters: RwLock<BTreeMap<String, Arc<Counter>>>,
    meters: RwLock<BTreeMap<String, Arc<Meter>>>,
    histograms: RwLock<BTreeMap<String, Arc<Histogram>>>,
    timers: RwLock<BTreeMap<String, Arc<Timer>>>,
}

fn get_or_create<M: Default>(map: &RwLock<BTreeMap<String, Arc<M>>>, name: &str) -> Arc<M> {
    if let Some(metric) = map.read().get(name) {
        return Arc::clone(metric);
    }
    Arc::clone(map.write().entry(name.to_string()).or_default())
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a gauge, replacing any previous gauge of the same name.
    pub fn register_gauge(
        &self,
        name: impl Into<String>,
        read: impl Fn() -> f64 + Send + Sync + 'static,
    ) -> Arc<Gauge> {
        let gauge = Arc::new(Gauge::new(read));
        self.gauges.write().insert(name.into(), Arc::clone(&gauge));
        gauge
    }

    pub fn counter(&self, name: &str) -> Arc<Counter> {
        get_or_create(&self.counters, name)
    }

    pub fn meter(&self, name: &str) -> Arc<Meter> {
        get_or_create(&self.meters, name)
    }

    pub fn histogram(&self, name: &str) -> Arc<Histogram> {
        get_or_create(&self.histograms, name)
    }

    pub fn timer(&self, name: &str) -> Arc<Timer> {
        get_or_create(&self.timers, name)
    }

    pub fn is_empty(&self) -> bool {
        self.gauges.read().is_empty()
            && self.counters.read().is_empty()
            && self.meters.read().is_empty()
            && self.histograms.read().is_empty()
            && self.timers.read().is_empty()
    }

    pub fn snapshot(&self) -> UserDefinedStats {
        UserDefinedStats {
            gauges: self
                .gauges
                .read()
                .iter()
                .map(|(k, g)| (k.clone(), g.value()))
                .collect(),
            counters: self
                .counters
                .read()
                .iter()
                .map(|(k, c)| (k.clone(), c.count()))
                .collect(),
            meters: self
                .meters
                .read()
                .iter()
                .map(|(k, m)| (k.clone(), m.stats()))
                .collect(),
            histograms: self
                .histograms
                .read()
                .iter()
                .map(|(k, h)| (k.clone(), h.stats()))
                .collect(),
            timers: self
                .timers
                .read()
                .iter()
                .map(|(k, t)| (k.clone(), t.stats()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    #[test]
    fn test_get_or_create_shares_instances() {
        let registry = MetricRegistry::new();
        let a = registry.counter("requests");
        let b = registry.counter("requests");
        a.inc();
        b.inc_by(2);
        assert_eq!(registry.counter("requests").count(), 3);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_gauge_reads_live_value() {
        let registry = MetricRegistry::new();
        let source = Arc::new(AtomicU64::new(1));
        let reader = Arc::clone(&source);
        registry.register_gauge("queue", move || reader.load(Ordering::Relaxed) as f64);

        source.store(42, Ordering::Relaxed);
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.gauges.get("queue"), Some(&42.0));
    }

    #[test]
    fn test_snapshot_contains_every_kind() {
        let registry = MetricRegistry::new();
        assert!(registry.is_empty());
        registry.counter("c").dec();
        registry.meter("m").mark();
        registry.histogram("h").record(5);
        registry.timer("t").update(std::time::Duration::from_millis(1));

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.counters["c"], -1);
        assert_eq!(snapshot.meters["m"].count, 1);
        assert_eq!(snapshot.histograms["h"].count, 1);
        assert_eq!(snapshot.timers["t"].meter.count, 1);
        assert!(!registry.is_empty());
    }
}
