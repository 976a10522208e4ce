//! Value distributions and latency timers.

use parking_lot::Mutex;
use std::fmt;
use std::time::{Duration, Instant};

use super::meter::Meter;
use crate::stats::{Distribution, HistogramStats, TimerStats};

/// Records a distribution of non-negative values.
pub struct Histogram {
    inner: Mutex<hdrhistogram::Histogram<u64>>,
}

impl fmt::Debug for Histogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Histogram").field("count", &self.count()).finish()
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(
                hdrhistogram::Histogram::new(3).expect("3 significant figures is a valid precision"),
            ),
        }
    }

    /// Values beyond the trackable range are clamped to its upper bound.
    pub fn record(&self, value: u64) {
        self.inner.lock().saturating_record(value);
    }

    pub fn count(&self) -> u64 {
        self.inner.lock().len()
    }

    pub fn distribution(&self) -> Distribution {
        let h = self.inner.lock();
        if h.is_empty() {
            return Distribution::default();
        }
        Distribution {
            min: h.min() as f64,
            max: h.max() as f64,
            mean: h.mean(),
            stddev: h.stdev(),
            median: h.value_at_quantile(0.5) as f64,
            percentile75: h.value_at_quantile(0.75) as f64,
            percentile95: h.value_at_quantile(0.95) as f64,
            percentile98: h.value_at_quantile(0.98) as f64,
            percentile99: h.value_at_quantile(0.99) as f64,
            percentile999: h.value_at_quantile(0.999) as f64,
        }
    }

    pub fn stats(&self) -> HistogramStats {
        HistogramStats {
            count: self.count(),
            distribution: self.distribution(),
        }
    }
}

/// Meter plus a histogram of durations in nanoseconds.
#[derive(Debug, Default)]
pub struct Timer {
    meter: Meter,
    histogram: Histogram,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, elapsed: Duration) {
        self.meter.mark();
        self.histogram
            .record(u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX));
    }

    /// Run `f`, recording how long it took.
    pub fn time<R>(&self, f: impl FnOnce() -> R) -> R {
        let started = Instant::now();
        let result = f();
        self.update(started.elapsed());
        result
    }

    pub fn count(&self) -> u64 {
        self.meter.count()
    }

    pub fn stats(&self) -> TimerStats {
        TimerStats {
            meter: self.meter.stats(),
            distribution: self.histogram.distribution(),
        }
    }
}
