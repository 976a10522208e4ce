//! Shared start-time pacing.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Maps "the next task" to the earliest instant it may start.
///
/// One instance is shared by every producer of a run. The cursor is a single
/// mutex-guarded instant, so consecutive calls are spaced exactly one interval
/// apart in call order no matter which thread makes them.
#[derive(Debug)]
pub struct RateScheduler {
    interval: Option<Duration>,
    cursor: Mutex<Option<Instant>>,
}

impl RateScheduler {
    /// Create a scheduler for `rate` tasks per second; `rate <= 0` disables pacing.
    pub fn new(rate: f64) -> Self {
        let interval = (rate > 0.0 && rate.is_finite())
            .then(|| Duration::from_nanos((1e9 / rate).round() as u64));
        Self {
            interval,
            cursor: Mutex::new(None),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(-1.0)
    }

    /// Spacing between consecutive start times, if pacing is enabled.
    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Start time of the next task.
    ///
    /// Returns the cursor value before advancing it, so the first call returns
    /// (approximately) the current time.
    pub fn next(&self) -> Instant {
        let Some(interval) = self.interval else {
            return Instant::now();
        };
        let mut cursor = self.cursor.lock();
        let start = *cursor.get_or_insert_with(Instant::now);
        *cursor = Some(start + interval);
        start
    }
}
