//! Throughput meters with exponentially weighted moving averages.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::stats::MeterStats;

/// Moving averages are advanced in fixed steps of this length.
pub(crate) const TICK_INTERVAL: Duration = Duration::from_secs(5);

/// One exponentially weighted moving average over a window of minutes.
#[derive(Debug)]
struct Ewma {
    alpha: f64,
    uncounted: AtomicU64,
    state: Mutex<EwmaState>,
}

#[derive(Debug, Default)]
struct EwmaState {
    rate: f64,
    initialized: bool,
}

impl Ewma {
    fn over_minutes(minutes: f64) -> Self {
        let alpha = 1.0 - (-TICK_INTERVAL.as_secs_f64() / 60.0 / minutes).exp();
        Self {
            alpha,
            uncounted: AtomicU64::new(0),
            state: Mutex::new(EwmaState::default()),
        }
    }

    fn update(&self, n: u64) {
        self.uncounted.fetch_add(n, Ordering::Relaxed);
    }

    fn tick(&self) {
        let count = self.uncounted.swap(0, Ordering::Relaxed);
        let instant_rate = count as f64 / TICK_INTERVAL.as_secs_f64();
        let mut state = self.state.lock();
        if state.initialized {
            state.rate += self.alpha * (instant_rate - state.rate);
        } else {
            state.rate = instant_rate;
            state.initialized = true;
        }
    }

    /// Events per second.
    fn rate(&self) -> f64 {
        self.state.lock().rate
    }
}

/// Counts events and tracks their mean and 1/5/15-minute rates.
#[derive(Debug)]
pub struct Meter {
    count: AtomicU64,
    start: Instant,
    last_tick: AtomicU64,
    m1: Ewma,
    m5: Ewma,
    m15: Ewma,
}

impl Default for Meter {
    fn default() -> Self {
        Self::new()
    }
}

impl Meter {
    pub fn new() -> Self {
        Self {
            count: AtomicU64::new(0),
            start: Instant::now(),
            last_tick: AtomicU64::new(0),
            m1: Ewma::over_minutes(1.0),
            m5: Ewma::over_minutes(5.0),
            m15: Ewma::over_minutes(15.0),
        }
    }

    pub fn mark(&self) {
        self.mark_n(1);
    }

    pub fn mark_n(&self, n: u64) {
        self.tick_if_necessary(self.start.elapsed());
        self.count.fetch_add(n, Ordering::Relaxed);
        self.m1.update(n);
        self.m5.update(n);
        self.m15.update(n);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Events per second since the meter was created.
    pub fn mean_rate(&self) -> f64 {
        self.mean_rate_at(self.start.elapsed())
    }

    pub fn one_minute_rate(&self) -> f64 {
        self.tick_if_necessary(self.start.elapsed());
        self.m1.rate()
    }

    pub fn five_minutes_rate(&self) -> f64 {
        self.tick_if_necessary(self.start.elapsed());
        self.m5.rate()
    }

    pub fn fifteen_minutes_rate(&self) -> f64 {
        self.tick_if_necessary(self.start.elapsed());
        self.m15.rate()
    }

    pub fn stats(&self) -> MeterStats {
        MeterStats {
            count: self.count(),
            mean_rate: self.mean_rate(),
            one_minute_rate: self.one_minute_rate(),
            five_minutes_rate: self.five_minutes_rate(),
            fifteen_minutes_rate: self.fifteen_minutes_rate(),
        }
    }

    fn mean_rate_at(&self, elapsed: Duration) -> f64 {
        let count = self.count();
        let secs = elapsed.as_secs_f64();
        if count == 0 || secs <= 0.0 {
            0.0
        } else {
            count as f64 / secs
        }
    }

    /// Advance the moving averages by every whole tick that elapsed since the
    /// last one. Only the caller that wins the CAS performs the ticks.
    fn tick_if_necessary(&self, elapsed: Duration) {
        let interval = TICK_INTERVAL.as_nanos() as u64;
        let now = elapsed.as_nanos() as u64;
        let old = self.last_tick.load(Ordering::Acquire);
        let age = now.saturating_sub(old);
        if age <= interval {
            return;
        }
        let new_tick = now - age % interval;
        if self
            .last_tick
            .compare_exchange(old, new_tick, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            for _ in 0..age / interval {
                self.m1.tick();
                self.m5.tick();
                self.m15.tick();
            }
        }
    }
}
