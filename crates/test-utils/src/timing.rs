//! Timing helpers.

use std::time::{Duration, Instant};

/// Run `f` and return its result together with the wall-clock time it took.
pub fn elapsed_of<R>(f: impl FnOnce() -> R) -> (R, Duration) {
    let started = Instant::now();
    let result = f();
    (result, started.elapsed())
}

/// Expected duration of `tasks` tasks paced at `rate` per second.
///
/// The first task starts immediately, so `n` tasks span `n - 1` intervals.
pub fn paced_duration(tasks: u64, rate: f64) -> Duration {
    if tasks == 0 || rate <= 0.0 {
        return Duration::ZERO;
    }
    Duration::from_nanos(((tasks - 1) as f64 * 1e9 / rate).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_of() {
        let (value, elapsed) = elapsed_of(|| {
            std::thread::sleep(Duration::from_millis(10));
            5
        });
        assert_eq!(value, 5);
        assert!(elapsed >= Duration::from_millis(10));
    }

    #[test]
    fn test_paced_duration() {
        assert_eq!(paced_duration(20, 10.0), Duration::from_millis(1900));
        assert_eq!(paced_duration(0, 10.0), Duration::ZERO);
        assert_eq!(paced_duration(5, -1.0), Duration::ZERO);
    }
}
