//! Test support shared by the legion crates.
//!
//! - [`workloads`]: generators and loaders whose calls can be counted through
//!   a shared [`Probe`]
//! - [`timing`]: elapsed-time helpers for the duration and rate limits
//! - [`fixtures`]: temporary files
//!
//! Only ever a dev-dependency:
//!
//! ```ignore
//! use test_utils::{assert_duration_between, elapsed_of, CountingLoader};
//! ```

pub mod fixtures;
pub mod timing;
pub mod workloads;

pub use fixtures::*;
pub use timing::*;
pub use workloads::*;

/// Assert that a `Duration` lies within `[min_secs, max_secs]`.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_duration_between;
///
/// let (_, elapsed) = elapsed_of(|| engine.join());
/// assert_duration_between!(elapsed, 1.8, 2.2);
/// ```
#[macro_export]
macro_rules! assert_duration_between {
    ($duration:expr, $min_secs:expr, $max_secs:expr) => {{
        let secs: f64 = $duration.as_secs_f64();
        let min: f64 = $min_secs as f64;
        let max: f64 = $max_secs as f64;
        if secs < min || secs > max {
            panic!(
                "assertion failed: duration {:.3}s not within [{:.3}s, {:.3}s]",
                secs, min, max
            );
        }
    }};
}
