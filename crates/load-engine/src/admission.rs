//! Total task-count ceiling shared by all producers.

use std::sync::atomic::{AtomicU64, Ordering};

/// Decides whether one more task may be admitted.
///
/// Exhaustion is one-way: once a limited gate has handed out its last
/// admission it denies every later call.
#[derive(Debug)]
pub enum AdmissionGate {
    Unlimited,
    Limited { remaining: AtomicU64 },
}

impl AdmissionGate {
    pub fn limited(limit: u64) -> Self {
        AdmissionGate::Limited {
            remaining: AtomicU64::new(limit),
        }
    }

    /// Gate for an optional limit; `None` admits everything.
    pub fn from_limit(limit: Option<u64>) -> Self {
        match limit {
            Some(limit) => Self::limited(limit),
            None => AdmissionGate::Unlimited,
        }
    }

    /// Consume one admission, returning whether it was granted.
    pub fn try_admit(&self) -> bool {
        match self {
            AdmissionGate::Unlimited => true,
            AdmissionGate::Limited { remaining } => remaining
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
                .is_ok(),
        }
    }

    /// Admissions left, or `None` when unlimited.
    pub fn remaining(&self) -> Option<u64> {
        match self {
            AdmissionGate::Unlimited => None,
            AdmissionGate::Limited { remaining } => Some(remaining.load(Ordering::Acquire)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_unlimited_always_admits() {
        let gate = AdmissionGate::from_limit(None);
        assert!((0..10_000).all(|_| gate.try_admit()));
        assert_eq!(gate.remaining(), None);
    }

    #[test]
    fn test_limited_never_readmits() {
        let gate = AdmissionGate::limited(3);
        assert!(gate.try_admit());
        assert!(gate.try_admit());
        assert!(gate.try_admit());
        assert!(!gate.try_admit());
        assert!(!gate.try_admit());
        assert_eq!(gate.remaining(), Some(0));
    }

    #[test]
    fn test_zero_limit_denies_immediately() {
        let gate = AdmissionGate::limited(0);
        assert!(!gate.try_admit());
    }

    #[test]
    fn test_concurrent_admissions_match_limit() {
        let gate = Arc::new(AdmissionGate::limited(1000));
        let admitted = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = Arc::clone(&gate);
                let admitted = Arc::clone(&admitted);
                thread::spawn(move || {
                    while gate.try_admit() {
                        admitted.fetch_add(1, Ordering::Relaxed);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(admitted.load(Ordering::Relaxed), 1000);
        assert_eq!(gate.remaining(), Some(0));
    }
}
