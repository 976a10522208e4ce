//! One-shot cancellation shared by all workers of a run.
//!
//! Cancellation is signalled by dropping the only sender of a zero-message
//! channel: every receiver then observes disconnection, which lets workers
//! wait on it with timeouts or inside `select!` next to the task queue.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;
use std::time::Duration;

/// Owner side; `cancel()` fires every [`CancelSignal`] cloned from it.
#[derive(Debug)]
pub struct CancelHandle {
    tx: Mutex<Option<Sender<()>>>,
    rx: Receiver<()>,
}

/// Worker side of a [`CancelHandle`].
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: Receiver<()>,
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            tx: Mutex::new(Some(tx)),
            rx,
        }
    }

    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            rx: self.rx.clone(),
        }
    }

    /// Fire the signal. Returns `false` if it had already fired.
    pub fn cancel(&self) -> bool {
        self.tx.lock().take().is_some()
    }

    pub fn is_cancelled(&self) -> bool {
        self.tx.lock().is_none()
    }
}

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Sleep for up to `timeout`, waking early on cancellation.
    ///
    /// Returns `true` if cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        matches!(
            self.rx.recv_timeout(timeout),
            Err(RecvTimeoutError::Disconnected)
        )
    }

    /// Receiver usable in `crossbeam_channel::select!`; it becomes ready
    /// (with an error) once cancelled.
    pub fn receiver(&self) -> &Receiver<()> {
        &self.rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_cancel_is_one_shot() {
        let handle = CancelHandle::new();
        let signal = handle.signal();
        assert!(!signal.is_cancelled());
        assert!(handle.cancel());
        assert!(!handle.cancel());
        assert!(signal.is_cancelled());
        assert!(handle.is_cancelled());
    }

    #[test]
    fn test_wait_times_out_when_not_cancelled() {
        let handle = CancelHandle::new();
        let started = Instant::now();
        assert!(!handle.signal().wait_timeout(Duration::from_millis(30)));
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_wait_wakes_on_cancel() {
        let handle = CancelHandle::new();
        let signal = handle.signal();
        let waiter = thread::spawn(move || {
            let started = Instant::now();
            (signal.wait_timeout(Duration::from_secs(10)), started.elapsed())
        });
        thread::sleep(Duration::from_millis(20));
        handle.cancel();
        let (cancelled, waited) = waiter.join().unwrap();
        assert!(cancelled);
        assert!(waited < Duration::from_secs(5));
    }
}
