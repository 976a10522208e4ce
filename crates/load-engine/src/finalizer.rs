//! Producer completion countdown.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::cancel::CancelSignal;
use crate::queue::{PutOutcome, TaskQueue};

/// Counts producer exits and releases the consumer pool after the last one.
///
/// A run has exactly one terminator. The producer that brings the count to
/// zero enqueues it, unless the run was cancelled first, in which case
/// `interrupt()` injects it through [`release_consumers`]. Each consumer that
/// takes it forwards it onward before exiting, so the whole pool drains after
/// the queued tasks.
///
/// [`release_consumers`]: TerminationCoordinator::release_consumers
#[derive(Debug)]
pub struct TerminationCoordinator<T> {
    countdown: Mutex<Countdown>,
    all_done: Condvar,
    queue: TaskQueue<T>,
    cancel: CancelSignal,
}

#[derive(Debug)]
struct Countdown {
    remaining: usize,
    injected: bool,
}

impl<T> TerminationCoordinator<T> {
    /// Coordinator for `producers` producers. With no producers at all the
    /// terminator is injected immediately.
    pub fn new(producers: usize, queue: TaskQueue<T>, cancel: CancelSignal) -> Self {
        let injected = producers == 0;
        if injected {
            queue.add_terminator();
        }
        Self {
            countdown: Mutex::new(Countdown {
                remaining: producers,
                injected,
            }),
            all_done: Condvar::new(),
            queue,
            cancel,
        }
    }

    /// Record one producer exit.
    pub fn producer_done(&self) {
        let mut countdown = self.countdown.lock();
        if countdown.remaining == 0 {
            return;
        }
        if countdown.remaining == 1 {
            // Enqueued before the count reaches zero, so `wait_producers`
            // never returns while the terminator is still in flight.
            match self.queue.add_terminator_cancellable(&self.cancel) {
                PutOutcome::Enqueued => {
                    debug!("all producers finished, releasing consumers");
                    countdown.injected = true;
                }
                PutOutcome::Cancelled => trace!("run cancelled, terminator left to interrupt"),
            }
        }
        countdown.remaining -= 1;
        if countdown.remaining == 0 {
            self.all_done.notify_all();
        }
    }

    /// Block until every producer has exited and the terminator, if any, has
    /// been enqueued.
    pub fn wait_producers(&self) {
        let mut countdown = self.countdown.lock();
        while countdown.remaining > 0 {
            self.all_done.wait(&mut countdown);
        }
    }

    /// Inject the terminator if no producer did. Call only after
    /// `wait_producers()` and once queued tasks have been cleared, so the
    /// queue has room.
    pub fn release_consumers(&self) {
        let mut countdown = self.countdown.lock();
        if !countdown.injected {
            self.queue.add_terminator();
            countdown.injected = true;
        }
    }

    pub fn remaining(&self) -> usize {
        self.countdown.lock().remaining
    }
}

/// Signals one producer exit when dropped.
///
/// Created together with a producer so that the exit is counted on every
/// path, including a thread that never started or a panicking generator.
#[derive(Debug)]
pub struct CompletionGuard<T> {
    coordinator: Arc<TerminationCoordinator<T>>,
}

impl<T> CompletionGuard<T> {
    pub fn new(coordinator: Arc<TerminationCoordinator<T>>) -> Self {
        Self { coordinator }
    }
}

impl<T> Drop for CompletionGuard<T> {
    fn drop(&mut self) {
        self.coordinator.producer_done();
    }
}
