//! Consumer worker: executes scheduled tasks with a bound loader.
//!
//! The loader is closed when the consumer is dropped, whether or not its
//! thread ever ran.

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace, warn};

use crate::cancel::CancelSignal;
use crate::metrics::Metrics;
use crate::queue::{Entry, ScheduledTask, TaskQueue};
use crate::workload::BoxLoader;

pub(crate) struct Consumer<T> {
    index: usize,
    loader: BoxLoader<T>,
    queue: TaskQueue<T>,
    metrics: Arc<Metrics>,
    cancel: CancelSignal,
}

impl<T> Consumer<T> {
    pub fn new(
        index: usize,
        loader: BoxLoader<T>,
        queue: TaskQueue<T>,
        metrics: Arc<Metrics>,
        cancel: CancelSignal,
    ) -> Self {
        Self {
            index,
            loader,
            queue,
            metrics,
            cancel,
        }
    }

    pub fn run(mut self) {
        loop {
            let scheduled = match self.queue.take() {
                Entry::Terminator => {
                    // Pass the terminator on so the next consumer wakes too.
                    self.queue.add_terminator();
                    trace!(consumer = self.index, "terminator received");
                    break;
                }
                Entry::Task(scheduled) => scheduled,
            };
            if !self.wait_for_start(&scheduled) {
                debug!(consumer = self.index, "consumer cancelled while pacing");
                break;
            }
            self.execute(scheduled.task);
        }
    }

    /// Sleep until the task's start time. Returns `false` if cancelled first.
    fn wait_for_start(&self, scheduled: &ScheduledTask<T>) -> bool {
        loop {
            let now = Instant::now();
            if scheduled.start_time <= now {
                return true;
            }
            if self.cancel.wait_timeout(scheduled.start_time - now) {
                return false;
            }
        }
    }

    fn execute(&mut self, task: T) {
        let started = Instant::now();
        let result = self.loader.run(task);
        self.metrics.record_query(started.elapsed());
        match result {
            Ok(()) => self.metrics.mark_success(),
            Err(e) => {
                debug!(consumer = self.index, error = %e, "loader failed");
                self.metrics.mark_exception();
            }
        }
    }
}

impl<T> Drop for Consumer<T> {
    fn drop(&mut self) {
        if let Err(e) = self.loader.close() {
            warn!(consumer = self.index, error = %e, "failed to close loader");
        }
    }
}
