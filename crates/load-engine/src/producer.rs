//! Producer worker: turns generators into scheduled tasks.

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, trace, warn};

use crate::admission::AdmissionGate;
use crate::cancel::CancelSignal;
use crate::error::WorkloadResult;
use crate::finalizer::{CompletionGuard, TerminationCoordinator};
use crate::metrics::Metrics;
use crate::props::{Properties, GENERATOR_INDEX, GENERATOR_THREAD_INDEX};
use crate::queue::{PutOutcome, ScheduledTask, TaskQueue};
use crate::scheduler::RateScheduler;
use crate::workload::BoxGenerator;

/// A generator together with its position in the list passed to `start()`.
pub(crate) struct AssignedGenerator<T> {
    pub index: usize,
    pub generator: BoxGenerator<T>,
}

/// Split generators round-robin across `producers` slots, preserving their
/// original positions.
pub(crate) fn partition<T>(
    generators: Vec<BoxGenerator<T>>,
    producers: usize,
) -> Vec<Vec<AssignedGenerator<T>>> {
    let mut slots: Vec<Vec<AssignedGenerator<T>>> = (0..producers).map(|_| Vec::new()).collect();
    if producers == 0 {
        return slots;
    }
    for (index, generator) in generators.into_iter().enumerate() {
        slots[index % producers].push(AssignedGenerator { index, generator });
    }
    slots
}

/// State shared by every producer of a run.
pub(crate) struct ProducerShared<T> {
    pub queue: TaskQueue<T>,
    pub scheduler: Arc<RateScheduler>,
    pub gate: Arc<AdmissionGate>,
    pub metrics: Arc<Metrics>,
    pub cancel: CancelSignal,
    pub props: Arc<Properties>,
}

impl<T> Clone for ProducerShared<T> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            scheduler: Arc::clone(&self.scheduler),
            gate: Arc::clone(&self.gate),
            metrics: Arc::clone(&self.metrics),
            cancel: self.cancel.clone(),
            props: Arc::clone(&self.props),
        }
    }
}

enum Step<T> {
    Task(T),
    Exhausted,
}

pub(crate) struct Producer<T> {
    thread_index: usize,
    pending: std::vec::IntoIter<AssignedGenerator<T>>,
    current: Option<AssignedGenerator<T>>,
    shared: ProducerShared<T>,
    _completion: CompletionGuard<T>,
}

impl<T> Producer<T> {
    /// The completion guard is taken here, so the producer counts as finished
    /// even if its thread is never spawned.
    pub fn new(
        thread_index: usize,
        generators: Vec<AssignedGenerator<T>>,
        shared: ProducerShared<T>,
        coordinator: Arc<TerminationCoordinator<T>>,
    ) -> Self {
        Self {
            thread_index,
            pending: generators.into_iter(),
            current: None,
            shared,
            _completion: CompletionGuard::new(coordinator),
        }
    }

    pub fn run(mut self) {
        if !self.shared.gate.try_admit() {
            debug!(thread = self.thread_index, "task limit reached before start");
            return;
        }

        loop {
            if self.shared.cancel.is_cancelled() {
                debug!(thread = self.thread_index, "producer cancelled");
                break;
            }
            let task = match self.next_task() {
                Ok(Step::Task(task)) => task,
                Ok(Step::Exhausted) => {
                    debug!(thread = self.thread_index, "all generators exhausted");
                    break;
                }
                Err(e) => {
                    error!(
                        thread = self.thread_index,
                        generator = ?self.current.as_ref().map(|g| g.index),
                        error = %e,
                        "generator failed, stopping producer"
                    );
                    break;
                }
            };

            let scheduled = ScheduledTask::new(task, self.shared.scheduler.next());
            if self.shared.queue.put_cancellable(scheduled, &self.shared.cancel)
                == PutOutcome::Cancelled
            {
                debug!(thread = self.thread_index, "producer cancelled while enqueueing");
                break;
            }

            if !self.shared.gate.try_admit() {
                trace!(thread = self.thread_index, "task limit reached");
                break;
            }
        }

        self.close_current();
    }

    /// Next task from the active generator, moving through the assigned list
    /// as generators run dry.
    fn next_task(&mut self) -> WorkloadResult<Step<T>> {
        loop {
            if self.current.is_none() {
                let Some(mut assigned) = self.pending.next() else {
                    return Ok(Step::Exhausted);
                };
                let props = self.generator_props(assigned.index);
                let init = assigned
                    .generator
                    .init(&props, self.shared.metrics.registry());
                self.current = Some(assigned);
                init?;
            }

            let Some(current) = self.current.as_mut() else {
                continue;
            };
            let started = Instant::now();
            match current.generator.generate()? {
                Some(task) => {
                    self.shared.metrics.record_generation(started.elapsed());
                    return Ok(Step::Task(task));
                }
                None => {
                    trace!(
                        thread = self.thread_index,
                        generator = current.index,
                        "generator exhausted"
                    );
                    self.close_current();
                }
            }
        }
    }

    fn generator_props(&self, generator_index: usize) -> Properties {
        let mut props = (*self.shared.props).clone();
        props.set(GENERATOR_INDEX, generator_index);
        props.set(GENERATOR_THREAD_INDEX, self.thread_index);
        props
    }

    fn close_current(&mut self) {
        if let Some(mut assigned) = self.current.take() {
            if let Err(e) = assigned.generator.close() {
                warn!(generator = assigned.index, error = %e, "failed to close generator");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelHandle;
    use crate::error::WorkloadError;
    use crate::queue::Entry;
    use crate::workload::generator_fn;

    fn counting(limit: u32) -> BoxGenerator<u32> {
        let mut next = 0;
        generator_fn(move || {
            if next == limit {
                return Ok(None);
            }
            next += 1;
            Ok(Some(next))
        })
    }

    fn shared(queue: &TaskQueue<u32>, gate: AdmissionGate, cancel: &CancelHandle) -> ProducerShared<u32> {
        ProducerShared {
            queue: queue.clone(),
            scheduler: Arc::new(RateScheduler::unlimited()),
            gate: Arc::new(gate),
            metrics: Arc::new(Metrics::new()),
            cancel: cancel.signal(),
            props: Arc::new(Properties::new()),
        }
    }

    /// Queued tasks, skipping the terminator if there is one.
    fn drain(queue: &TaskQueue<u32>) -> Vec<u32> {
        let mut tasks = Vec::new();
        while !queue.is_empty() {
            if let Entry::Task(t) = queue.take() {
                tasks.push(t.task);
            }
        }
        tasks
    }

    #[test]
    fn test_partition_round_robin() {
        let generators: Vec<_> = (0..5).map(|_| counting(1)).collect();
        let slots = partition(generators, 2);
        let indexes: Vec<Vec<usize>> = slots
            .iter()
            .map(|s| s.iter().map(|g| g.index).collect())
            .collect();
        assert_eq!(indexes, vec![vec![0, 2, 4], vec![1, 3]]);
    }

    #[test]
    fn test_visits_generators_in_order() {
        let queue = TaskQueue::new(100);
        let cancel = CancelHandle::new();
        let coordinator = Arc::new(TerminationCoordinator::new(1, queue.clone(), cancel.signal()));
        let assigned = partition(vec![counting(2), counting(3)], 1).remove(0);

        Producer::new(0, assigned, shared(&queue, AdmissionGate::Unlimited, &cancel), coordinator)
            .run();
        assert_eq!(drain(&queue), vec![1, 2, 1, 2, 3]);
    }

    #[test]
    fn test_stops_at_admission_limit() {
        let queue = TaskQueue::new(100);
        let cancel = CancelHandle::new();
        let coordinator = Arc::new(TerminationCoordinator::new(1, queue.clone(), cancel.signal()));
        let assigned = partition(vec![counting(100)], 1).remove(0);

        Producer::new(0, assigned, shared(&queue, AdmissionGate::limited(4), &cancel), coordinator)
            .run();
        assert_eq!(drain(&queue).len(), 4);
    }

    #[test]
    fn test_generator_error_stops_producer() {
        let queue = TaskQueue::new(100);
        let cancel = CancelHandle::new();
        let coordinator = Arc::new(TerminationCoordinator::new(1, queue.clone(), cancel.signal()));
        let failing = generator_fn(|| -> WorkloadResult<Option<u32>> {
            Err(WorkloadError::new("boom"))
        });
        let assigned = partition(vec![failing, counting(3)], 1).remove(0);

        Producer::new(0, assigned, shared(&queue, AdmissionGate::Unlimited, &cancel), coordinator)
            .run();
        assert!(drain(&queue).is_empty());
    }

    #[test]
    fn test_cancelled_producer_enqueues_nothing() {
        let queue = TaskQueue::new(100);
        let cancel = CancelHandle::new();
        cancel.cancel();
        let coordinator = Arc::new(TerminationCoordinator::new(1, queue.clone(), cancel.signal()));
        let assigned = partition(vec![counting(10)], 1).remove(0);

        Producer::new(0, assigned, shared(&queue, AdmissionGate::Unlimited, &cancel), coordinator)
            .run();
        assert!(drain(&queue).is_empty());
    }
}
