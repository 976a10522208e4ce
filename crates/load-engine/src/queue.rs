//! Bounded queue of scheduled tasks between producers and consumers.

use crossbeam_channel::{bounded, select, Receiver, Sender};
use std::time::Instant;
use tracing::trace;

use crate::cancel::CancelSignal;

/// Task stamped with the earliest instant it may start.
#[derive(Debug)]
pub struct ScheduledTask<T> {
    pub task: T,
    pub start_time: Instant,
}

impl<T> ScheduledTask<T> {
    pub fn new(task: T, start_time: Instant) -> Self {
        Self { task, start_time }
    }
}

/// Queue element: a real task or the end-of-work marker.
#[derive(Debug)]
pub enum Entry<T> {
    Task(ScheduledTask<T>),
    Terminator,
}

/// Outcome of a cancellable enqueue.
#[derive(Debug, PartialEq, Eq)]
pub enum PutOutcome {
    Enqueued,
    Cancelled,
}

/// Multi-producer multi-consumer FIFO with a fixed capacity.
///
/// Producers block on a full queue and consumers on an empty one. Both halves
/// live in the same value, so the channel never disconnects while a worker
/// holds a clone.
#[derive(Debug)]
pub struct TaskQueue<T> {
    tx: Sender<Entry<T>>,
    rx: Receiver<Entry<T>>,
}

impl<T> Clone for TaskQueue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
        }
    }
}

impl<T> TaskQueue<T> {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self { tx, rx }
    }

    /// Enqueue, blocking while the queue is full unless `cancel` fires first.
    pub fn put_cancellable(&self, task: ScheduledTask<T>, cancel: &CancelSignal) -> PutOutcome {
        if cancel.is_cancelled() {
            return PutOutcome::Cancelled;
        }
        select! {
            send(self.tx, Entry::Task(task)) -> res => match res {
                Ok(()) => PutOutcome::Enqueued,
                Err(_) => PutOutcome::Cancelled,
            },
            recv(cancel.receiver()) -> _ => PutOutcome::Cancelled,
        }
    }

    /// Take the next entry, blocking while the queue is empty.
    pub fn take(&self) -> Entry<T> {
        self.rx.recv().unwrap_or(Entry::Terminator)
    }

    /// Enqueue a terminator, blocking while the queue is full.
    pub fn add_terminator(&self) {
        if self.tx.send(Entry::Terminator).is_err() {
            trace!("task queue disconnected, terminator dropped");
        }
    }

    /// Enqueue a terminator unless `cancel` fires first.
    pub fn add_terminator_cancellable(&self, cancel: &CancelSignal) -> PutOutcome {
        if cancel.is_cancelled() {
            return PutOutcome::Cancelled;
        }
        select! {
            send(self.tx, Entry::Terminator) -> res => match res {
                Ok(()) => PutOutcome::Enqueued,
                Err(_) => PutOutcome::Cancelled,
            },
            recv(cancel.receiver()) -> _ => PutOutcome::Cancelled,
        }
    }

    /// Drop every queued task; returns the number removed. A queued
    /// terminator is put back.
    pub fn clear(&self) -> usize {
        let mut dropped = 0;
        let mut terminator = false;
        for entry in self.rx.try_iter() {
            match entry {
                Entry::Task(_) => dropped += 1,
                Entry::Terminator => terminator = true,
            }
        }
        if terminator {
            self.add_terminator();
        }
        dropped
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.rx.capacity()
    }
}
