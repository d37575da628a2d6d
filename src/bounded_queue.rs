/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Capacity-bounded blocking queue used to decouple network threads from processing threads.
//!
//! [`BoundedQueue`] is a thin wrapper around a [`std::sync::mpsc::sync_channel`]: producers block
//! while the queue is full (backpressure), consumers wait up to a timeout for an item so that they
//! can re-check a stop signal at bounded intervals. The receiving end is shared behind a mutex so
//! that a pool of consumers can drain one queue.

use std::{
    sync::{
        mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender, TryRecvError, TrySendError},
        Mutex,
    },
    thread,
    time::{Duration, Instant},
};

use crate::stop::StopSignal;

/// How long a producer sleeps between attempts while the queue is full.
const FULL_QUEUE_BACKOFF: Duration = Duration::from_millis(1);

enum QueueSender<T> {
    Bounded(SyncSender<T>),
    Unbounded(Sender<T>),
}

pub struct BoundedQueue<T> {
    sender: QueueSender<T>,
    receiver: Mutex<Receiver<T>>,
}

impl<T> BoundedQueue<T> {
    /// Create a queue holding at most `capacity` items. A capacity of 0 is treated as 1.
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::sync_channel(capacity.max(1));
        Self {
            sender: QueueSender::Bounded(sender),
            receiver: Mutex::new(receiver),
        }
    }

    /// Create a queue whose `enqueue` never blocks.
    pub fn unbounded() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            sender: QueueSender::Unbounded(sender),
            receiver: Mutex::new(receiver),
        }
    }

    /// Append `item`, blocking while the queue is at capacity.
    pub fn enqueue(&self, item: T) {
        // Safety: both channel ends live in `self`, so the channel is never disconnected.
        let _ = match &self.sender {
            QueueSender::Bounded(sender) => sender.send(item).map_err(|e| e.0),
            QueueSender::Unbounded(sender) => sender.send(item).map_err(|e| e.0),
        };
    }

    /// Try to append `item` without blocking. Gives the item back if the queue is full.
    pub fn try_enqueue(&self, item: T) -> Result<(), T> {
        match &self.sender {
            QueueSender::Bounded(sender) => match sender.try_send(item) {
                Ok(()) => Ok(()),
                Err(TrySendError::Full(item)) | Err(TrySendError::Disconnected(item)) => Err(item),
            },
            QueueSender::Unbounded(sender) => sender.send(item).map_err(|e| e.0),
        }
    }

    /// Append `item`, waiting at most `timeout` for space. Gives the item back on timeout.
    ///
    /// `SyncSender` has no timed send, so the wait is a retry loop that sleeps
    /// [`FULL_QUEUE_BACKOFF`] between attempts.
    pub fn enqueue_timeout(&self, item: T, timeout: Duration) -> Result<(), T> {
        let deadline = Instant::now() + timeout;
        let mut item = item;
        loop {
            match self.try_enqueue(item) {
                Ok(()) => return Ok(()),
                Err(rejected) => {
                    if Instant::now() >= deadline {
                        return Err(rejected);
                    }
                    item = rejected;
                    thread::sleep(FULL_QUEUE_BACKOFF);
                }
            }
        }
    }

    /// Append `item`, blocking while the queue is full, unless `stop` is set while waiting.
    /// Returns whether the item was enqueued.
    ///
    /// Waits with [`enqueue_timeout`](Self::enqueue_timeout), so a blocked producer wakes every
    /// [`FULL_QUEUE_BACKOFF`] to retry and checks `stop` every `poll`.
    pub fn enqueue_until_stopped(&self, item: T, stop: &StopSignal, poll: Duration) -> bool {
        let mut item = item;
        loop {
            match self.enqueue_timeout(item, poll) {
                Ok(()) => return true,
                Err(rejected) => {
                    if stop.is_set() {
                        return false;
                    }
                    item = rejected;
                }
            }
        }
    }

    /// Remove the oldest item, waiting at most `timeout` for one to arrive.
    pub fn dequeue(&self, timeout: Duration) -> Option<T> {
        let receiver = self.receiver.lock().expect("queue receiver lock poisoned");
        match receiver.recv_timeout(timeout) {
            Ok(item) => Some(item),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Remove the oldest item if one is immediately available.
    pub fn try_dequeue(&self) -> Option<T> {
        let receiver = self.receiver.lock().expect("queue receiver lock poisoned");
        match receiver.try_recv() {
            Ok(item) => Some(item),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}
