//! # Task Queue
//!
//! Unbounded multi-producer multi-consumer FIFO used for pool task
//! distribution and discrete cross-thread events.
//!
//! The queue owns both ends of a crossbeam channel, so the channel can never
//! disconnect while the queue is alive: `pop` only ever blocks, it never fails.

use std::fmt;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};

/// Thread-safe FIFO queue.
///
/// - `push` always succeeds and wakes one blocked popper
/// - `pop` blocks until an item is available
/// - `try_pop` returns immediately
///
/// `len` and `is_empty` are snapshots and may be stale by the time the
/// caller looks at them.
pub struct TaskQueue<T> {
    sender: Sender<T>,
    receiver: Receiver<T>,
}

impl<T> TaskQueue<T> {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    /// Appends an item to the back of the queue.
    pub fn push(&self, item: T) {
        // Both halves live in `self`, so the receiver cannot be gone.
        let _ = self.sender.send(item);
    }

    /// Removes the front item, blocking until one is available.
    #[must_use]
    pub fn pop(&self) -> T {
        loop {
            if let Ok(item) = self.receiver.recv() {
                return item;
            }
        }
    }

    /// Removes the front item if there is one.
    #[must_use]
    pub fn try_pop(&self) -> Option<T> {
        match self.receiver.try_recv() {
            Ok(item) => Some(item),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Removes the front item, waiting at most `timeout` for one to arrive.
    #[must_use]
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        match self.receiver.recv_timeout(timeout) {
            Ok(item) => Some(item),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Takes every item currently queued, in FIFO order.
    #[must_use]
    pub fn drain(&self) -> Vec<T> {
        self.receiver.try_iter().collect()
    }

    /// Returns `true` if the queue held no items at the moment of the call.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Returns the number of queued items at the moment of the call.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.receiver.len()
    }
}

impl<T> Default for TaskQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for TaskQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue").field("len", &self.len()).finish()
    }
}
