//! Bounded thread-safe FIFO queue.
//!
//! Serves two roles: the deferred-delivery buffer inside the subscriber
//! capability, and a general cross-thread handoff for completion records
//! (file watching, work queues). Overflow drops the oldest entry, trading
//! completeness for recency.

use parking_lot::Mutex;
use std::collections::VecDeque;

/// Capacity used by [`BoundedQueue::default`].
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// A mutex-guarded FIFO with fixed capacity and drop-oldest overflow.
///
/// All operations are safe to call concurrently from any number of threads;
/// callers need no external synchronization. Under sustained overflow the
/// queue behaves as a lossy ring buffer keeping the most recent entries.
#[derive(Debug)]
pub struct BoundedQueue<T> {
    /// Queued items, front is oldest
    items: Mutex<VecDeque<T>>,
    /// Maximum number of items held at once
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    /// Creates a queue holding at most `capacity` items.
    ///
    /// A capacity of zero is floored to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Appends an item, discarding the oldest entry if the queue is full.
    pub fn push(&self, item: T) {
        let mut items = self.items.lock();
        if items.len() == self.capacity {
            items.pop_front();
        }
        items.push_back(item);
    }

    /// Removes and returns the oldest item, if any.
    pub fn pop(&self) -> Option<T> {
        self.items.lock().pop_front()
    }

    /// Returns a snapshot of the current length.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Returns `true` if the queue held no items at the time of the call.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Returns the fixed capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T> Default for BoundedQueue<T> {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}
