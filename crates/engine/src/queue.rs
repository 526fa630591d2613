use std::collections::VecDeque;
use std::fmt;

use parking_lot::{Condvar, Mutex};

/// Error returned by [`BlockingQueue::push`] on a closed queue, handing the
/// rejected value back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Closed<T>(pub T);

impl<T> fmt::Display for Closed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("queue is closed")
    }
}

impl<T: fmt::Debug> std::error::Error for Closed<T> {}

struct Inner<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// A thread-safe FIFO with optional capacity and close-and-drain semantics.
///
/// `push` blocks while a bounded queue is full and fails once the queue is
/// closed. `pop` blocks while the queue is empty and returns `None` only
/// once the queue is closed *and* drained, so no enqueued item is ever lost.
/// `close` is idempotent and wakes every blocked producer and consumer.
pub struct BlockingQueue<T> {
    inner: Mutex<Inner<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

impl<T> BlockingQueue<T> {
    /// Creates an unbounded queue.
    pub fn new() -> Self {
        Self::bounded(0)
    }

    /// Creates a queue holding at most `capacity` items; 0 means unbounded.
    pub fn bounded(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        }
    }

    /// Enqueues `value`, blocking while a bounded queue is full.
    ///
    /// Fails with [`Closed`] (returning the value) once the queue is closed,
    /// including when the close happens while this call is blocked.
    pub fn push(&self, value: T) -> Result<(), Closed<T>> {
        let mut inner = self.inner.lock();
        while !inner.closed && self.capacity != 0 && inner.items.len() >= self.capacity {
            self.not_full.wait(&mut inner);
        }
        if inner.closed {
            return Err(Closed(value));
        }
        inner.items.push_back(value);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Dequeues the oldest item, blocking while the queue is open and empty.
    ///
    /// Returns `None` only once the queue is closed and fully drained.
    pub fn pop(&self) -> Option<T> {
        let mut inner = self.inner.lock();
        while inner.items.is_empty() && !inner.closed {
            self.not_empty.wait(&mut inner);
        }
        let item = inner.items.pop_front();
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Dequeues the oldest item without blocking.
    pub fn try_pop(&self) -> Option<T> {
        let mut inner = self.inner.lock();
        let item = inner.items.pop_front();
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Closes the queue: wakes all blocked callers, rejects further pushes.
    ///
    /// Items already enqueued remain deliverable. Idempotent.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Whether the queue has been closed.
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Current number of enqueued items.
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    /// Whether the queue is currently empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }
}

impl<T> Default for BlockingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
