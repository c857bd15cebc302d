//! Growable FIFO of pending connections shared by the acceptor and the workers.

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::QueueError;

/// Result of [`WorkQueue::dequeue`].
#[derive(Debug, PartialEq, Eq)]
pub enum Dequeued<T> {
    Item(T),
    /// The queue was closed; the caller must stop consuming.
    Stop,
}

/// Circular buffer; `head` is the next slot to pop, the tail is `head + len` modulo capacity.
struct Ring<T> {
    buf: Vec<Option<T>>,
    head: usize,
    len: usize,
}

impl<T> Ring<T> {
    fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buf: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
        }
    }

    fn capacity(&self) -> usize {
        self.buf.len()
    }

    fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    fn push(&mut self, item: T) {
        debug_assert!(!self.is_full());
        let tail = (self.head + self.len) % self.capacity();
        self.buf[tail] = Some(item);
        self.len += 1;
    }

    fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let item = self.buf[self.head].take();
        debug_assert!(item.is_some(), "occupied ring slot {} was empty", self.head);
        self.head = (self.head + 1) % self.capacity();
        self.len -= 1;
        item
    }

    /// Doubles capacity, unrolling wrapped items so FIFO order survives.
    fn grow(&mut self) -> Result<usize, QueueError> {
        let old = self.capacity();
        let new = old
            .checked_mul(2)
            .ok_or(QueueError::Grow { capacity: usize::MAX })?;

        let mut buf = Vec::new();
        buf.try_reserve_exact(new)
            .map_err(|_| QueueError::Grow { capacity: new })?;
        for i in 0..self.len {
            buf.push(self.buf[(self.head + i) % old].take());
        }
        buf.resize_with(new, || None);

        self.buf = buf;
        self.head = 0;
        Ok(new)
    }
}

/// Unbounded work queue: producers never block, consumers park while it is empty.
pub struct WorkQueue<T> {
    ring: Mutex<Ring<T>>,
    available: Notify,
    stop: CancellationToken,
}

impl<T> WorkQueue<T> {
    /// Creates an empty queue with room for `capacity` items before the first growth.
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: Mutex::new(Ring::with_capacity(capacity)),
            available: Notify::new(),
            stop: CancellationToken::new(),
        }
    }

    /// Appends an item, doubling the buffer when full, and wakes one consumer.
    pub fn enqueue(&self, item: T) -> Result<(), QueueError> {
        {
            let mut ring = self.ring.lock();
            if ring.is_full() {
                let capacity = ring.grow()?;
                debug!(
                    component = "queue",
                    event = "resized",
                    capacity,
                    "queue resized"
                );
            }
            ring.push(item);
        }
        // Stores a permit when nobody is parked yet, so the wakeup is never lost.
        self.available.notify_one();
        Ok(())
    }

    /// Waits for the next item in FIFO order, or [`Dequeued::Stop`] once the queue is closed.
    /// A closed queue reports `Stop` even if items are still pending.
    pub async fn dequeue(&self) -> Dequeued<T> {
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            // Register before checking state so an enqueue in between still wakes us.
            notified.as_mut().enable();

            if self.stop.is_cancelled() {
                debug!(component = "queue", event = "stop_observed", "consumer caught stop flag");
                return Dequeued::Stop;
            }
            if let Some(item) = self.ring.lock().pop() {
                return Dequeued::Item(item);
            }

            tokio::select! {
                _ = notified => {}
                _ = self.stop.cancelled() => {}
            }
        }
    }

    /// Raises the stop flag and wakes every parked consumer. Idempotent.
    pub fn close(&self) {
        self.stop.cancel();
        self.available.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Number of pending items.
    pub fn len(&self) -> usize {
        self.ring.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.ring.lock().capacity()
    }
}
