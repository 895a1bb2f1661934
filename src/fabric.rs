//! Coordination fabric between pipeline stages
//!
//! Each hop in the pipeline is a [`Lane`]: a fixed-capacity FIFO
//! ([`BoundedQueue`]) paired with a level-triggered [`ReadySignal`] that is
//! set while the queue may hold items. Consumers sleep on the signal instead
//! of polling the queue.
//!
//! Every lane has exactly one producer and one consumer, so enqueue order
//! equals dequeue order.

use crossbeam::queue::ArrayQueue;
use std::fmt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Returned by [`BoundedQueue::try_push`] when the queue is at capacity
///
/// Carries the rejected item back so the caller decides how to account
/// for the loss.
#[derive(PartialEq, Eq)]
pub struct QueueFull<T>(pub T);

impl<T> QueueFull<T> {
    /// Take back the rejected item
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for QueueFull<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("QueueFull(..)")
    }
}

impl<T> fmt::Display for QueueFull<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("queue is full")
    }
}

impl<T> std::error::Error for QueueFull<T> {}

/// Fixed-capacity lock-free FIFO
///
/// Enqueue fails when full and dequeue returns `None` when empty; neither
/// ever blocks.
pub struct BoundedQueue<T> {
    inner: ArrayQueue<T>,
}

impl<T> BoundedQueue<T> {
    /// Create a queue holding at most `capacity` items
    ///
    /// # Panics
    /// Panics if `capacity` is zero. Configured capacities arrive as
    /// [`QueueCapacity`](crate::types::QueueCapacity) and are never zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: ArrayQueue::new(capacity),
        }
    }

    /// Append an item, handing it back if the queue is full
    pub fn try_push(&self, item: T) -> Result<(), QueueFull<T>> {
        self.inner.push(item).map_err(QueueFull)
    }

    /// Remove the oldest item, if any
    pub fn try_pop(&self) -> Option<T> {
        self.inner.pop()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }
}

impl<T> fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedQueue")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

/// Level-triggered boolean condition
///
/// Stays set across any number of [`wait`](Self::wait) calls until it is
/// explicitly cleared. `wait` on an already-set signal returns immediately.
#[derive(Debug)]
pub struct ReadySignal {
    state: watch::Sender<bool>,
}

impl ReadySignal {
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self { state }
    }

    /// Set the signal, waking every waiter
    pub fn set(&self) {
        self.state.send_if_modified(|set| {
            let changed = !*set;
            *set = true;
            changed
        });
    }

    /// Clear the signal; later waiters sleep until the next `set`
    pub fn clear(&self) {
        self.state.send_if_modified(|set| {
            let changed = *set;
            *set = false;
            changed
        });
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        *self.state.borrow()
    }

    /// Wait until the signal is set
    pub async fn wait(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|set| *set).await;
    }

    /// Wait until the signal is set or `cancel` fires
    ///
    /// Returns `false` if cancelled first.
    pub async fn wait_or_cancel(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            () = cancel.cancelled() => false,
            () = self.wait() => true,
        }
    }
}

impl Default for ReadySignal {
    fn default() -> Self {
        Self::new()
    }
}

/// A bounded queue plus its "non-empty" signal
#[derive(Debug)]
pub struct Lane<T> {
    queue: BoundedQueue<T>,
    ready: ReadySignal,
}

impl<T> Lane<T> {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: BoundedQueue::new(capacity),
            ready: ReadySignal::new(),
        }
    }

    /// Enqueue without blocking and raise the ready signal
    ///
    /// On overflow the item is handed back and the signal is left alone.
    pub fn push(&self, item: T) -> Result<(), QueueFull<T>> {
        self.queue.try_push(item)?;
        if !self.ready.is_set() {
            self.ready.set();
        }
        Ok(())
    }

    /// Dequeue the next item, sleeping while the lane is empty
    ///
    /// Drains eagerly: while items remain the signal stays set and this
    /// returns immediately. When the queue is observed empty the consumer
    /// clears the signal itself and goes back to sleep. Returns `None` only
    /// when `cancel` fires.
    pub async fn recv(&self, cancel: &CancellationToken) -> Option<T> {
        loop {
            if !self.ready.wait_or_cancel(cancel).await {
                return None;
            }
            if let Some(item) = self.queue.try_pop() {
                return Some(item);
            }
            self.ready.clear();
            // A push may have landed between the failed pop and the clear.
            if !self.queue.is_empty() {
                self.ready.set();
            }
        }
    }

    /// Non-blocking dequeue; an empty lane is simply "no work"
    pub fn try_recv(&self) -> Option<T> {
        self.queue.try_pop()
    }

    /// Drop everything currently queued, returning how many items went
    pub fn discard_backlog(&self) -> usize {
        let mut discarded = 0;
        while self.queue.try_pop().is_some() {
            discarded += 1;
        }
        self.ready.clear();
        if !self.queue.is_empty() {
            self.ready.set();
        }
        discarded
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.is_set()
    }
}
