//! Thread-safe double-ended queue of idle [`Slot`]s.
//!
//! Supports blocking and timed pops from the front, push to either end, and
//! a snapshot-based walk used by the maintenance sweep in place of a true
//! weakly-consistent external iterator (which Rust's ownership model makes
//! awkward to express directly — a `Vec` snapshot of cheaply-cloned `Arc`s
//! gives the same "tolerates concurrent mutation, never reflects
//! concurrent inserts" guarantee the spec asks for).

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::slot::Slot;

/// A LIFO/FIFO-capable idle queue of `Arc<Slot<R>>`.
pub struct IdleQueue<R> {
    deque: Mutex<VecDeque<Arc<Slot<R>>>>,
    notify: Notify,
}

impl<R> IdleQueue<R> {
    pub fn new() -> Self {
        Self {
            deque: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    pub fn push_front(&self, slot: Arc<Slot<R>>) {
        self.deque.lock().push_front(slot);
        self.notify.notify_one();
    }

    pub fn push_back(&self, slot: Arc<Slot<R>>) {
        self.deque.lock().push_back(slot);
        self.notify.notify_one();
    }

    /// Non-blocking pop from the front.
    pub fn poll_first(&self) -> Option<Arc<Slot<R>>> {
        self.deque.lock().pop_front()
    }

    /// Pop from the front, waiting up to `timeout` for an element to
    /// appear if the queue is currently empty.
    pub async fn poll_first_timeout(&self, timeout: Duration) -> Option<Arc<Slot<R>>> {
        if let Some(slot) = self.poll_first() {
            return Some(slot);
        }
        if timeout.is_zero() {
            return None;
        }
        let notified = self.notify.notified();
        tokio::pin!(notified);
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            tokio::select! {
                () = &mut notified => {
                    if let Some(slot) = self.poll_first() {
                        return Some(slot);
                    }
                    notified.set(self.notify.notified());
                }
                () = tokio::time::sleep_until(deadline) => {
                    return self.poll_first();
                }
            }
        }
    }

    /// Pop from the front, blocking indefinitely until an element appears.
    pub async fn take_first(&self) -> Arc<Slot<R>> {
        loop {
            if let Some(slot) = self.poll_first() {
                return slot;
            }
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.await;
        }
    }

    /// Remove a specific slot from the queue, by identity, wherever it
    /// sits. Used to pull a slot out from under a concurrent eviction
    /// test.
    pub fn remove(&self, slot: &Arc<Slot<R>>) -> bool {
        let mut deque = self.deque.lock();
        if let Some(pos) = deque.iter().position(|s| Arc::ptr_eq(s, slot)) {
            deque.remove(pos);
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.deque.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A future that resolves the next time an element is pushed or
    /// `notify_all` is called. Exposed so the pool's borrow loop can race
    /// it against a deadline while also re-checking the closed flag on
    /// every wake — something a plain `poll_first_timeout` can't do since
    /// it doesn't know about `closed`.
    pub fn notified(&self) -> tokio::sync::futures::Notified<'_> {
        self.notify.notified()
    }

    /// Wake every blocked waiter so it re-checks the queue (used by
    /// `close()` so borrowers parked in `take_first`/`poll_first_timeout`
    /// observe the closed pool promptly instead of waiting out their
    /// timeout).
    pub fn notify_all(&self) {
        self.notify.notify_waiters();
    }

    /// Snapshot of the current contents in head-to-tail order, for the
    /// maintenance sweep's forward walk.
    pub fn snapshot_forward(&self) -> Vec<Arc<Slot<R>>> {
        self.deque.lock().iter().cloned().collect()
    }

    /// Snapshot in tail-to-head order, for the LIFO sweep direction.
    pub fn snapshot_reverse(&self) -> Vec<Arc<Slot<R>>> {
        self.deque.lock().iter().rev().cloned().collect()
    }
}

impl<R> Default for IdleQueue<R> {
    fn default() -> Self {
        Self::new()
    }
}
