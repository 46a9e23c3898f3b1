//! Pending-work containers: the immediate FIFO and the timer min-heap.
//!
//! Both support concurrent push from any thread while being drained by
//! loop-driving threads. Tearing either down drops, never invokes, any
//! callables still inside.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

use crate::core::error::EventResult;
use crate::core::event_loop::EventLoop;
use crate::core::functor::Functor;

/// Unbounded, thread-safe FIFO of pending immediate functors.
///
/// Functors pushed by a single thread are popped in push order relative to
/// each other; across threads the order is arrival order at the shared
/// channel.
pub(crate) struct WorkQueue {
    tx: Sender<Functor>,
    rx: Receiver<Functor>,
}

impl WorkQueue {
    pub(crate) fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    /// Pushes a functor. Cannot fail while the queue is alive; returns
    /// whether the push was accepted.
    pub(crate) fn push(&self, functor: Functor) -> bool {
        self.tx.send(functor).is_ok()
    }

    /// Pops the oldest functor, or `None` when the queue is empty.
    pub(crate) fn try_pop(&self) -> Option<Functor> {
        self.rx.try_recv().ok()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.rx.len()
    }

    /// Drops every queued functor without invoking it.
    pub(crate) fn clear(&self) {
        while self.rx.try_recv().is_ok() {}
    }
}

/// A scheduled callback. Repeating entries are re-invoked, so the callable
/// is `FnMut` rather than the one-shot [`Functor`].
pub(crate) type TimerCallback = Box<dyn FnMut(&EventLoop) -> EventResult + Send>;

/// A scheduled callback: fires at or after `wake`, and again every
/// `interval` unless the interval is zero (one-shot) or the callback
/// cancelled it.
pub(crate) struct TimerEntry {
    pub(crate) callback: TimerCallback,
    pub(crate) wake: Instant,
    pub(crate) interval: Duration,
}

// Ordered by wake time only; entries with equal wake times are deliberately
// unordered relative to each other.
impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.wake == other.wake
    }
}

impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the BinaryHeap surfaces the earliest wake time first.
        other.wake.cmp(&self.wake)
    }
}

/// Thread-safe min-heap of scheduled callbacks, keyed by absolute wake time.
pub(crate) struct TimerQueue {
    heap: Mutex<BinaryHeap<TimerEntry>>,
}

impl TimerQueue {
    pub(crate) fn new() -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
        }
    }

    pub(crate) fn push(&self, entry: TimerEntry) {
        self.heap.lock().push(entry);
    }

    /// Pops the earliest entry if its wake time is at or before `now`.
    pub(crate) fn pop_due(&self, now: Instant) -> Option<TimerEntry> {
        let mut heap = self.heap.lock();
        if heap.peek().is_some_and(|entry| entry.wake <= now) {
            heap.pop()
        } else {
            None
        }
    }

    /// Wake time of the earliest pending entry, if any.
    pub(crate) fn next_wake(&self) -> Option<Instant> {
        self.heap.lock().peek().map(|entry| entry.wake)
    }

    pub(crate) fn len(&self) -> usize {
        self.heap.lock().len()
    }

    /// Drops every pending entry without invoking it.
    pub(crate) fn clear(&self) {
        self.heap.lock().clear();
    }
}
