//! Event flag implementation.
//!
//! This module provides a reusable wait/signal primitive built on top of the
//! battle-tested `parking_lot` crate.

use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// A reusable auto-reset event flag.
///
/// An event flag lets one thread block, consuming no CPU time, until another
/// thread signals it. Signaling is idempotent: setting an already-set flag is
/// a no-op, and a signal delivered while no thread is waiting is latched, so
/// the next wait returns immediately. Consuming the signal (a wait that
/// observed it) resets the flag for reuse.
///
/// # Examples
///
/// ```
/// use prometheus_event_loop::EventFlag;
/// use std::sync::Arc;
/// use std::thread;
///
/// let flag = Arc::new(EventFlag::new());
/// let flag2 = Arc::clone(&flag);
///
/// thread::spawn(move || {
///     // Signal that we're ready
///     flag2.set();
/// });
///
/// // Blocks until the other thread signals
/// flag.wait();
/// ```
#[derive(Debug, Default)]
pub struct EventFlag {
    signaled: Mutex<bool>,
    condvar: Condvar,
}

impl EventFlag {
    /// Creates a new, unsignaled event flag.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            signaled: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    /// Signals the flag, waking every thread currently blocked in [`wait`] or
    /// [`wait_timeout`].
    ///
    /// Idempotent; the signal stays latched until a waiter consumes it.
    ///
    /// [`wait`]: EventFlag::wait
    /// [`wait_timeout`]: EventFlag::wait_timeout
    #[inline]
    pub fn set(&self) {
        let mut signaled = self.signaled.lock();
        *signaled = true;
        self.condvar.notify_all();
    }

    /// Blocks the current thread until the flag is signaled, then consumes
    /// the signal.
    ///
    /// Returns immediately if the flag is already set.
    pub fn wait(&self) {
        let mut signaled = self.signaled.lock();
        while !*signaled {
            self.condvar.wait(&mut signaled);
        }
        *signaled = false;
    }

    /// Blocks the current thread until the flag is signaled or `timeout`
    /// elapses, whichever comes first.
    ///
    /// Returns `true` if the signal was observed and consumed, `false` on a
    /// spurious wake or timeout. Unlike [`wait`], a single notification is
    /// enough to return even if the signal was consumed by another thread in
    /// the meantime; callers are expected to re-check their own condition,
    /// which is exactly what a scheduling loop does on every pass.
    ///
    /// [`wait`]: EventFlag::wait
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut signaled = self.signaled.lock();
        if !*signaled {
            self.condvar.wait_for(&mut signaled, timeout);
        }
        let observed = *signaled;
        *signaled = false;
        observed
    }

    /// Returns `true` if the flag is currently signaled, without consuming it.
    #[inline]
    #[must_use]
    pub fn is_set(&self) -> bool {
        *self.signaled.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_set_then_wait_returns_immediately() {
        let flag = EventFlag::new();
        flag.set();
        flag.wait();
        assert!(!flag.is_set());
    }

    #[test]
    fn test_set_is_idempotent() {
        let flag = EventFlag::new();
        flag.set();
        flag.set();
        assert!(flag.wait_timeout(Duration::from_millis(10)));
        // Second wait must not observe a second signal
        assert!(!flag.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn test_wait_blocks_until_set() {
        let flag = Arc::new(EventFlag::new());
        let flag2 = Arc::clone(&flag);

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            flag2.set();
        });

        let start = Instant::now();
        flag.wait();
        assert!(start.elapsed() >= Duration::from_millis(10));
        handle.join().unwrap();
    }

    #[test]
    fn test_wait_timeout_expires() {
        let flag = EventFlag::new();
        let start = Instant::now();
        assert!(!flag.wait_timeout(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn test_set_wakes_all_waiters() {
        let flag = Arc::new(EventFlag::new());
        let mut handles = vec![];

        for _ in 0..4 {
            let flag = Arc::clone(&flag);
            handles.push(thread::spawn(move || {
                // Bounded wait returns on the broadcast even if another
                // thread consumed the latched signal first.
                flag.wait_timeout(Duration::from_secs(5))
            }));
        }

        thread::sleep(Duration::from_millis(20));
        flag.set();

        let observed: usize = handles
            .into_iter()
            .map(|h| usize::from(h.join().unwrap()))
            .sum();
        assert!(observed >= 1);
    }

    #[test]
    fn test_reusable_after_consume() {
        let flag = Arc::new(EventFlag::new());
        for _ in 0..3 {
            let flag2 = Arc::clone(&flag);
            let handle = thread::spawn(move || flag2.set());
            flag.wait();
            handle.join().unwrap();
            assert!(!flag.is_set());
        }
    }
}
