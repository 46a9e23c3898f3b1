//! The scheduling engine: queues, the loop step function, and the managed
//! thread-pool lifecycle.
//!
//! An [`EventLoop`] owns a work queue of immediate functors, a min-heap of
//! timed callbacks, and an [`EventFlag`] used to park idle loop threads. Any
//! number of threads may drive the same loop concurrently, either managed
//! workers spawned by [`run`](EventLoop::run) or the caller's own threads
//! calling [`drive`](EventLoop::drive) directly; any thread may schedule
//! work concurrently with running loops.
//!
//! # Design Principles
//!
//! - **No polling**: idle loop threads block on the event flag, bounded by
//!   the nearest timer deadline.
//! - **No lock across callbacks**: scheduled work runs with no engine lock
//!   held, so callbacks may freely post, invoke, or stop.
//! - **Errors as values**: a failing callback aborts that loop pass into an
//!   [`ExceptionHandle`]; no unwinding crosses the engine boundary.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::LoopConfig;
use crate::core::error::{EventResult, LoopError, CODE_OK};
use crate::core::exception::{fatal, ExceptionHandle};
use crate::core::functor::{Functor, FunctorView, IntervalFunctor, RawCallback};
use crate::core::queue::{TimerEntry, TimerQueue, WorkQueue};
use crate::event_flag::EventFlag;

/// How long `stop` waits between re-checks for externally driven loop
/// threads to unwind.
const STOP_POLL: Duration = Duration::from_millis(50);

/// Snapshot of loop utilization counters.
#[derive(Debug, Clone, Default)]
pub struct LoopStats {
    /// Threads currently executing a loop pass.
    pub threads: usize,
    /// Threads currently parked waiting for work.
    pub threads_waiting: usize,
    /// Upper bound on immediate work items queued.
    pub queued_items: usize,
    /// Pending timer entries, due or not.
    pub pending_timers: usize,
}

struct Shared {
    config: LoopConfig,
    work: WorkQueue,
    timers: TimerQueue,
    /// Poked on every enqueue; parks idle loop threads.
    flag: EventFlag,
    /// Signaled whenever a loop pass unwinds; `stop` waits on it for
    /// externally driven threads.
    loop_ended: EventFlag,
    running: AtomicBool,
    stopping: AtomicBool,
    /// Set by `cancel` from inside a timer callback; cleared before each
    /// timer invocation.
    cancel: AtomicBool,
    /// Incremented before each enqueue attempt, decremented on failure or
    /// pop: an upper bound on outstanding immediate work, never an
    /// undercount.
    queue_items: AtomicUsize,
    threads: AtomicUsize,
    threads_waiting: AtomicUsize,
    managed: Mutex<Vec<JoinHandle<()>>>,
    stop_guard: Mutex<()>,
    worker_seq: AtomicUsize,
}

/// A shared, thread-safe event loop.
///
/// Cloning is cheap and yields another handle to the same engine; managed
/// worker threads hold such clones.
///
/// # Examples
///
/// ```
/// use prometheus_event_loop::EventLoop;
///
/// let el = EventLoop::new();
/// el.post(|_| {
///     println!("ran on a worker thread");
///     Ok(())
/// })
/// .unwrap();
/// el.run(|err| eprintln!("loop error: {err}"));
/// el.join(false).unwrap();
/// el.stop();
/// ```
#[derive(Clone)]
pub struct EventLoop {
    shared: Arc<Shared>,
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop").field("stats", &self.stats()).finish()
    }
}

impl EventLoop {
    /// Creates an event loop with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(LoopConfig::default())
    }

    /// Creates an event loop with the given configuration.
    ///
    /// Invalid configuration values are clamped to their minimums and
    /// logged; see [`LoopConfig::validate`] to reject them instead.
    #[must_use]
    pub fn with_config(config: LoopConfig) -> Self {
        let config = match config.validate() {
            Ok(()) => config,
            Err(e) => {
                warn!(error = %e, "invalid loop config, falling back to defaults");
                LoopConfig::default()
            }
        };
        Self {
            shared: Arc::new(Shared {
                config,
                work: WorkQueue::new(),
                timers: TimerQueue::new(),
                flag: EventFlag::new(),
                loop_ended: EventFlag::new(),
                running: AtomicBool::new(false),
                stopping: AtomicBool::new(false),
                cancel: AtomicBool::new(false),
                queue_items: AtomicUsize::new(0),
                threads: AtomicUsize::new(0),
                threads_waiting: AtomicUsize::new(0),
                managed: Mutex::new(Vec::new()),
                stop_guard: Mutex::new(()),
                worker_seq: AtomicUsize::new(0),
            }),
        }
    }

    // ------------------------------------------------------------------
    // Scheduling: closure form
    // ------------------------------------------------------------------

    /// Posts a functor for execution as soon as a loop thread is free, and
    /// returns immediately.
    ///
    /// # Errors
    ///
    /// Only synchronous scheduling failure (allocation exhaustion) is
    /// reported here; failures during eventual invocation surface through
    /// the loop driver's [`ExceptionHandle`].
    pub fn post<F>(&self, f: F) -> EventResult
    where
        F: FnOnce(&EventLoop) -> EventResult + Send + 'static,
    {
        self.post_functor(Functor::new(f))
    }

    /// Posts a functor and blocks until it has been executed on a loop
    /// thread.
    ///
    /// # Errors
    ///
    /// Any failure raised by `f` is rethrown to this caller after the wait
    /// completes.
    ///
    /// # Deadlocks
    ///
    /// Must not be called from the sole thread driving this loop: the call
    /// would wait for work only it could process. This precondition is the
    /// caller's responsibility and is not enforced.
    pub fn invoke<F>(&self, f: F) -> EventResult
    where
        F: FnOnce(&EventLoop) -> EventResult + Send + 'static,
    {
        self.invoke_functor(Functor::new(f))
    }

    /// Schedules a one-shot functor to fire once `delay` has elapsed.
    ///
    /// # Errors
    ///
    /// Synchronous scheduling failure only, as for [`post`](EventLoop::post).
    pub fn timeout<F>(&self, f: F, delay: Duration) -> EventResult
    where
        F: FnOnce(&EventLoop) -> EventResult + Send + 'static,
    {
        self.timeout_functor(Functor::new(f), delay)
    }

    /// Schedules `f` to fire every `period` until it calls
    /// [`cancel`](EventLoop::cancel) from within its own callback.
    ///
    /// The first firing happens one full `period` after scheduling.
    /// Repeating callbacks are re-invoked, hence `FnMut`.
    ///
    /// # Errors
    ///
    /// Synchronous scheduling failure only, as for [`post`](EventLoop::post).
    pub fn interval<F>(&self, f: F, period: Duration) -> EventResult
    where
        F: FnMut(&EventLoop) -> EventResult + Send + 'static,
    {
        self.interval_functor(IntervalFunctor::new(f), period)
    }

    // ------------------------------------------------------------------
    // Scheduling: functor form
    // ------------------------------------------------------------------

    /// Posts a pre-built owned functor.
    ///
    /// # Errors
    ///
    /// Synchronous scheduling failure only.
    pub fn post_functor(&self, functor: Functor) -> EventResult {
        let s = &*self.shared;
        s.queue_items.fetch_add(1, Ordering::AcqRel);
        if s.work.push(functor) {
            s.flag.set();
            Ok(())
        } else {
            s.queue_items.fetch_sub(1, Ordering::AcqRel);
            Err(LoopError::Generic)
        }
    }

    /// Posts a functor view: movable views are relocated into the queue,
    /// borrowed views are invoked in place before returning.
    ///
    /// # Errors
    ///
    /// Scheduling failure for movable views; the callable's own failure for
    /// borrowed views.
    pub fn post_view(&self, view: FunctorView<'_>) -> EventResult {
        match view.into_functor() {
            Ok(functor) => self.post_functor(functor),
            Err(borrowed) => borrowed.invoke(self),
        }
    }

    /// Posts a pre-built functor and blocks until it has executed; the
    /// blocking-call counterpart of [`post_functor`](EventLoop::post_functor).
    ///
    /// # Errors
    ///
    /// Rethrows the functor's failure to this caller. See
    /// [`invoke`](EventLoop::invoke) for the deadlock precondition.
    pub fn invoke_functor(&self, functor: Functor) -> EventResult {
        let done = Arc::new(EventFlag::new());
        let slot: Arc<Mutex<Option<EventResult>>> = Arc::new(Mutex::new(None));
        let done2 = Arc::clone(&done);
        let slot2 = Arc::clone(&slot);
        // The wrapper always sets the completion flag and reports the
        // failure (a panic included) to the invoker rather than to the loop
        // driver; skipping the flag would strand the invoker forever.
        self.post(move |el| {
            let result = contain_unwind(|| functor.invoke(el));
            *slot2.lock() = Some(result);
            done2.set();
            Ok(())
        })?;
        done.wait();
        let result = slot.lock().take();
        result.unwrap_or(Err(LoopError::Generic))
    }

    /// [`invoke`](EventLoop::invoke), with the failure captured into
    /// `errors` instead of returned.
    pub fn invoke_capture<F>(&self, f: F, errors: &mut ExceptionHandle)
    where
        F: FnOnce(&EventLoop) -> EventResult + Send + 'static,
    {
        let _ = errors.capture(|| self.invoke(f));
    }

    /// Schedules a pre-built one-shot functor to fire after `delay`.
    ///
    /// # Errors
    ///
    /// Synchronous scheduling failure only.
    pub fn timeout_functor(&self, functor: Functor, delay: Duration) -> EventResult {
        let mut slot = Some(functor);
        self.schedule(
            Box::new(move |el: &EventLoop| slot.take().map_or(Ok(()), |f| f.invoke(el))),
            delay,
            Duration::ZERO,
        );
        Ok(())
    }

    /// Schedules a pre-built repeating functor to fire every `period` until
    /// it calls [`cancel`](EventLoop::cancel) from within its own callback.
    ///
    /// # Errors
    ///
    /// Synchronous scheduling failure only.
    pub fn interval_functor(&self, functor: IntervalFunctor, period: Duration) -> EventResult {
        self.schedule(functor.into_callback(), period, period);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Scheduling: raw-capture form
    // ------------------------------------------------------------------

    /// Raw-convention [`post`](EventLoop::post): a plain function pointer
    /// plus a flat byte buffer of captured state, copied into owned storage.
    /// Returns an integer code, never panicking across the call.
    pub fn post_raw(&self, callback: RawCallback, capture: &[u8]) -> i32 {
        code_of(self.post_functor(Functor::from_raw(callback, capture)))
    }

    /// Raw-convention [`invoke`](EventLoop::invoke); blocks until executed
    /// and returns the callback's translated code.
    pub fn invoke_raw(&self, callback: RawCallback, capture: &[u8]) -> i32 {
        code_of(self.invoke_functor(Functor::from_raw(callback, capture)))
    }

    /// Raw-convention [`timeout`](EventLoop::timeout).
    pub fn timeout_raw(&self, callback: RawCallback, capture: &[u8], timeout_ms: u64) -> i32 {
        code_of(
            self.timeout_functor(
                Functor::from_raw(callback, capture),
                Duration::from_millis(timeout_ms),
            ),
        )
    }

    /// Raw-convention [`interval`](EventLoop::interval). The capture buffer
    /// is copied once and handed to the callback on every firing.
    pub fn interval_raw(&self, callback: RawCallback, capture: &[u8], interval_ms: u64) -> i32 {
        code_of(self.interval_functor(
            IntervalFunctor::from_raw(callback, capture),
            Duration::from_millis(interval_ms),
        ))
    }

    fn schedule(
        &self,
        callback: Box<dyn FnMut(&EventLoop) -> EventResult + Send>,
        delay: Duration,
        interval: Duration,
    ) {
        self.shared.timers.push(TimerEntry {
            callback,
            wake: Instant::now() + delay,
            interval,
        });
        self.shared.flag.set();
    }

    // ------------------------------------------------------------------
    // Loop step function
    // ------------------------------------------------------------------

    /// Executes loop passes on the calling thread until the loop is stopped
    /// or a scheduled callable raises an error.
    ///
    /// Safe to call from any number of threads concurrently against the same
    /// loop. Each pass drains all due immediate work, then fires due timers
    /// (rescheduling repeating entries that were not cancelled), then parks
    /// on the event flag until the nearest timer deadline, bounded by the
    /// configured maximum wait. Spurious wakes re-enter the pass and are not
    /// errors.
    ///
    /// A raised error is captured into `errors` and ends this call; the loop
    /// does not resume on its own — the driver decides whether to re-enter.
    /// A callback that panics instead of returning an error is contained
    /// and captured as [`LoopError::Generic`]; no unwinding escapes this
    /// call. Returns immediately when the loop is stopping.
    pub fn drive(&self, errors: &mut ExceptionHandle) {
        let s = &*self.shared;
        if s.stopping.load(Ordering::Acquire) {
            return;
        }
        s.running.store(true, Ordering::Release);
        s.threads.fetch_add(1, Ordering::AcqRel);
        debug!("loop thread entering");

        'running: while s.running.load(Ordering::Acquire) {
            // All due immediate work drains before any timer is checked.
            while let Some(functor) = s.work.try_pop() {
                s.queue_items.fetch_sub(1, Ordering::AcqRel);
                if errors.capture(|| contain_unwind(|| functor.invoke(self))).is_none() {
                    break 'running;
                }
            }

            while let Some(mut entry) = s.timers.pop_due(Instant::now()) {
                s.cancel.store(false, Ordering::Release);
                if errors.capture(|| contain_unwind(|| (entry.callback)(self))).is_none() {
                    break 'running;
                }
                let repeat =
                    entry.interval > Duration::ZERO && !s.cancel.load(Ordering::Acquire);
                if repeat {
                    entry.wake += entry.interval;
                    s.timers.push(entry);
                }
                // Immediate work posted by the callback takes precedence
                // over further due timers.
                if !s.work.is_empty() {
                    continue 'running;
                }
            }

            if !s.running.load(Ordering::Acquire) {
                break;
            }

            // Park until poked or the nearest timer is due. The wait is
            // clamped so the pass periodically re-evaluates even if the
            // clock behaves unexpectedly.
            let max_wait = Duration::from_millis(s.config.max_wait_ms);
            let wait = s.timers.next_wake().map_or(max_wait, |wake| {
                wake.saturating_duration_since(Instant::now()).min(max_wait)
            });
            s.threads_waiting.fetch_add(1, Ordering::AcqRel);
            s.flag.wait_timeout(wait);
            s.threads_waiting.fetch_sub(1, Ordering::AcqRel);

            // Thundering-herd control: with more work left than this thread
            // can take and other threads still parked, pass the signal on.
            if s.queue_items.load(Ordering::Acquire) > 1
                && s.threads_waiting.load(Ordering::Acquire) > 0
            {
                s.flag.set();
            }
        }

        s.threads.fetch_sub(1, Ordering::AcqRel);
        s.loop_ended.set();
        debug!("loop thread exiting");
    }

    /// Prevents the timer callback currently executing on some loop thread
    /// from being rescheduled.
    ///
    /// Valid only when called synchronously from inside a timer callback;
    /// it suppresses the reschedule decision for that invocation only and
    /// cannot abort a callback already in progress. Calling it anywhere
    /// else has no effect.
    pub fn cancel(&self) {
        self.shared.cancel.store(true, Ordering::Release);
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Spawns one managed worker thread that drives this loop.
    ///
    /// The worker repeatedly calls [`drive`](EventLoop::drive) with a fresh
    /// [`ExceptionHandle`]; when a pass ends with a captured error the
    /// worker reports it to `on_error` and, while the loop is still running,
    /// re-enters the loop. If `on_error` itself panics the process is
    /// terminated: there is no safe way to propagate a second failure once
    /// the first is being reported.
    ///
    /// Multiple calls stack independent workers sharing the same queues.
    pub fn run<F>(&self, mut on_error: F)
    where
        F: FnMut(LoopError) + Send + 'static,
    {
        let el = self.clone();
        let worker_id = self.shared.worker_seq.fetch_add(1, Ordering::Relaxed);
        let handle = thread::Builder::new()
            .name(format!("{}-{worker_id}", self.shared.config.thread_name_prefix))
            .stack_size(self.shared.config.thread_stack_size)
            .spawn(move || {
                debug!(worker_id = worker_id, "managed loop thread started");
                loop {
                    let mut errors = ExceptionHandle::new();
                    el.drive(&mut errors);
                    if let Some(err) = errors.take() {
                        warn!(
                            worker_id = worker_id,
                            error = %err,
                            "loop pass ended with captured error"
                        );
                        if catch_unwind(AssertUnwindSafe(|| on_error(err))).is_err() {
                            fatal("error handler raised while reporting a loop failure");
                        }
                    }
                    if !el.shared.running.load(Ordering::Acquire) {
                        break;
                    }
                }
                debug!(worker_id = worker_id, "managed loop thread exiting");
            })
            .expect("failed to spawn managed loop thread");
        self.shared.managed.lock().push(handle);
    }

    /// Spawns the configured number of managed workers (default: one per
    /// logical CPU), cloning `on_error` for each.
    pub fn run_pool<F>(&self, on_error: F)
    where
        F: FnMut(LoopError) + Clone + Send + 'static,
    {
        let count = self.shared.config.worker_count;
        for _ in 0..count {
            self.run(on_error.clone());
        }
        info!(worker_count = count, "event loop worker pool started");
    }

    /// Blocks until the work queued before this call has been processed.
    ///
    /// With `drain_all` set, keeps waiting until the work queue is observed
    /// empty, including work queued after the call. Requires at least one
    /// other thread to be driving the loop.
    ///
    /// # Errors
    ///
    /// Synchronous scheduling failure only.
    pub fn join(&self, drain_all: bool) -> EventResult {
        let flag = Arc::new(EventFlag::new());
        self.post_join_marker(Arc::clone(&flag), drain_all)?;
        flag.wait();
        Ok(())
    }

    /// The self-requeuing synchronization marker behind `join`: signals once
    /// processed, unless it must keep chasing a non-empty queue.
    fn post_join_marker(&self, flag: Arc<EventFlag>, drain_all: bool) -> EventResult {
        self.post(move |el| {
            if drain_all && !el.shared.work.is_empty() {
                el.post_join_marker(flag, true)
            } else {
                flag.set();
                Ok(())
            }
        })
    }

    /// Stops the loop and joins every managed worker.
    ///
    /// Sets the loop stopping, wakes all parked threads, joins workers
    /// spawned by [`run`](EventLoop::run) in spawn order, then waits for any
    /// externally driven [`drive`](EventLoop::drive) calls to unwind before
    /// returning to the idle state. Idempotent, and safe to call
    /// concurrently; a mutex serializes concurrent stops.
    ///
    /// Pending work left in the queues is dropped uninvoked only at loop
    /// teardown, not by `stop`; a restarted loop resumes the remaining work.
    ///
    /// # Deadlocks
    ///
    /// Must not be called from a managed worker thread: joining the calling
    /// thread would never return.
    pub fn stop(&self) {
        let _guard = self.shared.stop_guard.lock();
        let s = &*self.shared;
        s.stopping.store(true, Ordering::Release);
        s.running.store(false, Ordering::Release);
        s.flag.set();

        let workers: Vec<JoinHandle<()>> = s.managed.lock().drain(..).collect();
        let worker_count = workers.len();
        for worker in workers {
            s.flag.set();
            if worker.join().is_err() {
                warn!("managed loop thread panicked during shutdown");
            }
        }

        // Externally driven loops unwind on their own; keep nudging until
        // every one has reported out.
        while s.threads.load(Ordering::Acquire) > 0 {
            s.flag.set();
            s.loop_ended.wait_timeout(STOP_POLL);
        }

        s.stopping.store(false, Ordering::Release);
        if worker_count > 0 {
            info!(worker_count = worker_count, "event loop stopped");
        }
    }

    /// Drops all pending immediate work and timers without invoking them.
    ///
    /// Not meant to race concurrent schedulers: callers should quiesce
    /// posting threads first.
    pub fn clear(&self) {
        let s = &*self.shared;
        s.work.clear();
        s.timers.clear();
        s.queue_items.store(0, Ordering::Release);
    }

    /// Number of threads currently driving this loop.
    #[must_use]
    pub fn threads(&self) -> usize {
        self.shared.threads.load(Ordering::Acquire)
    }

    /// Snapshot of the loop's utilization counters.
    #[must_use]
    pub fn stats(&self) -> LoopStats {
        let s = &*self.shared;
        LoopStats {
            threads: s.threads.load(Ordering::Acquire),
            threads_waiting: s.threads_waiting.load(Ordering::Acquire),
            queued_items: s.queue_items.load(Ordering::Acquire),
            pending_timers: s.timers.len(),
        }
    }
}

fn code_of(result: EventResult) -> i32 {
    match result {
        Ok(()) => CODE_OK,
        Err(e) => e.code(),
    }
}

/// A panicking callback must not unwind through the engine: it would skip
/// the loop's thread accounting and wedge `stop`. The panic is reported as
/// a generic failure like any other callback error.
fn contain_unwind(f: impl FnOnce() -> EventResult) -> EventResult {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|_| {
        warn!("scheduled callback panicked");
        Err(LoopError::Generic)
    })
}


#[cfg(test)]
impl EventLoop {
    /// Test helper: asks the loop to wind down from inside a callback
    /// without joining (which `stop` would attempt).
    fn stop_flag_for_test(&self) {
        self.shared.running.store(false, Ordering::Release);
        self.shared.flag.set();
    }
}
