//! # Prometheus Event Loop
//!
//! A shared, thread-safe event-loop and work-scheduling runtime for the
//! Prometheus AI Platform.
//!
//! This library provides a scheduling engine that accepts type-erased units
//! of work ("functors") and executes them immediately, after a delay, or
//! repeatedly, driven by one or many worker threads concurrently. It also
//! provides a module-boundary-safe error channel, because native unwinding
//! cannot safely cross a dynamically loaded component boundary.
//!
//! ## Core Problem Solved
//!
//! Long-lived platform processes need one place to funnel deferred work:
//!
//! - **Mixed producers**: any thread, including scheduled callbacks, can
//!   post work concurrently with running loops
//! - **Timers without a reactor**: one-shot and repeating timers ride the
//!   same engine, with millisecond-granularity best-effort precision
//! - **Boundary-safe failures**: errors raised on a worker thread are
//!   captured as values and re-raised (or deliberately discarded) on
//!   another thread, never unwound across a component boundary
//! - **Elastic driving**: loops can be driven by managed workers, by the
//!   caller's own threads, or both at once
//!
//! ## Key Features
//!
//! - **Type-erased callables**: owned [`Functor`]s, borrowed
//!   [`FunctorView`]s, and a raw function-pointer + byte-buffer adapter for
//!   callers that cannot pass closures
//! - **Four scheduling entry points**: `post` (fire-and-forget), `invoke`
//!   (blocking), `timeout` (fire once after a delay), `interval` (fire
//!   repeatedly until cancelled)
//! - **Thread-pool lifecycle**: `run`/`run_pool` spawn managed workers with
//!   an error-handler callback; `stop` shuts down with correct ordering
//! - **Error channel**: [`ExceptionHandle`] captures, transports, and
//!   re-raises failures across thread and module boundaries
//!
//! ## Example
//!
//! ```rust
//! use prometheus_event_loop::{EventLoop, LoopConfig};
//! use std::time::Duration;
//!
//! let el = EventLoop::with_config(LoopConfig::new().with_worker_count(2));
//! el.run_pool(|err| eprintln!("loop error: {err}"));
//!
//! el.post(|_| {
//!     println!("immediate work");
//!     Ok(())
//! })
//! .unwrap();
//!
//! el.timeout(
//!     |_| {
//!         println!("fired once after 10ms");
//!         Ok(())
//!     },
//!     Duration::from_millis(10),
//! )
//! .unwrap();
//!
//! el.join(true).unwrap();
//! el.stop();
//! ```
//!
//! For complete examples, see `tests/event_loop_test.rs`.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling engine: functors, error channel, queues, and the loop.
pub mod core;
/// Configuration models for the event loop and its worker pool.
pub mod config;
/// Event flag wait/signal primitive.
pub mod event_flag;
/// Shared utilities.
pub mod util;

pub use crate::config::LoopConfig;
pub use crate::core::{
    AppResult, EventLoop, EventResult, ExceptionHandle, Functor, FunctorView, IntervalFunctor,
    LoopError, LoopStats, RawCallback, CODE_GENERIC, CODE_NOMEM, CODE_OK,
};
pub use crate::event_flag::EventFlag;
