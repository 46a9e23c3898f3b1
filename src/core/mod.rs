//! Core scheduling engine: functors, error channel, queues, and the loop.

pub mod error;
pub mod event_loop;
pub mod exception;
pub mod functor;
pub(crate) mod queue;

pub use error::{AppResult, EventResult, LoopError, CODE_GENERIC, CODE_NOMEM, CODE_OK};
pub use event_loop::{EventLoop, LoopStats};
pub use exception::ExceptionHandle;
pub use functor::{Functor, FunctorView, IntervalFunctor, RawCallback};
