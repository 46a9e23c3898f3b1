//! Configuration models for the event loop and its worker pool.

pub mod runtime;

pub use runtime::LoopConfig;
