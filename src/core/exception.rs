//! Error capture cell for crossing thread and module boundaries.
//!
//! Native unwinding cannot safely cross a dynamically loaded component
//! boundary, and a panic on a worker thread is invisible to the thread that
//! scheduled the work. An [`ExceptionHandle`] ferries a failure across such
//! a boundary as a plain value: the raising side stores it with
//! [`capture`](ExceptionHandle::capture), the reporting side inspects it with
//! [`raised`](ExceptionHandle::raised) and either
//! [`rethrow`](ExceptionHandle::rethrow)s or
//! [`discard`](ExceptionHandle::discard)s it.

use tracing::error;

use crate::core::error::{EventResult, LoopError, CODE_OK};

/// A single-slot error cell: empty, or holding exactly one captured error.
///
/// Capturing into a non-empty handle is a programming error; the handle
/// never silently drops a failure by overwriting it.
#[derive(Debug, Default)]
pub struct ExceptionHandle {
    slot: Option<LoopError>,
}

impl ExceptionHandle {
    /// Creates an empty handle.
    #[must_use]
    pub const fn new() -> Self {
        Self { slot: None }
    }

    /// Runs `f`, storing any error it raises into the slot.
    ///
    /// Returns the success value, or `None` when an error was captured.
    ///
    /// # Panics
    ///
    /// Panics if the slot is already occupied.
    pub fn capture<T>(&mut self, f: impl FnOnce() -> Result<T, LoopError>) -> Option<T> {
        assert!(
            self.slot.is_none(),
            "capture into a non-empty exception handle"
        );
        match f() {
            Ok(value) => Some(value),
            Err(e) => {
                self.slot = Some(e);
                None
            }
        }
    }

    /// Whether an error is currently captured. Non-destructive.
    #[must_use]
    pub const fn raised(&self) -> bool {
        self.slot.is_some()
    }

    /// Re-raises the captured error as a `Result`, emptying the slot.
    ///
    /// # Errors
    ///
    /// Returns the captured error, if any.
    pub fn rethrow(&mut self) -> EventResult {
        match self.slot.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Empties the slot without propagating the error.
    pub fn discard(&mut self) {
        self.slot = None;
    }

    /// Removes and returns the captured error, if any.
    pub fn take(&mut self) -> Option<LoopError> {
        self.slot.take()
    }

    /// The integer code of the captured error, or [`CODE_OK`] when empty.
    #[must_use]
    pub fn code(&self) -> i32 {
        self.slot.as_ref().map_or(CODE_OK, LoopError::code)
    }
}

/// Terminates the process: a failure was raised while an earlier failure was
/// already being reported, and there is no safe way to propagate a second
/// error once the first is in flight.
pub(crate) fn fatal(context: &str) -> ! {
    error!(context = context, "unrecoverable double failure, aborting");
    std::process::abort();
}
