//! Type-erased callable values.
//!
//! A [`Functor`] is "a callable plus its captured state" that can be stored,
//! moved between threads, and invoked by code that never names the concrete
//! closure type. Ownership is explicit: a `Functor` owns its capture and is
//! invoked at most once, while a [`FunctorView`] can additionally borrow a
//! caller-owned callable that must be invoked in place.
//!
//! Two construction paths exist, producing identical scheduling behavior:
//!
//! - native closures, for in-process callers ([`Functor::new`]);
//! - a plain function pointer plus a flat byte buffer of captured state, for
//!   callers that cannot pass closures across a boundary
//!   ([`Functor::from_raw`]). This path always works but costs one extra
//!   allocation and copy.

use std::fmt;

use crate::core::error::{EventResult, LoopError};
use crate::core::event_loop::EventLoop;

/// Signature for raw-convention callbacks: a plain function pointer invoked
/// with its copied capture buffer. Failure is reported purely as an integer
/// code ([`CODE_OK`](crate::CODE_OK) for success).
pub type RawCallback = fn(&mut [u8], &EventLoop) -> i32;

// The one translation point for raw return codes; every raw construction
// path funnels through here so the same code always yields the same error.
fn raw_result(code: i32) -> EventResult {
    LoopError::from_code(code).map_or(Ok(()), Err)
}

/// An owned, type-erased callable.
///
/// Invoked at most once; the captured state is released exactly once, either
/// by the invocation or by dropping the functor uninvoked (for example when
/// a queue is torn down before draining).
pub struct Functor {
    call: Box<dyn FnOnce(&EventLoop) -> EventResult + Send>,
}

impl Functor {
    /// Wraps a closure into an owned functor.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(&EventLoop) -> EventResult + Send + 'static,
    {
        Self { call: Box::new(f) }
    }

    /// Builds a functor from a raw function pointer and a flat capture
    /// buffer.
    ///
    /// The buffer is copied into internally owned storage. On invocation the
    /// callback's return code is translated via [`LoopError::from_code`]:
    /// [`CODE_OK`](crate::CODE_OK) means success, the reserved codes map to
    /// their error kinds, and any other nonzero code is carried through as
    /// [`LoopError::UserRaised`].
    #[must_use]
    pub fn from_raw(callback: RawCallback, capture: &[u8]) -> Self {
        let mut buffer = capture.to_vec();
        Self::new(move |el| raw_result(callback(&mut buffer, el)))
    }

    /// Invokes the functor, consuming it.
    ///
    /// # Errors
    ///
    /// Propagates whatever the underlying callable raised.
    pub fn invoke(self, el: &EventLoop) -> EventResult {
        (self.call)(el)
    }
}

impl fmt::Debug for Functor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Functor")
    }
}

/// An owned, type-erased callable that may be invoked repeatedly.
///
/// The repeating counterpart of [`Functor`], used for interval timer
/// entries: the engine re-invokes it on every firing until the entry is
/// cancelled, so the callable is `FnMut` and keeps its captured state
/// between firings.
pub struct IntervalFunctor {
    call: Box<dyn FnMut(&EventLoop) -> EventResult + Send>,
}

impl IntervalFunctor {
    /// Wraps a closure into an owned repeating functor.
    pub fn new<F>(f: F) -> Self
    where
        F: FnMut(&EventLoop) -> EventResult + Send + 'static,
    {
        Self { call: Box::new(f) }
    }

    /// Builds a repeating functor from a raw function pointer and a flat
    /// capture buffer.
    ///
    /// The buffer is copied once and handed to the callback on every
    /// firing; return codes are translated exactly as in
    /// [`Functor::from_raw`].
    #[must_use]
    pub fn from_raw(callback: RawCallback, capture: &[u8]) -> Self {
        let mut buffer = capture.to_vec();
        Self::new(move |el| raw_result(callback(&mut buffer, el)))
    }

    /// Invokes the functor. May be called again on the same value.
    ///
    /// # Errors
    ///
    /// Propagates whatever the underlying callable raised.
    pub fn invoke(&mut self, el: &EventLoop) -> EventResult {
        (self.call)(el)
    }

    pub(crate) fn into_callback(self) -> Box<dyn FnMut(&EventLoop) -> EventResult + Send> {
        self.call
    }
}

impl fmt::Debug for IntervalFunctor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("IntervalFunctor")
    }
}

/// A callable with explicit ownership: either an owned [`Functor`] that may
/// be relocated into a queue for later execution, or a borrowed reference to
/// caller-owned state that is only valid for the duration of the call.
pub enum FunctorView<'a> {
    /// Owns its capture; movable into owned storage by the receiver.
    Owned(Functor),
    /// Borrows caller-owned state; must be invoked in place before the
    /// borrow ends.
    Borrowed(&'a mut (dyn FnMut(&EventLoop) -> EventResult + Send)),
}

impl<'a> FunctorView<'a> {
    /// Wraps a closure into an owned, movable view.
    pub fn owned<F>(f: F) -> Self
    where
        F: FnOnce(&EventLoop) -> EventResult + Send + 'static,
    {
        Self::Owned(Functor::new(f))
    }

    /// Borrows a caller-owned callable as a non-movable view.
    pub fn borrowed(f: &'a mut (dyn FnMut(&EventLoop) -> EventResult + Send)) -> Self {
        Self::Borrowed(f)
    }

    /// Whether the receiver may relocate this view into owned storage, e.g.
    /// when queueing it for later execution.
    #[must_use]
    pub const fn movable(&self) -> bool {
        matches!(self, Self::Owned(_))
    }

    /// Invokes the view, consuming it.
    ///
    /// # Errors
    ///
    /// Propagates whatever the underlying callable raised.
    pub fn invoke(self, el: &EventLoop) -> EventResult {
        match self {
            Self::Owned(functor) => functor.invoke(el),
            Self::Borrowed(f) => f(el),
        }
    }

    /// Extracts the owned functor, or hands the view back when it is a
    /// borrow and must be invoked in place.
    ///
    /// # Errors
    ///
    /// Returns `Err(self)` for non-movable views.
    pub fn into_functor(self) -> Result<Functor, Self> {
        match self {
            Self::Owned(functor) => Ok(functor),
            view @ Self::Borrowed(_) => Err(view),
        }
    }
}

impl From<Functor> for FunctorView<'_> {
    fn from(functor: Functor) -> Self {
        Self::Owned(functor)
    }
}

impl fmt::Debug for FunctorView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Owned(_) => f.write_str("FunctorView::Owned"),
            Self::Borrowed(_) => f.write_str("FunctorView::Borrowed"),
        }
    }
}
