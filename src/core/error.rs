//! Error types for event loop operations.

use thiserror::Error;

/// Code returned by a raw callback on success.
pub const CODE_OK: i32 = 0;
/// Code for allocation exhaustion, mirroring `ENOMEM`.
pub const CODE_NOMEM: i32 = 12;
/// Catch-all code for failures with no more specific classification.
pub const CODE_GENERIC: i32 = 131;

/// Errors surfaced by scheduled work and the engine itself.
///
/// Every variant maps to a stable integer code so that failures can cross a
/// raw function-pointer boundary without carrying a live error object; see
/// [`LoopError::code`] and [`LoopError::from_code`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoopError {
    /// Memory allocation was exhausted while scheduling or running work.
    #[error("allocation failure")]
    AllocationFailure,
    /// A failure with no more specific classification.
    #[error("generic failure")]
    Generic,
    /// A nonzero code raised by user work; carried through unchanged.
    #[error("user error code {0}")]
    UserRaised(i32),
}

impl LoopError {
    /// The integer code for this error, suitable for returning across a raw
    /// calling-convention boundary.
    #[must_use]
    pub const fn code(&self) -> i32 {
        match self {
            Self::AllocationFailure => CODE_NOMEM,
            Self::Generic => CODE_GENERIC,
            Self::UserRaised(code) => *code,
        }
    }

    /// Reconstructs an error from a raw code. Returns `None` for [`CODE_OK`].
    ///
    /// Round-trips exactly: `LoopError::from_code(e.code()) == Some(e)` for
    /// every error whose user code is not itself one of the reserved codes.
    #[must_use]
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            CODE_OK => None,
            CODE_NOMEM => Some(Self::AllocationFailure),
            CODE_GENERIC => Some(Self::Generic),
            other => Some(Self::UserRaised(other)),
        }
    }
}

/// Result of invoking a unit of scheduled work.
pub type EventResult = Result<(), LoopError>;

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
