//! Integration tests for the cross-boundary error channel.
//!
//! These exercise the public capture/rethrow/discard surface and the
//! round-trip between error kinds and raw integer codes, including carrying
//! a captured failure across a thread boundary.

use prometheus_event_loop::{
    ExceptionHandle, LoopError, CODE_GENERIC, CODE_NOMEM, CODE_OK,
};
use std::thread;

#[test]
fn test_capture_rethrow_reproduces_code_exactly() {
    for err in [
        LoopError::AllocationFailure,
        LoopError::Generic,
        LoopError::UserRaised(17),
    ] {
        let mut handle = ExceptionHandle::new();
        let expected_code = err.code();
        let err2 = err.clone();
        let _: Option<()> = handle.capture(move || Err(err2));

        assert!(handle.raised());
        assert_eq!(handle.code(), expected_code);
        assert_eq!(handle.rethrow(), Err(err));
        assert_eq!(handle.code(), CODE_OK);
    }
}

#[test]
fn test_handle_ferries_error_across_threads() {
    let raiser = thread::spawn(|| {
        let mut handle = ExceptionHandle::new();
        let _: Option<()> = handle.capture(|| Err(LoopError::AllocationFailure));
        handle
    });

    // The handle is a plain value; the receiving thread decides whether to
    // rethrow or discard
    let mut handle = raiser.join().unwrap();
    assert!(handle.raised());
    assert_eq!(handle.rethrow(), Err(LoopError::AllocationFailure));
}

#[test]
fn test_discard_swallows_deliberately() {
    let mut handle = ExceptionHandle::new();
    let _: Option<()> = handle.capture(|| Err(LoopError::UserRaised(5)));
    handle.discard();
    assert!(!handle.raised());
    assert_eq!(handle.rethrow(), Ok(()));
    // The slot is reusable after a discard
    let _: Option<()> = handle.capture(|| Err(LoopError::Generic));
    assert_eq!(handle.code(), CODE_GENERIC);
}

#[test]
fn test_capture_passes_success_values_through() {
    let mut handle = ExceptionHandle::new();
    assert_eq!(handle.capture(|| Ok("payload")), Some("payload"));
    assert!(!handle.raised());
}

#[test]
fn test_code_taxonomy_is_stable() {
    assert_eq!(LoopError::AllocationFailure.code(), CODE_NOMEM);
    assert_eq!(LoopError::Generic.code(), CODE_GENERIC);
    assert_eq!(LoopError::UserRaised(77).code(), 77);

    assert_eq!(LoopError::from_code(CODE_OK), None);
    assert_eq!(
        LoopError::from_code(CODE_NOMEM),
        Some(LoopError::AllocationFailure)
    );
    assert_eq!(LoopError::from_code(CODE_GENERIC), Some(LoopError::Generic));
    assert_eq!(LoopError::from_code(77), Some(LoopError::UserRaised(77)));
}
