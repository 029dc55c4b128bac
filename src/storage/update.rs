//! The three-way outcome of one `guaranteed_update` attempt.
//!
//! Soft failures (a lost race, a precondition mismatch, a caller error from
//! `try_update`) become `Retry` and feed the bounded loop; hard failures
//! (I/O, codec) abort immediately. Keeping the classification explicit makes
//! the attempt-exhaustion path a single branch instead of control flow
//! threaded through the loop body.

use crate::Document;
use crate::StorageError;

pub(crate) enum Attempt {
    /// Worth another read-modify-write cycle; carries the cause so
    /// exhaustion can report what kept failing.
    Retry(StorageError),
    /// Not retryable; returned to the caller as-is.
    Fail(StorageError),
    /// Committed (or short-circuited as a no-op).
    Success(Document),
}
