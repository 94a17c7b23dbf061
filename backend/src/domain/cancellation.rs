//! Cancellation signatures and the normalisation applied to them.
//!
//! Cancellation reaches handlers in several shapes: the context's own signal,
//! a driver error raised when the database aborts a statement, or the text of
//! a status returned by an RPC peer. Type information is often lost on the
//! way, so recognition is an exact match on the failure text.

use super::error::{ErrorCode, ErrorKind, HandledError};

/// Text of a cancelled execution context, as rendered by peers and by
/// [`Cause::Cancelled`](super::Cause::Cancelled).
pub const CONTEXT_CANCELED: &str = "context canceled";

/// PostgreSQL's message for a statement cancelled on the client's behalf.
pub const STATEMENT_CANCELED: &str = "canceling statement due to user request";

/// The same message as surfaced by `lib/pq`-style drivers.
pub const PQ_STATEMENT_CANCELED: &str = "pq: canceling statement due to user request";

/// Every text treated as a cancellation.
pub const CANCELLATION_SIGNATURES: [&str; 3] =
    [PQ_STATEMENT_CANCELED, STATEMENT_CANCELED, CONTEXT_CANCELED];

/// Whether `text` is exactly one of [`CANCELLATION_SIGNATURES`].
///
/// # Examples
/// ```
/// use disbursement::domain::cancellation::is_cancellation_signature;
///
/// assert!(is_cancellation_signature("context canceled"));
/// assert!(!is_cancellation_signature("context canceled: timeout"));
/// ```
#[must_use]
pub fn is_cancellation_signature(text: &str) -> bool {
    CANCELLATION_SIGNATURES.contains(&text)
}

/// Replace `error` with a [`ErrorKind::ContextCancelled`] error when its
/// innermost failure text is a cancellation signature.
///
/// Synthetic errors without a cause are matched on their own message. Errors
/// already of kind `ContextCancelled` and non-matching errors pass through
/// unchanged.
#[must_use]
pub fn normalize_cancellation(error: HandledError) -> HandledError {
    if error.kind() == ErrorKind::ContextCancelled {
        return error;
    }
    let text = error
        .original_text()
        .unwrap_or_else(|| error.message().to_owned());
    if !is_cancellation_signature(&text) {
        return error;
    }
    HandledError::context_cancelled(error, text, ErrorCode::CANCELLED)
}
