//! Classified errors shared by every transport.
//!
//! Every failure that leaves a handler is a [`HandledError`]: a closed
//! [`ErrorKind`], a stable [`ErrorCode`], a human message, an optional
//! underlying [`Cause`], optional field-level sub-errors and the frames
//! recorded each time the error crossed a function boundary.
//!
//! These errors are transport agnostic. Inbound adapters map the kind to an
//! HTTP status or an RPC code and decide which message is safe to expose.

use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::cancellation::{CONTEXT_CANCELED, is_cancellation_signature};
use super::ports::StoreError;

/// Closed set of failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// Unclassified or internal failure.
    Unknown,
    /// The store failed to begin, run, commit or roll back work.
    Database,
    /// Authentication failed or is missing.
    Authorization,
    /// The request is malformed.
    IncorrectInput,
    /// The request is well formed but fails business validation.
    UnprocessableEntity,
    /// The requested resource does not exist.
    NotFound,
    /// Authenticated but not permitted.
    Forbidden,
    /// The caller gave up before the operation finished.
    ContextCancelled,
}

impl ErrorKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::Unknown,
        Self::Database,
        Self::Authorization,
        Self::IncorrectInput,
        Self::UnprocessableEntity,
        Self::NotFound,
        Self::Forbidden,
        Self::ContextCancelled,
    ];

    /// Whether the message of this kind may be shown to the caller verbatim.
    ///
    /// Client-facing failures are logged as warnings; the rest as errors.
    #[must_use]
    pub const fn is_client_facing(self) -> bool {
        !matches!(self, Self::Unknown | Self::Database)
    }

    /// Stable lowercase token, as used in logs and serialised payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Database => "database",
            Self::Authorization => "authorization",
            Self::IncorrectInput => "incorrect-input",
            Self::UnprocessableEntity => "unprocessable-entity",
            Self::NotFound => "not-found",
            Self::Forbidden => "forbidden",
            Self::ContextCancelled => "context-cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable machine-readable error token returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ErrorCode(Cow<'static, str>);

impl ErrorCode {
    /// Generic code for failures the caller cannot act upon.
    pub const INTERNAL_ERROR: Self = Self(Cow::Borrowed("INTERNAL_ERROR"));
    /// The request could not be read or failed validation.
    pub const INVALID_REQUEST: Self = Self(Cow::Borrowed("INVALID_REQUEST"));
    /// The caller cancelled the request.
    pub const CANCELLED: Self = Self(Cow::Borrowed("CANCELLED"));
    /// The caller is not authenticated.
    pub const UNAUTHORIZED: Self = Self(Cow::Borrowed("UNAUTHORIZED"));
    /// The caller is not allowed to perform the operation.
    pub const FORBIDDEN: Self = Self(Cow::Borrowed("FORBIDDEN"));
    /// The requested resource does not exist.
    pub const NOT_FOUND: Self = Self(Cow::Borrowed("NOT_FOUND"));

    /// Build a service-specific code.
    pub fn new(code: impl Into<Cow<'static, str>>) -> Self {
        Self(code.into())
    }

    /// Default code for errors reconstructed without one, such as errors
    /// received over an RPC boundary.
    #[must_use]
    pub fn for_kind(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Unknown | ErrorKind::Database => Self::INTERNAL_ERROR,
            ErrorKind::Authorization => Self::UNAUTHORIZED,
            ErrorKind::IncorrectInput | ErrorKind::UnprocessableEntity => Self::INVALID_REQUEST,
            ErrorKind::NotFound => Self::NOT_FOUND,
            ErrorKind::Forbidden => Self::FORBIDDEN,
            ErrorKind::ContextCancelled => Self::CANCELLED,
        }
    }

    /// Borrow the token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Field-level sub-error attached to validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Input field the message refers to.
    pub field: String,
    /// Human-readable reason.
    pub message: String,
}

impl ErrorInfo {
    /// Build a sub-error for `field`.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Source location recorded when an error is created or rewrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    /// Source file.
    pub file: &'static str,
    /// Line number.
    pub line: u32,
    /// Column number.
    pub column: u32,
}

impl From<&'static Location<'static>> for Frame {
    fn from(location: &'static Location<'static>) -> Self {
        Self {
            file: location.file(),
            line: location.line(),
            column: location.column(),
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Status received from a remote RPC peer.
///
/// Type information does not survive the wire; only the status code (already
/// mapped to a kind by the RPC adapter) and the message text do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStatus {
    /// Name of the wire status code, e.g. `Cancelled`.
    pub code: String,
    /// Kind derived from the wire status code.
    pub kind: ErrorKind,
    /// Status message, i.e. the peer's original error text.
    pub message: String,
}

impl fmt::Display for RemoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rpc error: code = {} desc = {}", self.code, self.message)
    }
}

/// Underlying failure wrapped by a [`HandledError`].
#[derive(Debug, Clone)]
pub enum Cause {
    /// An already classified error.
    Handled(Box<HandledError>),
    /// A raw store failure.
    Store(StoreError),
    /// A status returned by a remote RPC peer.
    Remote(RemoteStatus),
    /// The execution context was cancelled.
    Cancelled,
    /// A panic caught at a recovery boundary.
    Panic(String),
    /// A synthetic failure described only by text.
    Message(String),
    /// Any other error.
    Other(Arc<dyn StdError + Send + Sync>),
}

impl Cause {
    /// Wrap an arbitrary error.
    pub fn other<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Other(Arc::new(error))
    }

    /// Wrap a plain message.
    pub fn message(text: impl Into<String>) -> Self {
        Self::Message(text.into())
    }

    /// Text of the innermost failure in the chain.
    ///
    /// Remote statuses yield the peer's message rather than the wrapped
    /// `rpc error: ...` rendering.
    #[must_use]
    pub fn original_text(&self) -> String {
        match self {
            Self::Handled(inner) => inner
                .original_text()
                .unwrap_or_else(|| inner.message().to_owned()),
            Self::Remote(status) => status.message.clone(),
            Self::Other(error) => {
                let mut current: &(dyn StdError + 'static) = error.as_ref();
                while let Some(next) = current.source() {
                    current = next;
                }
                current.to_string()
            }
            Self::Store(_) | Self::Cancelled | Self::Panic(_) | Self::Message(_) => {
                self.to_string()
            }
        }
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handled(inner) => fmt::Display::fmt(inner, f),
            Self::Store(error) => fmt::Display::fmt(error, f),
            Self::Remote(status) => fmt::Display::fmt(status, f),
            Self::Cancelled => f.write_str(CONTEXT_CANCELED),
            Self::Panic(payload) => write!(f, "panic: {payload}"),
            Self::Message(text) => f.write_str(text),
            Self::Other(error) => fmt::Display::fmt(error, f),
        }
    }
}

impl StdError for Cause {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Handled(inner) => Some(inner.as_ref()),
            Self::Store(error) => Some(error),
            Self::Other(error) => Some(error.as_ref()),
            Self::Remote(_) | Self::Cancelled | Self::Panic(_) | Self::Message(_) => None,
        }
    }
}

impl From<HandledError> for Cause {
    fn from(value: HandledError) -> Self {
        Self::Handled(Box::new(value))
    }
}

impl From<StoreError> for Cause {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<RemoteStatus> for Cause {
    fn from(value: RemoteStatus) -> Self {
        Self::Remote(value)
    }
}

/// Classified error crossing handler boundaries.
///
/// ## Invariants
/// - Never mutated after creation; [`HandledError::rewrap`] returns a copy
///   with one more frame.
/// - `stack_trace` holds at least one frame.
///
/// # Examples
/// ```
/// use disbursement::domain::{ErrorCode, ErrorKind, HandledError};
///
/// let err = HandledError::not_found(
///     disbursement::domain::Cause::message("no row"),
///     "disbursement not found",
///     ErrorCode::NOT_FOUND,
/// );
/// assert_eq!(err.kind(), ErrorKind::NotFound);
/// assert!(err.is_client_facing());
/// ```
#[derive(Debug, Clone)]
pub struct HandledError {
    kind: ErrorKind,
    code: ErrorCode,
    message: String,
    cause: Option<Box<Cause>>,
    details: Vec<ErrorInfo>,
    trace: Vec<Frame>,
}

impl HandledError {
    #[track_caller]
    fn build(kind: ErrorKind, cause: Option<Cause>, message: String, code: ErrorCode) -> Self {
        // An already classified cause carries its own trace; keep it.
        let trace = match &cause {
            Some(Cause::Handled(inner)) => inner.trace.clone(),
            _ => vec![Frame::from(Location::caller())],
        };
        Self {
            kind,
            code,
            message,
            cause: cause.map(Box::new),
            details: Vec::new(),
            trace,
        }
    }

    /// Synthetic error of `kind` with no underlying cause.
    #[track_caller]
    pub fn new(kind: ErrorKind, message: impl Into<String>, code: ErrorCode) -> Self {
        Self::build(kind, None, message.into(), code)
    }

    /// Error of an explicit `kind` wrapping `cause`.
    #[track_caller]
    pub fn with_kind(
        kind: ErrorKind,
        cause: impl Into<Cause>,
        message: impl Into<String>,
        code: ErrorCode,
    ) -> Self {
        Self::build(kind, Some(cause.into()), message.into(), code)
    }

    /// Classify `cause` as [`ErrorKind::Unknown`].
    #[track_caller]
    pub fn classify(cause: impl Into<Cause>, message: impl Into<String>, code: ErrorCode) -> Self {
        Self::with_kind(ErrorKind::Unknown, cause, message, code)
    }

    /// Classify `cause` as [`ErrorKind::Database`].
    #[track_caller]
    pub fn database(cause: impl Into<Cause>, message: impl Into<String>, code: ErrorCode) -> Self {
        Self::with_kind(ErrorKind::Database, cause, message, code)
    }

    /// Classify `cause` as [`ErrorKind::Authorization`].
    #[track_caller]
    pub fn authorization(
        cause: impl Into<Cause>,
        message: impl Into<String>,
        code: ErrorCode,
    ) -> Self {
        Self::with_kind(ErrorKind::Authorization, cause, message, code)
    }

    /// Classify `cause` as [`ErrorKind::IncorrectInput`].
    #[track_caller]
    pub fn incorrect_input(
        cause: impl Into<Cause>,
        message: impl Into<String>,
        code: ErrorCode,
    ) -> Self {
        Self::with_kind(ErrorKind::IncorrectInput, cause, message, code)
    }

    /// Classify `cause` as [`ErrorKind::UnprocessableEntity`] with field
    /// sub-errors.
    #[track_caller]
    pub fn unprocessable_entity(
        cause: impl Into<Cause>,
        message: impl Into<String>,
        code: ErrorCode,
        details: Vec<ErrorInfo>,
    ) -> Self {
        Self::with_kind(ErrorKind::UnprocessableEntity, cause, message, code).with_details(details)
    }

    /// Classify `cause` as [`ErrorKind::NotFound`].
    #[track_caller]
    pub fn not_found(cause: impl Into<Cause>, message: impl Into<String>, code: ErrorCode) -> Self {
        Self::with_kind(ErrorKind::NotFound, cause, message, code)
    }

    /// Classify `cause` as [`ErrorKind::Forbidden`].
    #[track_caller]
    pub fn forbidden(cause: impl Into<Cause>, message: impl Into<String>, code: ErrorCode) -> Self {
        Self::with_kind(ErrorKind::Forbidden, cause, message, code)
    }

    /// Classify `cause` as [`ErrorKind::ContextCancelled`].
    #[track_caller]
    pub fn context_cancelled(
        cause: impl Into<Cause>,
        message: impl Into<String>,
        code: ErrorCode,
    ) -> Self {
        Self::with_kind(ErrorKind::ContextCancelled, cause, message, code)
    }

    /// Attach field-level sub-errors.
    #[must_use]
    pub fn with_details(mut self, details: Vec<ErrorInfo>) -> Self {
        self.details = details;
        self
    }

    /// Copy of this error with the caller's location appended to the trace.
    #[must_use]
    #[track_caller]
    pub fn rewrap(mut self) -> Self {
        self.trace.push(Frame::from(Location::caller()));
        self
    }

    /// Failure category.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Machine-readable code.
    #[must_use]
    pub fn code(&self) -> &ErrorCode {
        &self.code
    }

    /// Human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Underlying cause, absent for synthetic errors.
    #[must_use]
    pub fn cause(&self) -> Option<&Cause> {
        self.cause.as_deref()
    }

    /// Field-level sub-errors.
    #[must_use]
    pub fn details(&self) -> &[ErrorInfo] {
        &self.details
    }

    /// Frames recorded at creation and at each rewrap, oldest first.
    #[must_use]
    pub fn stack_trace(&self) -> &[Frame] {
        &self.trace
    }

    /// See [`ErrorKind::is_client_facing`].
    #[must_use]
    pub fn is_client_facing(&self) -> bool {
        self.kind.is_client_facing()
    }

    /// Text of the innermost underlying failure, if there is one.
    #[must_use]
    pub fn original_text(&self) -> Option<String> {
        self.cause().map(Cause::original_text)
    }
}

impl fmt::Display for HandledError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for HandledError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause.as_deref().map(|cause| cause as &(dyn StdError + 'static))
    }
}

impl From<StoreError> for HandledError {
    #[track_caller]
    fn from(value: StoreError) -> Self {
        let message = value.to_string();
        Self::database(value, message, ErrorCode::INTERNAL_ERROR)
    }
}

/// Rewrap `error` so it carries one more frame without losing its
/// classification.
///
/// Errors that are not (and do not contain) a [`HandledError`] are classified
/// as [`ErrorKind::Unknown`] with the original error as cause.
#[track_caller]
pub fn rewrap_preserving_trace(error: impl Into<Cause>) -> HandledError {
    let cause = error.into();
    if let Some(handled) = find_in_cause(&cause) {
        return handled.clone().rewrap();
    }
    let message = cause.to_string();
    HandledError::classify(cause, message, ErrorCode::INTERNAL_ERROR)
}

/// Find the first [`HandledError`] in `error`'s chain.
///
/// Remote statuses are reconstructed from their mapped kind and message; a
/// message equal to a cancellation signature yields
/// [`ErrorKind::ContextCancelled`] even though the peer's type was lost.
#[must_use]
pub fn extract_handled_error(error: &Cause) -> Option<HandledError> {
    match error {
        Cause::Remote(status) => Some(reconstruct_remote(status)),
        other => find_in_cause(other).cloned(),
    }
}

/// Whether `error` classifies as client facing. Unclassified errors are not.
#[must_use]
pub fn is_client_facing(error: &Cause) -> bool {
    extract_handled_error(error).is_some_and(|handled| handled.is_client_facing())
}

fn find_in_cause(cause: &Cause) -> Option<&HandledError> {
    match cause {
        Cause::Handled(inner) => Some(inner.as_ref()),
        Cause::Other(error) => find_in_chain(error.as_ref()),
        Cause::Store(_) | Cause::Remote(_) | Cause::Cancelled | Cause::Panic(_) | Cause::Message(_) => {
            None
        }
    }
}

fn find_in_chain<'a>(error: &'a (dyn StdError + 'static)) -> Option<&'a HandledError> {
    if let Some(handled) = error.downcast_ref::<HandledError>() {
        return Some(handled);
    }
    if let Some(cause) = error.downcast_ref::<Cause>() {
        return find_in_cause(cause);
    }
    error.source().and_then(find_in_chain)
}

#[track_caller]
fn reconstruct_remote(status: &RemoteStatus) -> HandledError {
    let kind = if is_cancellation_signature(&status.message) {
        ErrorKind::ContextCancelled
    } else {
        status.kind
    };
    HandledError::with_kind(
        kind,
        status.clone(),
        status.message.clone(),
        ErrorCode::for_kind(kind),
    )
}

#[cfg(test)]
mod tests;
