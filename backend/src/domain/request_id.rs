//! Request-scoped correlation identifier.
//!
//! A `RequestId` follows one request through every transport and log record.
//! It travels inside [`Context`](super::Context) rather than task-local
//! storage, so spawned work only sees it when handed a context explicitly.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use uuid::Uuid;

/// Longest identifier accepted from a caller.
pub const MAX_REQUEST_ID_LEN: usize = 128;

/// Validation errors raised when accepting a caller-supplied identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestIdError {
    /// The identifier was empty once trimmed.
    #[error("request id must not be empty")]
    Empty,
    /// The identifier exceeds [`MAX_REQUEST_ID_LEN`].
    #[error("request id must be at most {max} characters")]
    TooLong {
        /// Maximum permitted length.
        max: usize,
    },
    /// The identifier contains characters that cannot travel in a header.
    #[error("request id must contain only visible ASCII characters")]
    InvalidCharacters,
}

/// Correlation identifier carried by the execution context.
///
/// # Examples
/// ```
/// use disbursement::domain::RequestId;
///
/// let id: RequestId = " req-42 ".parse().expect("valid id");
/// assert_eq!(id.as_str(), "req-42");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    /// Generate a fresh identifier for requests that arrive without one.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Validate a caller-supplied identifier.
    pub fn new(value: impl AsRef<str>) -> Result<Self, RequestIdError> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            return Err(RequestIdError::Empty);
        }
        if trimmed.len() > MAX_REQUEST_ID_LEN {
            return Err(RequestIdError::TooLong {
                max: MAX_REQUEST_ID_LEN,
            });
        }
        if !trimmed.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(RequestIdError::InvalidCharacters);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Accept `value` when valid, otherwise generate a fresh identifier.
    pub fn or_generate(value: Option<&str>) -> Self {
        value
            .and_then(|raw| Self::new(raw).ok())
            .unwrap_or_else(Self::generate)
    }

    /// Borrow the identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RequestId {
    type Err = RequestIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}
