//! Explicit execution context passed to every handler and data-access call.
//!
//! A [`Context`] bundles what one logical operation needs to carry through
//! its call path: propagated string values such as the request id, a
//! cooperative cancellation signal, the ambient transaction (if any) and the
//! tracing span the operation runs under. Contexts are immutable; every
//! `with_*` method returns a derived copy.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::Span;

use super::cancellation::CONTEXT_CANCELED;
use super::error::{Cause, ErrorCode, HandledError};
use super::request_id::RequestId;
use super::transaction::AmbientTransaction;

/// Key under which the correlation id is stored.
pub const REQUEST_ID_KEY: &str = "request_id";

/// Keys copied between a context and transport metadata.
pub const PROPAGATED_KEYS: [&str; 1] = [REQUEST_ID_KEY];

/// Per-operation execution context.
///
/// # Examples
/// ```
/// use disbursement::domain::Context;
///
/// let ctx = Context::background().with_value("tenant", "acme");
/// assert_eq!(ctx.get_string("tenant"), "acme");
/// assert_eq!(ctx.get_string("missing"), "");
/// assert!(ctx.transaction().is_none());
/// ```
#[derive(Clone)]
pub struct Context {
    values: Arc<BTreeMap<String, String>>,
    cancellation: CancellationToken,
    transaction: Option<Arc<AmbientTransaction>>,
    span: Span,
}

impl Context {
    /// Root context: no values, never cancelled unless a token is attached.
    #[must_use]
    pub fn background() -> Self {
        Self {
            values: Arc::new(BTreeMap::new()),
            cancellation: CancellationToken::new(),
            transaction: None,
            span: Span::none(),
        }
    }

    /// Derived context with `key` bound to `value`.
    #[must_use]
    pub fn with_value(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut values = (*self.values).clone();
        values.insert(key.into(), value.into());
        Self {
            values: Arc::new(values),
            ..self.clone()
        }
    }

    /// Value bound to `key`, or the empty string.
    #[must_use]
    pub fn get_string(&self, key: &str) -> &str {
        self.values.get(key).map_or("", String::as_str)
    }

    /// Every propagated value, ordered by key.
    pub fn values(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Derived context carrying `request_id`.
    #[must_use]
    pub fn with_request_id(&self, request_id: &RequestId) -> Self {
        self.with_value(REQUEST_ID_KEY, request_id.as_str())
    }

    /// Correlation id, or the empty string when none was attached.
    #[must_use]
    pub fn request_id(&self) -> &str {
        self.get_string(REQUEST_ID_KEY)
    }

    /// Derived context observing `token`.
    #[must_use]
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        Self {
            cancellation: token,
            ..self.clone()
        }
    }

    /// Token observed by this context.
    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Whether the caller has given up.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Fail with [`ErrorKind::ContextCancelled`](super::ErrorKind) once the
    /// caller has given up.
    #[track_caller]
    pub fn check_cancelled(&self) -> Result<(), HandledError> {
        if self.is_cancelled() {
            return Err(HandledError::context_cancelled(
                Cause::Cancelled,
                CONTEXT_CANCELED,
                ErrorCode::CANCELLED,
            ));
        }
        Ok(())
    }

    /// Resolves once the caller gives up.
    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await;
    }

    /// Drive `fut` unless the context is cancelled first, in which case
    /// `None` is returned and `fut` is dropped.
    pub async fn run_until_cancelled<F>(&self, fut: F) -> Option<F::Output>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            () = self.cancellation.cancelled() => None,
            output = fut => Some(output),
        }
    }

    /// Ambient transaction, present only inside
    /// [`TransactionManager::run_in_transaction`](super::TransactionManager).
    #[must_use]
    pub fn transaction(&self) -> Option<&Arc<AmbientTransaction>> {
        self.transaction.as_ref()
    }

    pub(crate) fn with_transaction(&self, transaction: Arc<AmbientTransaction>) -> Self {
        Self {
            transaction: Some(transaction),
            ..self.clone()
        }
    }

    /// Copy for work that outlives the current operation.
    ///
    /// Values are kept. The ambient transaction and span are dropped and the
    /// copy observes a fresh cancellation token.
    #[must_use]
    pub fn detached(&self) -> Self {
        Self {
            values: Arc::clone(&self.values),
            cancellation: CancellationToken::new(),
            transaction: None,
            span: Span::none(),
        }
    }

    /// Derived context running under `span`.
    #[must_use]
    pub fn with_span(&self, span: Span) -> Self {
        Self {
            span,
            ..self.clone()
        }
    }

    /// Span this context runs under; disabled for the background context.
    #[must_use]
    pub fn span(&self) -> &Span {
        &self.span
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("values", &self.values)
            .field("cancelled", &self.is_cancelled())
            .field(
                "transaction",
                &self.transaction.as_ref().map(|tx| tx.id()),
            )
            .finish_non_exhaustive()
    }
}
