//! Command/query dispatch core.
//!
//! Business operations implement [`Handler`]. Transports never call a bare
//! handler; they call the decorated one produced by [`Pipeline`], which wraps
//! it as
//!
//! ```text
//! TracingLayer -> LoggingLayer -> ErrorLayer -> handler
//! ```
//!
//! The order is fixed at construction. Tracing is outermost so a span covers
//! every layer; logging sees errors only after cancellation has been
//! normalised.

mod error_layer;
mod logging_layer;
mod pipeline;
mod tracing_layer;

use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use super::context::Context;
use super::error::HandledError;

pub use error_layer::ErrorLayer;
pub use logging_layer::LoggingLayer;
pub use pipeline::{AttributePolicy, Decorated, Pipeline};
pub use tracing_layer::TracingLayer;

/// A business operation taking `I`.
///
/// Commands use `Output = ()`; queries return a value.
#[async_trait]
pub trait Handler<I>: Send + Sync
where
    I: Send + 'static,
{
    /// Value produced on success.
    type Output: Send;

    /// Run the operation.
    async fn handle(&self, ctx: &Context, input: I) -> Result<Self::Output, HandledError>;
}

#[async_trait]
impl<I, H> Handler<I> for Arc<H>
where
    I: Send + 'static,
    H: Handler<I> + ?Sized,
{
    type Output = H::Output;

    async fn handle(&self, ctx: &Context, input: I) -> Result<Self::Output, HandledError> {
        (**self).handle(ctx, input).await
    }
}

/// Shared, type-erased command handler.
pub type CommandHandler<I> = Arc<dyn Handler<I, Output = ()>>;

/// Shared, type-erased query handler.
pub type QueryHandler<I, O> = Arc<dyn Handler<I, Output = O>>;

/// Whether an operation changes state or only reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// State-changing operation without a result.
    Command,
    /// Read-only operation returning a result.
    Query,
}

impl OperationKind {
    /// Lowercase name, used as log field key and span attribute.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Command => "command",
            Self::Query => "query",
        }
    }

    /// Log field key for the input projection.
    #[must_use]
    pub const fn body_key(self) -> &'static str {
        match self {
            Self::Command => "command_body",
            Self::Query => "query_body",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operation name derived from the input type: its final path segment,
/// without generic arguments.
///
/// # Examples
/// ```
/// use disbursement::domain::DisburseCommand;
/// use disbursement::domain::cqrs::operation_name;
///
/// assert_eq!(operation_name::<DisburseCommand>(), "DisburseCommand");
/// assert_eq!(operation_name::<Vec<u8>>(), "Vec");
/// ```
#[must_use]
pub fn operation_name<I: ?Sized>() -> &'static str {
    let full = type_name::<I>();
    let without_generics = full.split('<').next().unwrap_or(full);
    without_generics
        .rsplit("::")
        .next()
        .unwrap_or(without_generics)
}

#[cfg(test)]
mod tests;
