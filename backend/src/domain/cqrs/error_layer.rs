//! Innermost layer: canonicalises cancellation failures.

use async_trait::async_trait;

use super::Handler;
use crate::domain::cancellation::normalize_cancellation;
use crate::domain::{Context, HandledError};

/// Replaces failures carrying a cancellation signature with a
/// `ContextCancelled` error. Does not log or trace.
pub struct ErrorLayer<H> {
    inner: H,
}

impl<H> ErrorLayer<H> {
    pub(super) fn new(inner: H) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<I, H> Handler<I> for ErrorLayer<H>
where
    I: Send + 'static,
    H: Handler<I>,
{
    type Output = H::Output;

    async fn handle(&self, ctx: &Context, input: I) -> Result<Self::Output, HandledError> {
        self.inner
            .handle(ctx, input)
            .await
            .map_err(normalize_cancellation)
    }
}
