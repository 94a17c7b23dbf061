//! Outermost layer: one span per call.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::Instrument;

use super::pipeline::AttributePolicy;
use super::{Handler, OperationKind, operation_name};
use crate::domain::ports::{SpanAttribute, SpanHandle, Tracer};
use crate::domain::projection::flatten_attributes;
use crate::domain::{Context, HandledError, REQUEST_ID_KEY};

/// Prefix of the projected input attributes.
pub const INPUT_ATTRIBUTE_LABEL: &str = "cqrs.input";

/// Starts a span named after the lower-cased operation, records failures on
/// it and ends it on every exit path.
pub struct TracingLayer<H> {
    inner: H,
    tracer: Arc<dyn Tracer>,
    kind: OperationKind,
    policy: AttributePolicy,
}

impl<H> TracingLayer<H> {
    pub(super) fn new(
        inner: H,
        tracer: Arc<dyn Tracer>,
        kind: OperationKind,
        policy: AttributePolicy,
    ) -> Self {
        Self {
            inner,
            tracer,
            kind,
            policy,
        }
    }
}

#[async_trait]
impl<I, H> Handler<I> for TracingLayer<H>
where
    I: Serialize + Send + Sync + 'static,
    H: Handler<I>,
{
    type Output = H::Output;

    async fn handle(&self, ctx: &Context, input: I) -> Result<Self::Output, HandledError> {
        let name = operation_name::<I>().to_lowercase();
        let mut attributes = vec![
            SpanAttribute::string("cqrs.type", self.kind.as_str()),
            SpanAttribute::string("cqrs.operation", name.as_str()),
            SpanAttribute::string(
                "cqrs.timestamp",
                Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true),
            ),
            SpanAttribute::string(REQUEST_ID_KEY, ctx.request_id()),
        ];
        if self.policy.capture_input {
            attributes.extend(flatten_attributes(
                INPUT_ATTRIBUTE_LABEL,
                &input,
                self.policy.truncate,
            ));
        }

        let (span_ctx, handle) = self.tracer.start_span(ctx, &name, attributes);
        let mut span = SpanGuard(Some(handle));
        let instrumented = span_ctx.span().clone();

        let result = self
            .inner
            .handle(&span_ctx, input)
            .instrument(instrumented)
            .await;
        if let Err(err) = &result {
            span.record_error(err);
        }
        result
    }
}

/// Ends the span when dropped, including while a panic unwinds.
struct SpanGuard(Option<Box<dyn SpanHandle>>);

impl SpanGuard {
    fn record_error(&mut self, err: &HandledError) {
        if let Some(handle) = self.0.as_mut() {
            handle.record_error(err);
        }
    }
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.0.take() {
            handle.end();
        }
    }
}
