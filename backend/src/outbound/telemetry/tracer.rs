//! Span tracer over `tracing` spans.

use tracing::field::Empty;
use tracing::{Level, Span, debug, event, info_span};

use crate::domain::ports::{AttributeValue, SpanAttribute, SpanHandle, Tracer};
use crate::domain::{Context, HandledError, REQUEST_ID_KEY};

/// Attributes stored as span fields; anything else becomes a debug event.
const SPAN_FIELDS: [&str; 4] = ["cqrs.type", "cqrs.operation", "cqrs.timestamp", REQUEST_ID_KEY];

/// Opens an `info`-level span per decorated call.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTracer;

impl Tracer for TracingTracer {
    fn start_span(
        &self,
        ctx: &Context,
        name: &str,
        attributes: Vec<SpanAttribute>,
    ) -> (Context, Box<dyn SpanHandle>) {
        let span = if ctx.span().is_none() {
            info_span!(
                "cqrs",
                otel.name = %name,
                "cqrs.type" = Empty,
                "cqrs.operation" = Empty,
                "cqrs.timestamp" = Empty,
                request_id = Empty,
                error = Empty,
                "error.kind" = Empty,
            )
        } else {
            info_span!(
                parent: ctx.span(),
                "cqrs",
                otel.name = %name,
                "cqrs.type" = Empty,
                "cqrs.operation" = Empty,
                "cqrs.timestamp" = Empty,
                request_id = Empty,
                error = Empty,
                "error.kind" = Empty,
            )
        };

        let mut handle = TracingSpan { span: span.clone() };
        handle.set_attributes(attributes);
        (ctx.with_span(span), Box::new(handle))
    }
}

struct TracingSpan {
    span: Span,
}

impl SpanHandle for TracingSpan {
    fn set_attributes(&mut self, attributes: Vec<SpanAttribute>) {
        for SpanAttribute { key, value } in attributes {
            if SPAN_FIELDS.contains(&key.as_str()) {
                record_value(&self.span, &key, &value);
            } else {
                debug!(parent: &self.span, attribute = %key, value = %value, "span attribute");
            }
        }
    }

    fn record_error(&mut self, error: &HandledError) {
        self.span.record("error", error.message());
        self.span.record("error.kind", error.kind().as_str());
        event!(
            parent: &self.span,
            Level::INFO,
            "exception.type" = error.kind().as_str(),
            "exception.code" = error.code().as_str(),
            "exception.message" = error.message(),
            "exception.stacktrace" = %join_frames(error),
            "exception"
        );
    }

    fn end(self: Box<Self>) {
        drop(self.span);
    }
}

fn record_value(span: &Span, key: &str, value: &AttributeValue) {
    match value {
        AttributeValue::String(text) => span.record(key, text.as_str()),
        AttributeValue::Bool(flag) => span.record(key, *flag),
        AttributeValue::Int(number) => span.record(key, *number),
        AttributeValue::Float(number) => span.record(key, *number),
    };
}

/// Frames rendered most recent first, one per line.
fn join_frames(error: &HandledError) -> String {
    error
        .stack_trace()
        .iter()
        .rev()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
