//! Structured logger over `tracing` events.

use serde_json::{Map, Value};

use crate::domain::Context;
use crate::domain::ports::{LogField, LogLevel, Logger};

/// Emits one `tracing` event per call.
///
/// Events are parented to the span carried by the context, or to the
/// subscriber's current span when the context has none. Each event carries
/// `request_id` and the fields rendered as one JSON object.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

macro_rules! emit {
    ($ctx:expr, $level:expr, $($rest:tt)+) => {{
        let span = $ctx.span();
        match ($level, span.is_none()) {
            (LogLevel::Debug, true) => tracing::debug!($($rest)+),
            (LogLevel::Debug, false) => tracing::debug!(parent: span, $($rest)+),
            (LogLevel::Info, true) => tracing::info!($($rest)+),
            (LogLevel::Info, false) => tracing::info!(parent: span, $($rest)+),
            (LogLevel::Warn, true) => tracing::warn!($($rest)+),
            (LogLevel::Warn, false) => tracing::warn!(parent: span, $($rest)+),
            (LogLevel::Error, true) => tracing::error!($($rest)+),
            (LogLevel::Error, false) => tracing::error!(parent: span, $($rest)+),
        }
    }};
}

impl Logger for TracingLogger {
    fn log(&self, ctx: &Context, level: LogLevel, message: &str, fields: &[LogField]) {
        let fields = render_fields(fields);
        let request_id = ctx.request_id();
        emit!(ctx, level, request_id, fields = %fields, "{message}");
    }
}

/// Fields as a JSON object; later duplicates overwrite earlier keys.
pub(super) fn render_fields(fields: &[LogField]) -> Value {
    let object: Map<String, Value> = fields
        .iter()
        .map(|field| (field.key.to_owned(), field.value.clone()))
        .collect();
    Value::Object(object)
}
