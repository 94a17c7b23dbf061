//! Recording logger and tracer.

use std::sync::{Arc, Mutex};

use super::lock;
use crate::domain::ports::{
    AttributeValue, LogField, LogLevel, Logger, SpanAttribute, SpanHandle, Tracer,
};
use crate::domain::{Context, HandledError};

/// One record captured by [`RecordingLogger`].
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    /// Severity.
    pub level: LogLevel,
    /// Message.
    pub message: String,
    /// Fields in emission order.
    pub fields: Vec<LogField>,
    /// Request id of the context the record was emitted under.
    pub request_id: String,
}

impl LogRecord {
    /// Value of the first field named `key`.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&serde_json::Value> {
        self.fields
            .iter()
            .find(|field| field.key == key)
            .map(|field| &field.value)
    }
}

/// Logger keeping every record in memory.
#[derive(Clone, Default)]
pub struct RecordingLogger {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl RecordingLogger {
    /// Empty logger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record so far.
    #[must_use]
    pub fn records(&self) -> Vec<LogRecord> {
        lock(&self.records).clone()
    }

    /// Records emitted at `level`.
    #[must_use]
    pub fn at(&self, level: LogLevel) -> Vec<LogRecord> {
        lock(&self.records)
            .iter()
            .filter(|record| record.level == level)
            .cloned()
            .collect()
    }
}

impl Logger for RecordingLogger {
    fn log(&self, ctx: &Context, level: LogLevel, message: &str, fields: &[LogField]) {
        lock(&self.records).push(LogRecord {
            level,
            message: message.to_owned(),
            fields: fields.to_vec(),
            request_id: ctx.request_id().to_owned(),
        });
    }
}

/// One span captured by [`RecordingTracer`].
#[derive(Debug, Clone)]
pub struct SpanRecord {
    /// Span name.
    pub name: String,
    /// Attributes given at start and set afterwards.
    pub attributes: Vec<SpanAttribute>,
    /// Errors recorded on the span.
    pub errors: Vec<HandledError>,
    /// How many times `end` was called.
    pub end_calls: usize,
}

impl SpanRecord {
    /// Value of the attribute named `key`.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes
            .iter()
            .find(|attribute| attribute.key == key)
            .map(|attribute| &attribute.value)
    }
}

/// Tracer keeping every span in memory.
#[derive(Clone, Default)]
pub struct RecordingTracer {
    spans: Arc<Mutex<Vec<SpanRecord>>>,
}

impl RecordingTracer {
    /// Empty tracer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every span started so far.
    #[must_use]
    pub fn spans(&self) -> Vec<SpanRecord> {
        lock(&self.spans).clone()
    }
}

impl Tracer for RecordingTracer {
    fn start_span(
        &self,
        ctx: &Context,
        name: &str,
        attributes: Vec<SpanAttribute>,
    ) -> (Context, Box<dyn SpanHandle>) {
        let mut spans = lock(&self.spans);
        spans.push(SpanRecord {
            name: name.to_owned(),
            attributes,
            errors: Vec::new(),
            end_calls: 0,
        });
        let index = spans.len() - 1;
        let handle = RecordingSpan {
            spans: Arc::clone(&self.spans),
            index,
        };
        (ctx.clone(), Box::new(handle))
    }
}

struct RecordingSpan {
    spans: Arc<Mutex<Vec<SpanRecord>>>,
    index: usize,
}

impl RecordingSpan {
    fn update(&self, apply: impl FnOnce(&mut SpanRecord)) {
        if let Some(record) = lock(&self.spans).get_mut(self.index) {
            apply(record);
        }
    }
}

impl SpanHandle for RecordingSpan {
    fn set_attributes(&mut self, attributes: Vec<SpanAttribute>) {
        self.update(|record| record.attributes.extend(attributes));
    }

    fn record_error(&mut self, error: &HandledError) {
        self.update(|record| record.errors.push(error.clone()));
    }

    fn end(self: Box<Self>) {
        self.update(|record| record.end_calls += 1);
    }
}
