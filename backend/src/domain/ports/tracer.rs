//! Port for the span tracer used by the tracing layer.

use std::fmt;

use crate::domain::{Context, HandledError};

/// Value of a span attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// Text value.
    String(String),
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(value) => f.write_str(value),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
        }
    }
}

/// Key/value pair attached to a span.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanAttribute {
    /// Attribute key, e.g. `cqrs.operation`.
    pub key: String,
    /// Attribute value.
    pub value: AttributeValue,
}

impl SpanAttribute {
    /// Text attribute.
    pub fn string(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: AttributeValue::String(value.into()),
        }
    }

    /// Boolean attribute.
    pub fn bool(key: impl Into<String>, value: bool) -> Self {
        Self {
            key: key.into(),
            value: AttributeValue::Bool(value),
        }
    }

    /// Integer attribute.
    pub fn int(key: impl Into<String>, value: i64) -> Self {
        Self {
            key: key.into(),
            value: AttributeValue::Int(value),
        }
    }

    /// Floating point attribute.
    pub fn float(key: impl Into<String>, value: f64) -> Self {
        Self {
            key: key.into(),
            value: AttributeValue::Float(value),
        }
    }
}

/// A started span.
pub trait SpanHandle: Send {
    /// Attach further attributes.
    fn set_attributes(&mut self, attributes: Vec<SpanAttribute>);

    /// Record a failure together with the frames it carries.
    fn record_error(&mut self, error: &HandledError);

    /// Finish the span. Consumes the handle so a span ends at most once.
    fn end(self: Box<Self>);
}

/// Port for starting spans.
pub trait Tracer: Send + Sync {
    /// Start a span as a child of whatever span `ctx` carries and return a
    /// context bound to the new span.
    fn start_span(
        &self,
        ctx: &Context,
        name: &str,
        attributes: Vec<SpanAttribute>,
    ) -> (Context, Box<dyn SpanHandle>);
}

/// Tracer that records nothing, for pipelines with tracing disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpTracer;

struct NoOpSpan;

impl SpanHandle for NoOpSpan {
    fn set_attributes(&mut self, _attributes: Vec<SpanAttribute>) {}

    fn record_error(&mut self, _error: &HandledError) {}

    fn end(self: Box<Self>) {}
}

impl Tracer for NoOpTracer {
    fn start_span(
        &self,
        ctx: &Context,
        _name: &str,
        _attributes: Vec<SpanAttribute>,
    ) -> (Context, Box<dyn SpanHandle>) {
        (ctx.clone(), Box::new(NoOpSpan))
    }
}
