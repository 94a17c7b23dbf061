//! Port for the structured logger used by the logging layer.

use std::fmt;

use serde_json::Value;

use crate::domain::Context;

/// Severity of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    /// Diagnostic detail.
    Debug,
    /// Routine progress.
    Info,
    /// Client-facing failure.
    Warn,
    /// Internal failure.
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        })
    }
}

/// One key/value pair of a log record. Order of fields is preserved.
#[derive(Debug, Clone, PartialEq)]
pub struct LogField {
    /// Field name.
    pub key: &'static str,
    /// Field value.
    pub value: Value,
}

impl LogField {
    /// Build a field.
    pub fn new(key: &'static str, value: impl Into<Value>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }
}

/// Port for emitting structured log records.
pub trait Logger: Send + Sync {
    /// Emit one record.
    fn log(&self, ctx: &Context, level: LogLevel, message: &str, fields: &[LogField]);

    /// Emit a debug record.
    fn debug(&self, ctx: &Context, message: &str, fields: &[LogField]) {
        self.log(ctx, LogLevel::Debug, message, fields);
    }

    /// Emit an info record.
    fn info(&self, ctx: &Context, message: &str, fields: &[LogField]) {
        self.log(ctx, LogLevel::Info, message, fields);
    }

    /// Emit a warning record.
    fn warn(&self, ctx: &Context, message: &str, fields: &[LogField]) {
        self.log(ctx, LogLevel::Warn, message, fields);
    }

    /// Emit an error record.
    fn error(&self, ctx: &Context, message: &str, fields: &[LogField]) {
        self.log(ctx, LogLevel::Error, message, fields);
    }
}
