//! `tracing`-backed implementations of the domain's telemetry ports.
//!
//! - [`TracingTracer`] maps each decorated call to an `info` span parented to
//!   the span in the caller's context.
//! - [`TracingLogger`] emits one event per log call inside that span.
//!
//! Exporting spans (OTLP, Jaeger, ...) is left to whatever subscriber the
//! binary installs.

mod logger;
mod tracer;

pub use logger::TracingLogger;
pub use tracer::TracingTracer;
