//! Fixed composition of the decorator layers.

use std::fmt::Debug;
use std::sync::Arc;

use serde::Serialize;

use super::{ErrorLayer, Handler, LoggingLayer, OperationKind, TracingLayer};
use crate::domain::ports::{Logger, Tracer};

/// A handler wrapped as `TracingLayer -> LoggingLayer -> ErrorLayer -> H`.
pub type Decorated<H> = TracingLayer<LoggingLayer<ErrorLayer<H>>>;

/// Controls how operation inputs are attached to spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributePolicy {
    /// Attach the flattened input under `cqrs.input`.
    pub capture_input: bool,
    /// Apply the field-count and length caps while flattening.
    pub truncate: bool,
}

impl Default for AttributePolicy {
    fn default() -> Self {
        Self {
            capture_input: false,
            truncate: true,
        }
    }
}

/// Builds decorated handlers sharing one tracer and logger.
///
/// # Examples
/// ```
/// use std::sync::Arc;
///
/// use async_trait::async_trait;
/// use disbursement::domain::cqrs::{Handler, Pipeline};
/// use disbursement::domain::ports::NoOpTracer;
/// use disbursement::domain::{Context, HandledError};
/// use disbursement::outbound::telemetry::TracingLogger;
///
/// #[derive(Debug, serde::Serialize)]
/// struct Ping;
///
/// struct Pong;
///
/// #[async_trait]
/// impl Handler<Ping> for Pong {
///     type Output = &'static str;
///
///     async fn handle(&self, _ctx: &Context, _input: Ping) -> Result<&'static str, HandledError> {
///         Ok("pong")
///     }
/// }
///
/// let pipeline = Pipeline::new(Arc::new(NoOpTracer), Arc::new(TracingLogger));
/// let ping = pipeline.query::<Ping, _>(Pong);
/// # let _ = ping;
/// ```
#[derive(Clone)]
pub struct Pipeline {
    tracer: Arc<dyn Tracer>,
    logger: Arc<dyn Logger>,
    policy: AttributePolicy,
}

impl Pipeline {
    /// Pipeline using `tracer` and `logger` with the default attribute
    /// policy.
    pub fn new(tracer: Arc<dyn Tracer>, logger: Arc<dyn Logger>) -> Self {
        Self {
            tracer,
            logger,
            policy: AttributePolicy::default(),
        }
    }

    /// Replace the attribute policy.
    #[must_use]
    pub fn with_attribute_policy(mut self, policy: AttributePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Decorate a command handler.
    pub fn command<I, H>(&self, base: H) -> Decorated<H>
    where
        I: Serialize + Debug + Send + Sync + 'static,
        H: Handler<I, Output = ()>,
    {
        self.decorate(base, OperationKind::Command)
    }

    /// Decorate a query handler.
    pub fn query<I, H>(&self, base: H) -> Decorated<H>
    where
        I: Serialize + Debug + Send + Sync + 'static,
        H: Handler<I>,
    {
        self.decorate(base, OperationKind::Query)
    }

    fn decorate<H>(&self, base: H, kind: OperationKind) -> Decorated<H> {
        TracingLayer::new(
            LoggingLayer::new(ErrorLayer::new(base), Arc::clone(&self.logger), kind),
            Arc::clone(&self.tracer),
            kind,
            self.policy,
        )
    }
}
