//! Middle layer: one record before the call, one more on failure.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use super::{Handler, OperationKind, operation_name};
use crate::domain::ports::{LogField, LogLevel, Logger};
use crate::domain::projection::log_projection;
use crate::domain::{Context, HandledError};

/// Logs `Executing <kind>` before delegating and a warning (client-facing
/// kinds) or an error (everything else) when the call fails.
pub struct LoggingLayer<H> {
    inner: H,
    logger: Arc<dyn Logger>,
    kind: OperationKind,
}

impl<H> LoggingLayer<H> {
    pub(super) fn new(inner: H, logger: Arc<dyn Logger>, kind: OperationKind) -> Self {
        Self {
            inner,
            logger,
            kind,
        }
    }
}

#[async_trait]
impl<I, H> Handler<I> for LoggingLayer<H>
where
    I: Serialize + Debug + Send + Sync + 'static,
    H: Handler<I>,
{
    type Output = H::Output;

    async fn handle(&self, ctx: &Context, input: I) -> Result<Self::Output, HandledError> {
        let fields = vec![
            LogField::new(self.kind.as_str(), operation_name::<I>()),
            LogField::new(self.kind.body_key(), log_projection(&input)),
        ];
        self.logger
            .info(ctx, &format!("Executing {}", self.kind), &fields);

        let mut pending = PendingRecord {
            logger: self.logger.as_ref(),
            ctx,
            kind: self.kind,
            fields: Some(fields),
        };
        let result = self.inner.handle(ctx, input).await;
        let fields = pending.fields.take();
        if let (Err(err), Some(fields)) = (&result, fields) {
            log_failure(self.logger.as_ref(), ctx, self.kind, fields, err);
        }
        result
    }
}

fn log_failure(
    logger: &dyn Logger,
    ctx: &Context,
    kind: OperationKind,
    mut fields: Vec<LogField>,
    err: &HandledError,
) {
    fields.push(LogField::new("error", err.message()));
    if let Some(original) = err.original_text() {
        fields.push(LogField::new("error_original", original));
    }
    fields.push(LogField::new("error_kind", err.kind().as_str()));
    fields.push(LogField::new("error_code", err.code().as_str()));

    if err.is_client_facing() {
        logger.warn(ctx, &format!("client error: failed to execute: {kind}"), &fields);
    } else {
        logger.error(ctx, &format!("internal error: failed to execute: {kind}"), &fields);
    }
}

/// Emits the failure record when the call never produced a result, i.e. the
/// handler panicked or its future was dropped mid-flight.
struct PendingRecord<'a> {
    logger: &'a dyn Logger,
    ctx: &'a Context,
    kind: OperationKind,
    fields: Option<Vec<LogField>>,
}

impl Drop for PendingRecord<'_> {
    fn drop(&mut self) {
        let Some(mut fields) = self.fields.take() else {
            return;
        };
        let reason = if std::thread::panicking() {
            "handler panicked"
        } else {
            "handler dropped before completion"
        };
        fields.push(LogField::new("error", Value::from(reason)));
        self.logger.log(
            self.ctx,
            LogLevel::Error,
            &format!("internal error: failed to execute: {}", self.kind),
            &fields,
        );
    }
}
