//! Queue processor for disbursement requests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::error;

use super::consumer::MessageProcessor;
use super::message::{Envelope, QueueMessage, context_from_headers};
use crate::app::Application;
use crate::domain::cqrs::Handler;
use crate::domain::{Cause, Context, DisburseCommand, ErrorCode, HandledError, RequestId};

/// Payload of a disbursement message.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisburseMessage {
    /// Amount to disburse; must be positive.
    pub amount: f64,
}

/// Decodes `{ "data": { "amount": .. } }` envelopes and runs the disburse
/// command.
#[derive(Clone)]
pub struct DisbursementProcessor {
    app: Application,
}

impl DisbursementProcessor {
    /// Process messages with `app`.
    pub fn new(app: Application) -> Self {
        Self { app }
    }
}

#[async_trait]
impl MessageProcessor for DisbursementProcessor {
    async fn process(&self, ctx: &Context, message: &QueueMessage) -> Result<(), HandledError> {
        let ctx = context_from_headers(ctx, message);
        let ctx = if ctx.request_id().is_empty() {
            ctx.with_request_id(&RequestId::generate())
        } else {
            ctx
        };

        let envelope: Envelope<DisburseMessage> = serde_json::from_slice(&message.value)
            .map_err(|err| {
                error!(
                    error = %err,
                    request = %String::from_utf8_lossy(&message.value),
                    request_id = ctx.request_id(),
                    "error unmarshalling queue message"
                );
                HandledError::classify(
                    Cause::other(err),
                    "error unmarshalling queue message",
                    ErrorCode::INTERNAL_ERROR,
                )
            })?;

        self.app
            .commands
            .disburse
            .handle(
                &ctx,
                DisburseCommand {
                    amount: envelope.data.amount,
                },
            )
            .await
            .map_err(|err| err.rewrap())
    }
}
