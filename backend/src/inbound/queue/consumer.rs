//! Consumer loop over a message source.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tracing::{error, info};

use super::message::QueueMessage;
use crate::domain::{Context, HandledError};

/// Broker client yielding messages one at a time.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Next message, or `None` once the source is exhausted.
    async fn receive(&self, ctx: &Context) -> Result<Option<QueueMessage>, HandledError>;
}

/// Processes one decoded message.
#[async_trait]
pub trait MessageProcessor: Send + Sync {
    /// Handle `message` under `ctx`.
    async fn process(&self, ctx: &Context, message: &QueueMessage) -> Result<(), HandledError>;
}

/// In-process source fed through a Tokio channel.
#[derive(Clone)]
pub struct ChannelSource {
    receiver: Arc<Mutex<mpsc::Receiver<QueueMessage>>>,
}

impl ChannelSource {
    /// Source and the sender feeding it.
    pub fn new(capacity: usize) -> (mpsc::Sender<QueueMessage>, Self) {
        let (sender, receiver) = mpsc::channel(capacity);
        (
            sender,
            Self {
                receiver: Arc::new(Mutex::new(receiver)),
            },
        )
    }
}

#[async_trait]
impl MessageSource for ChannelSource {
    async fn receive(&self, _ctx: &Context) -> Result<Option<QueueMessage>, HandledError> {
        Ok(self.receiver.lock().await.recv().await)
    }
}

/// Read and process messages until `ctx` is cancelled or the source ends.
///
/// A failing message is logged and skipped; a failing read stops the loop.
/// Returns the number of messages processed successfully.
///
/// # Errors
///
/// Returns the source's error when a read fails.
pub async fn run_consumer(
    ctx: &Context,
    source: &dyn MessageSource,
    processor: &dyn MessageProcessor,
) -> Result<usize, HandledError> {
    let mut processed = 0;
    loop {
        let next = match ctx.run_until_cancelled(source.receive(ctx)).await {
            None => break,
            Some(next) => next.inspect_err(|err| {
                error!(error = %err, error_kind = %err.kind(), "error reading from queue");
            })?,
        };
        let Some(message) = next else {
            break;
        };
        info!(topic = %message.topic, "received message from queue");
        match processor.process(ctx, &message).await {
            Ok(()) => processed += 1,
            Err(err) => error!(
                topic = %message.topic,
                error = %err,
                error_kind = %err.kind(),
                "failed to process queue message"
            ),
        }
    }
    info!(processed, "queue consumer stopped");
    Ok(processed)
}
