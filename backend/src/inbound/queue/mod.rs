//! Queue inbound adapter.
//!
//! Messages are transport-neutral [`QueueMessage`] values; a broker client
//! implements [`MessageSource`] and [`run_consumer`] drives it until the
//! context is cancelled. Context values travel in message headers.

mod consumer;
mod disbursement;
mod message;

pub use consumer::{ChannelSource, MessageProcessor, MessageSource, run_consumer};
pub use disbursement::{DisburseMessage, DisbursementProcessor};
pub use message::{Envelope, QueueMessage, context_from_headers, inject_headers};
