//! Domain core shared by every transport.
//!
//! Purpose: classify failures, carry the execution context (request id,
//! cancellation, ambient transaction, span), run units of work in a single
//! transaction, and decorate command/query handlers with tracing, logging
//! and cancellation normalisation.
//!
//! Public surface:
//! - HandledError / ErrorKind / ErrorCode: the closed error taxonomy.
//! - Context / RequestId: explicit per-operation context.
//! - TransactionManager: ambient, context-carried transactions.
//! - cqrs::Pipeline: fixed decorator composition for handlers.
//! - DisburseCommand / DisburseHandler: the disbursement operation.

pub mod cancellation;
mod context;
pub mod cqrs;
mod disbursement;
pub mod error;
pub mod ports;
pub mod projection;
mod request_id;
mod transaction;

pub use self::context::{Context, PROPAGATED_KEYS, REQUEST_ID_KEY};
pub use self::disbursement::{DisburseCommand, DisburseHandler, Disbursement};
pub use self::error::{
    Cause, ErrorCode, ErrorInfo, ErrorKind, Frame, HandledError, RemoteStatus,
    extract_handled_error, is_client_facing, rewrap_preserving_trace,
};
pub use self::request_id::{MAX_REQUEST_ID_LEN, RequestId, RequestIdError};
pub use self::transaction::{AmbientTransaction, TransactionGuard, TransactionManager};
