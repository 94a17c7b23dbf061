//! RPC inbound adapter built on `tonic` statuses and metadata.
//!
//! The service is transport-agnostic at this level: methods take a
//! `tonic::Request` and return `Result<_, tonic::Status>`, so they can be
//! mounted behind any generated gRPC server.

mod disbursement;
mod metadata;
mod status;

pub use disbursement::{DisbursementRpc, DisburseRequest};
pub use metadata::{OutgoingContext, context_from_metadata, inject_metadata};
pub use status::{code_for, from_status, kind_for, remote_status, to_status};
