//! Inbound adapters that translate transport requests into handler calls.
//!
//! Each transport rebuilds a [`crate::domain::Context`] from its own carrier
//! (HTTP headers, RPC metadata, queue headers) and maps the resulting
//! [`crate::domain::HandledError`] back onto its status vocabulary.

pub mod http;
pub mod queue;
pub mod rpc;
