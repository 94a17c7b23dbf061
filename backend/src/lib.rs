//! Disbursement service library.
//!
//! The [`domain`] module holds the error taxonomy, context, transaction
//! manager and decorator pipeline. Transports live under [`inbound`] and the
//! Diesel and `tracing` adapters under [`outbound`]; [`app`] wires them.

#![warn(missing_docs)]

pub mod app;
pub mod config;
pub mod domain;
pub mod inbound;
pub mod outbound;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
