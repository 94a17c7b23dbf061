//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod disbursement_repository;
mod logger;
mod tracer;
mod transactional_store;

#[cfg(test)]
pub use disbursement_repository::MockDisbursementRepository;
pub use disbursement_repository::DisbursementRepository;
pub use logger::{LogField, LogLevel, Logger};
pub use tracer::{AttributeValue, NoOpTracer, SpanAttribute, SpanHandle, Tracer};
#[cfg(test)]
pub use transactional_store::MockTransactionalStore;
pub use transactional_store::{StoreError, StoreTransaction, TransactionalStore};
