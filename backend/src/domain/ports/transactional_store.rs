//! Port for stores that can open physical transactions.
//!
//! The transaction manager only needs to begin, commit and roll back.
//! Everything a transaction can do besides that is adapter specific and is
//! reached by downcasting the handle (see [`StoreTransaction::as_any_mut`]).

use std::any::Any;

use async_trait::async_trait;

use crate::domain::Context;

use super::define_port_error;

define_port_error! {
    /// Errors raised by store adapters.
    pub enum StoreError {
        /// A connection could not be obtained.
        Connection { message: String } => "store connection failed: {message}",
        /// A statement, commit or rollback failed; the driver's text is kept
        /// verbatim so cancellation signatures stay recognisable.
        Query { message: String } => "{message}",
        /// The execution context was cancelled while waiting on the store.
        Cancelled => "context canceled",
        /// The transaction handle was used after commit or rollback.
        TransactionFinished => "transaction already finished",
    }
}

/// An open physical transaction.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Make the transaction's effects durable.
    async fn commit(&mut self) -> Result<(), StoreError>;

    /// Discard the transaction's effects.
    ///
    /// Must be safe to call after a failed commit.
    async fn rollback(&mut self) -> Result<(), StoreError>;

    /// Access the concrete handle so adapters can run statements on it.
    fn as_any_mut(&mut self) -> &mut (dyn Any + Send);
}

/// Port for opening transactions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TransactionalStore: Send + Sync {
    /// Open a transaction. The context is consulted for cancellation only.
    async fn begin_transaction(
        &self,
        ctx: &Context,
    ) -> Result<Box<dyn StoreTransaction>, StoreError>;
}
