//! Diesel-backed transactional store.
//!
//! [`DieselStore::begin_transaction`] checks out a detached pool connection
//! and issues `BEGIN` on it; the resulting [`DieselTransaction`] is what the
//! domain binds into the context as the ambient transaction. Repositories
//! reach it again through [`with_connection`], which falls back to a fresh
//! pool connection when no ambient transaction exists.
//!
//! A transaction handle dropped while still open returns its connection to
//! bb8 with a non-idle transaction manager, which the pool treats as broken
//! and discards.

use async_trait::async_trait;
use diesel::QueryResult;
use diesel::result::Error as DieselError;
use diesel_async::pooled_connection::bb8::PooledConnection;
use diesel_async::scoped_futures::ScopedBoxFuture;
use diesel_async::{AnsiTransactionManager, AsyncPgConnection, TransactionManager};

use crate::domain::Context;
use crate::domain::ports::{StoreError, StoreTransaction, TransactionalStore};

use super::diesel_error_mapping::{map_diesel_error, map_pool_error};
use super::pool::DbPool;

/// Opens physical PostgreSQL transactions on pooled connections.
#[derive(Clone)]
pub struct DieselStore {
    pool: DbPool,
}

impl DieselStore {
    /// Create a store over `pool`.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use disbursement::outbound::persistence::{DbPool, DieselStore, PoolConfig};
    ///
    /// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
    /// let pool = DbPool::new(PoolConfig::new("postgres://localhost/payments")).await?;
    /// let store = DieselStore::new(pool);
    /// # let _ = store;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// The pool this store checks connections out of.
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl TransactionalStore for DieselStore {
    async fn begin_transaction(
        &self,
        ctx: &Context,
    ) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let begin = async {
            let mut conn = self.pool.get_owned().await.map_err(map_pool_error)?;
            AnsiTransactionManager::begin_transaction(&mut *conn)
                .await
                .map_err(map_diesel_error)?;
            Ok::<_, StoreError>(DieselTransaction { conn })
        };

        match ctx.run_until_cancelled(begin).await {
            Some(transaction) => Ok(Box::new(transaction?)),
            None => Err(StoreError::cancelled()),
        }
    }
}

/// An open transaction owning its pooled connection.
pub struct DieselTransaction {
    conn: PooledConnection<'static, AsyncPgConnection>,
}

#[async_trait]
impl StoreTransaction for DieselTransaction {
    async fn commit(&mut self) -> Result<(), StoreError> {
        AnsiTransactionManager::commit_transaction(&mut *self.conn)
            .await
            .map_err(map_diesel_error)
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        // A failed COMMIT already rolled back inside the transaction manager.
        match AnsiTransactionManager::rollback_transaction(&mut *self.conn).await {
            Ok(()) | Err(DieselError::NotInTransaction) => Ok(()),
            Err(err) => Err(map_diesel_error(err)),
        }
    }

    fn as_any_mut(&mut self) -> &mut (dyn std::any::Any + Send) {
        self
    }
}

/// Run `operation` on the ambient transaction's connection, or on a pool
/// connection when `ctx` carries no transaction.
///
/// The whole call races the context's cancellation; losing the race yields
/// [`StoreError::Cancelled`], whose text is `context canceled`.
///
/// # Examples
///
/// ```rust,ignore
/// let inserted = with_connection(&pool, ctx, move |conn| {
///     async move {
///         diesel::insert_into(disbursements::table)
///             .values(row)
///             .execute(conn)
///             .await
///     }
///     .scope_boxed()
/// })
/// .await?;
/// ```
pub(crate) async fn with_connection<'b, T, F>(
    pool: &DbPool,
    ctx: &Context,
    operation: F,
) -> Result<T, StoreError>
where
    T: Send + 'b,
    F: for<'r> FnOnce(&'r mut AsyncPgConnection) -> ScopedBoxFuture<'b, 'r, QueryResult<T>>
        + Send
        + 'b,
{
    let work = async {
        match ctx.transaction() {
            Some(ambient) => {
                let mut guard = ambient.lock().await?;
                let transaction = guard.downcast_mut::<DieselTransaction>().ok_or_else(|| {
                    StoreError::query("ambient transaction was not opened by the diesel store")
                })?;
                operation(&mut *transaction.conn)
                    .await
                    .map_err(map_diesel_error)
            }
            None => {
                let mut conn = pool.get().await.map_err(map_pool_error)?;
                operation(&mut *conn).await.map_err(map_diesel_error)
            }
        }
    };

    ctx.run_until_cancelled(work)
        .await
        .unwrap_or_else(|| Err(StoreError::cancelled()))
}
