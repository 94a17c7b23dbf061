//! PostgreSQL-backed `DisbursementRepository` adapter.

use async_trait::async_trait;
use diesel_async::RunQueryDsl;
use diesel_async::scoped_futures::ScopedFutureExt;
use tracing::debug;

use crate::domain::ports::{DisbursementRepository, StoreError};
use crate::domain::{Context, Disbursement};

use super::diesel_store::with_connection;
use super::models::NewDisbursementRow;
use super::pool::DbPool;
use super::schema::disbursements;

/// Diesel-backed implementation of the disbursement repository.
///
/// Inserts join the ambient transaction when the context carries one.
#[derive(Clone)]
pub struct DieselDisbursementRepository {
    pool: DbPool,
}

impl DieselDisbursementRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DisbursementRepository for DieselDisbursementRepository {
    async fn create_disbursement(
        &self,
        ctx: &Context,
        disbursement: &Disbursement,
    ) -> Result<(), StoreError> {
        let row = NewDisbursementRow::from(disbursement);
        let inserted = with_connection(&self.pool, ctx, move |conn| {
            async move {
                diesel::insert_into(disbursements::table)
                    .values(row)
                    .execute(conn)
                    .await
            }
            .scope_boxed()
        })
        .await?;

        debug!(
            id = %row.id,
            inserted,
            in_transaction = ctx.transaction().is_some(),
            "disbursement recorded"
        );
        Ok(())
    }
}
