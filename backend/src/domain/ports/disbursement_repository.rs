//! Port for disbursement persistence.

use async_trait::async_trait;

use crate::domain::{Context, Disbursement};

use super::StoreError;

/// Port for writing disbursements.
///
/// Implementations run inside the ambient transaction when `ctx` carries one.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DisbursementRepository: Send + Sync {
    /// Persist a new disbursement.
    async fn create_disbursement(
        &self,
        ctx: &Context,
        disbursement: &Disbursement,
    ) -> Result<(), StoreError>;
}
