//! Internal Diesel row structs for database operations.
//!
//! These types are implementation details of the persistence layer and must
//! never be exposed to the domain.

use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::Disbursement;

use super::schema::disbursements;

/// Insertable struct for recording a disbursement.
#[derive(Debug, Clone, Copy, Insertable)]
#[diesel(table_name = disbursements)]
pub(crate) struct NewDisbursementRow {
    /// Primary key.
    pub id: Uuid,
    /// Disbursed amount.
    pub amount: f64,
}

impl From<&Disbursement> for NewDisbursementRow {
    fn from(disbursement: &Disbursement) -> Self {
        Self {
            id: disbursement.id(),
            amount: disbursement.amount(),
        }
    }
}
