//! Diesel and pool failures mapped onto [`StoreError`].
//!
//! Driver text is carried through verbatim: the cancellation normaliser in
//! the domain matches on it.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::debug;

use crate::domain::ports::StoreError;

use super::pool::PoolError;

/// Map pool failures to connection errors.
pub(crate) fn map_pool_error(error: PoolError) -> StoreError {
    StoreError::connection(error.message().to_owned())
}

/// Map Diesel failures to store errors.
pub(crate) fn map_diesel_error(error: DieselError) -> StoreError {
    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), "diesel operation failed");
        }
        _ => debug!(
            error_type = %std::any::type_name_of_val(&error),
            error = %error,
            "diesel operation failed"
        ),
    }

    match error {
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, info) => {
            StoreError::connection(info.message().to_owned())
        }
        DieselError::DatabaseError(_, info) => StoreError::query(info.message().to_owned()),
        DieselError::NotFound => StoreError::query("record not found"),
        DieselError::NotInTransaction => StoreError::transaction_finished(),
        other => StoreError::query(other.to_string()),
    }
}
