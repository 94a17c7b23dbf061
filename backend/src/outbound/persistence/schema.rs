//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match the migrations under `backend/migrations`.

diesel::table! {
    /// Recorded disbursements.
    disbursements (id) {
        /// Primary key: UUID v4 assigned by the domain.
        id -> Uuid,
        /// Disbursed amount, always positive.
        amount -> Float8,
        /// Insertion timestamp set by the database.
        created_at -> Timestamptz,
    }
}
