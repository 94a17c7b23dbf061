//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! # Architecture
//!
//! - **Thin adapters**: repositories only translate between Diesel rows and
//!   domain types.
//! - **Internal models**: row structs (`models.rs`) and table definitions
//!   (`schema.rs`) never leave this module.
//! - **Ambient transactions**: [`DieselStore`] implements the domain's
//!   `TransactionalStore`; repositories run on the transaction the context
//!   carries, or on a pooled connection outside one.
//! - **Strongly typed errors**: Diesel and pool failures become `StoreError`.
//!
//! # Example
//!
//! ```ignore
//! use disbursement::outbound::persistence::{
//!     DbPool, DieselDisbursementRepository, DieselStore, PoolConfig,
//! };
//!
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/payments")).await?;
//! let store = DieselStore::new(pool.clone());
//! let repository = DieselDisbursementRepository::new(pool);
//! ```

mod diesel_disbursement_repository;
mod diesel_error_mapping;
mod diesel_store;
mod migrations;
mod models;
mod pool;
mod schema;

pub use diesel_disbursement_repository::DieselDisbursementRepository;
pub use diesel_store::{DieselStore, DieselTransaction};
pub use migrations::{MigrationError, run_migrations};
pub use pool::{DbPool, PoolConfig, PoolError};
