//! Persistence layer for the marketplace core.
//!
//! [`CommerceStore`] is the storage trait every backend implements:
//! single-statement reads and writes plus [`CommerceStore::begin`], which
//! opens a [`StoreTx`] unit of work so one orchestrated operation (a
//! checkout, a cancellation) shares one atomic scope.
//!
//! Two backends ship: [`PostgresStore`] over sqlx for production and
//! [`InMemoryStore`] for tests, with identical semantics including
//! transactional rollback.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use store::{CommerceStore, StoreTx};
