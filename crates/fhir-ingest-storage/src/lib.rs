//! # fhir-ingest-storage
//!
//! Persistence boundary for the fhir-ingest pipeline.
//!
//! This crate defines the [`DataAccess`] port that storage backends implement.
//! It does not contain any implementations - those are provided by
//! `fhir-ingest-db-postgres` and `fhir-ingest-db-memory`.
//!
//! ## Overview
//!
//! A backend owns exactly one live connection for the lifetime of a run and
//! exposes:
//! - a file-level transaction boundary (`begin`, `commit`, `rollback`)
//! - single-row and multi-row inserts driven by an [`InsertStatement`]
//! - a paired two-table insert for encounter participants
//! - `close`, called once when the run ends or aborts
//!
//! ## Example
//!
//! ```ignore
//! use fhir_ingest_storage::{DataAccess, StorageError};
//!
//! async fn write_one(
//!     store: &mut dyn DataAccess,
//!     statement: &InsertStatement,
//!     row: &Row,
//! ) -> Result<(), StorageError> {
//!     store.begin().await?;
//!     store.execute(statement, row).await?;
//!     store.commit().await
//! }
//! ```
//!
//! [`InsertStatement`]: fhir_ingest_core::InsertStatement

mod error;
mod traits;

pub use error::{ErrorCategory, StorageError};
pub use traits::DataAccess;

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Type alias for a boxed port trait object.
pub type DynDataAccess = Box<dyn DataAccess>;
