//! In-memory backend for fhir-ingest.
//!
//! [`MemoryStore`] implements the `DataAccess` port over plain tables held in
//! memory. It honours the same transaction boundaries and enforces the same
//! primary key, foreign key and not-null constraints as the relational
//! schema, so it backs both the test suite and `--dry-run` imports.
//!
//! # Example
//!
//! ```ignore
//! use fhir_ingest_db_memory::MemoryStore;
//!
//! let store = MemoryStore::new();
//! let handle = store.handle();
//! // ... hand `store` to the importer ...
//! let tables = handle.snapshot().await;
//! assert_eq!(tables.count("patient"), 1);
//! ```

mod store;
mod tables;

pub use fhir_ingest_storage::{DataAccess, StorageError};
pub use store::{MemoryHandle, MemoryStore, TransactionStats};
pub use tables::Tables;
