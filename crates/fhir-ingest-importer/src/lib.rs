//! # fhir-ingest-importer
//!
//! Imports directories of FHIR bundle files into a relational store.
//!
//! ## Overview
//!
//! - [`BundleImporter`] walks bundle files in sorted order, one store
//!   transaction per file, and dispatches every entry to its mapper.
//! - [`ImportContext`] carries the active patient from a Patient entry to the
//!   Encounter, Observation and Condition entries that follow it.
//! - [`mappers`] hold the pure resource-to-row conversions.
//! - [`AbortPolicy`] decides whether a failing file stops the run.
//!
//! ## Example
//!
//! ```ignore
//! use fhir_ingest_db_postgres::{PostgresConfig, PostgresStore};
//! use fhir_ingest_importer::BundleImporter;
//!
//! let store = PostgresStore::connect(&PostgresConfig::new(url)).await?;
//! let summary = BundleImporter::new(store).run(Path::new("output/fhir")).await?;
//! for (table, rows) in summary.rows().iter() {
//!     println!("{table}: {rows}");
//! }
//! ```

mod context;
mod discover;
mod error;
mod importer;
pub mod mappers;
mod policy;
mod report;

pub use context::ImportContext;
pub use discover::discover_bundle_files;
pub use error::{ImportError, Location};
pub use importer::{BundleImporter, DEFAULT_EXTENSION};
pub use policy::{AbortPolicy, ParsePolicyError};
pub use report::{FileFailure, FileReport, RowCounts, RunSummary};

pub use fhir_ingest_core::ErrorCategory;
