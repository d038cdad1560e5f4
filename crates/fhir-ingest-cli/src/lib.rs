//! # fhir-ingest-cli
//!
//! The `fhir-ingest` binary: configuration loading, logging setup and the run
//! driver around [`fhir_ingest_importer::BundleImporter`].

pub mod cli;
pub mod config;
pub mod driver;
pub mod observability;
pub mod output;

/// Process exit status when the import run failed.
pub const EXIT_IMPORT_FAILURE: u8 = 1;

/// Process exit status when the configuration could not be loaded.
pub const EXIT_CONFIG_ERROR: u8 = 2;
