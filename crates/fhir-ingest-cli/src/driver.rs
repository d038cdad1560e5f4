//! Run driver: turns a loaded configuration into one import run.

use anyhow::{Context, Result};
use fhir_ingest_db_memory::MemoryStore;
use fhir_ingest_db_postgres::PostgresStore;
use fhir_ingest_importer::{BundleImporter, RunSummary};
use fhir_ingest_storage::DataAccess;
use tracing::{info, instrument};

use crate::cli::ImportArgs;
use crate::config::{AppConfig, ImportSettings, StorageBackend};

/// Applies `import` arguments on top of the loaded configuration and
/// re-validates it.
pub fn apply_import_args(cfg: &mut AppConfig, args: &ImportArgs) -> Result<(), String> {
    if let Some(dir) = &args.dir {
        cfg.import.data_dir = dir.clone();
    }
    if let Some(policy) = args.policy {
        cfg.import.abort_policy = policy;
    }
    if let Some(extension) = &args.extension {
        cfg.import.extension = extension.clone();
    }
    if args.dry_run {
        cfg.storage.backend = StorageBackend::Memory;
    }
    cfg.validate()
}

/// Opens the configured backend and imports `import.data_dir` into it.
///
/// # Errors
///
/// Fails when the backend cannot be opened, or with the run's
/// [`ImportError`](fhir_ingest_importer::ImportError) under the whole-run
/// policy.
#[instrument(
    skip(cfg),
    fields(backend = cfg.storage.backend.as_str(), dir = %cfg.import.data_dir.display())
)]
pub async fn run_import(cfg: &AppConfig) -> Result<RunSummary> {
    match cfg.storage.backend {
        StorageBackend::Memory => {
            let store = MemoryStore::new();
            let handle = store.handle();
            let summary = import_with(store, &cfg.import).await?;
            info!(
                rows = handle.total_rows().await,
                "Dry run finished, nothing persisted"
            );
            Ok(summary)
        }
        StorageBackend::Postgres => {
            let pg = cfg.storage.postgres.to_backend_config();
            let store = PostgresStore::connect(&pg)
                .await
                .context("Cannot connect to PostgreSQL")?;
            import_with(store, &cfg.import).await
        }
    }
}

/// Imports with an already opened store. The store is closed afterwards.
pub async fn import_with<S: DataAccess>(store: S, settings: &ImportSettings) -> Result<RunSummary> {
    let mut importer = BundleImporter::new(store)
        .with_policy(settings.abort_policy)
        .with_extension(settings.extension.clone());
    let summary = importer.run(&settings.data_dir).await?;
    Ok(summary)
}
