//! The bundle importer: per-file transactions, entry dispatch and the abort policy.

use std::path::{Path, PathBuf};

use fhir_ingest_core::{Bundle, InsertStatement, MappingError, Resource, ResourceKind, Row};
use fhir_ingest_storage::{DataAccess, StorageError};
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use crate::context::ImportContext;
use crate::discover::discover_bundle_files;
use crate::error::{ImportError, Location};
use crate::mappers::{
    AddressMapper, ConditionMapper, EncounterMapper, EntityMapper, IdentifierMapper,
    LanguageMapper, NameMapper, ObservationMapper, ParticipantMapper, PatientMapper,
    SubEntityMapper, TelecomMapper,
};
use crate::policy::AbortPolicy;
use crate::report::{FileFailure, FileReport, RowCounts, RunSummary};

/// Default bundle file extension.
pub const DEFAULT_EXTENSION: &str = "json";

/// Imports bundle files into a [`DataAccess`] store.
///
/// Files are processed strictly one after another, entries in file order.
/// Each file runs in its own store transaction.
///
/// # Example
///
/// ```ignore
/// use fhir_ingest_db_memory::MemoryStore;
/// use fhir_ingest_importer::{AbortPolicy, BundleImporter};
///
/// let mut importer = BundleImporter::new(MemoryStore::new()).with_policy(AbortPolicy::PerFile);
/// let summary = importer.run(Path::new("data")).await?;
/// println!("{} files imported", summary.files_imported());
/// ```
#[derive(Debug)]
pub struct BundleImporter<S> {
    store: S,
    policy: AbortPolicy,
    extension: String,
}

/// Position of the entry being imported, for error reporting.
#[derive(Clone, Copy)]
struct EntryScope<'a> {
    path: &'a Path,
    index: usize,
}

impl EntryScope<'_> {
    fn mapping(&self, err: MappingError) -> ImportError {
        ImportError::field_mapping(self.path, self.index, err)
    }

    fn persistence(&self, err: StorageError) -> ImportError {
        ImportError::persistence(Location::entry(self.path, self.index), err)
    }
}

impl<S: DataAccess> BundleImporter<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            policy: AbortPolicy::default(),
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: AbortPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the extension of the files [`run`](Self::run) picks up.
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn policy(&self) -> AbortPolicy {
        self.policy
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Imports every bundle file in `dir` and closes the store.
    ///
    /// # Errors
    ///
    /// Under [`AbortPolicy::WholeRun`] returns the first error; the store is
    /// closed and later files are not touched. Under [`AbortPolicy::PerFile`]
    /// only directory listing and close failures are returned; failing files
    /// are listed in the summary instead.
    #[instrument(
        skip(self),
        fields(dir = %dir.display(), policy = %self.policy, backend = self.store.backend_name())
    )]
    pub async fn run(&mut self, dir: &Path) -> Result<RunSummary, ImportError> {
        let files = match discover_bundle_files(dir, &self.extension).await {
            Ok(files) => files,
            Err(err) => {
                error!(error = %err, "Cannot list bundle directory");
                self.close_after_abort().await;
                return Err(err);
            }
        };
        info!(files = files.len(), "Starting import run");
        self.import_files(&files).await
    }

    /// Imports `files` in the given order and closes the store.
    ///
    /// # Errors
    ///
    /// Same as [`run`](Self::run).
    pub async fn import_files(&mut self, files: &[PathBuf]) -> Result<RunSummary, ImportError> {
        let mut summary = RunSummary::new(self.policy);

        for path in files {
            match self.import_file(path).await {
                Ok(report) => summary.imported.push(report),
                Err(err) => match self.policy {
                    AbortPolicy::WholeRun => {
                        error!(
                            file = %path.display(),
                            category = %err.category(),
                            error = %err,
                            imported = summary.files_imported(),
                            "Import aborted"
                        );
                        self.close_after_abort().await;
                        return Err(err);
                    }
                    AbortPolicy::PerFile => {
                        warn!(
                            file = %path.display(),
                            category = %err.category(),
                            error = %err,
                            "File rolled back, continuing with next file"
                        );
                        summary.failed.push(FileFailure {
                            path: path.clone(),
                            error: err,
                        });
                    }
                },
            }
        }

        self.store
            .close()
            .await
            .map_err(|e| ImportError::persistence(Location::run(), e))?;

        info!(
            imported = summary.files_imported(),
            failed = summary.files_failed(),
            rows = summary.rows().total(),
            "Import run finished"
        );
        Ok(summary)
    }

    /// Imports one bundle file in its own transaction.
    ///
    /// The store must be open. On any error the file's transaction is rolled
    /// back and the store stays open; the abort policy is applied by the
    /// caller.
    ///
    /// # Errors
    ///
    /// Returns the first [`ImportError`] raised while reading, decoding,
    /// mapping or writing the file.
    #[instrument(skip(self), fields(file = %path.display()))]
    pub async fn import_file(&mut self, path: &Path) -> Result<FileReport, ImportError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ImportError::io(Location::file(path), e))?;
        let bundle = Bundle::from_slice(&bytes).map_err(|e| ImportError::decode(path, e))?;

        self.store
            .begin()
            .await
            .map_err(|e| ImportError::persistence(Location::file(path), e))?;

        let outcome = match self.import_entries(path, &bundle).await {
            Ok(report) => self
                .store
                .commit()
                .await
                .map(|()| report)
                .map_err(|e| ImportError::persistence(Location::file(path), e)),
            Err(err) => Err(err),
        };

        match &outcome {
            Ok(report) => info!(
                entries = report.entries,
                skipped = report.skipped,
                rows = report.rows.total(),
                "Bundle imported"
            ),
            Err(_) => {
                if let Err(e) = self.store.rollback().await {
                    warn!(error = %e, "Rollback failed");
                }
            }
        }
        outcome
    }

    async fn import_entries(
        &mut self,
        path: &Path,
        bundle: &Bundle,
    ) -> Result<FileReport, ImportError> {
        let mut ctx = ImportContext::new();
        let mut report = FileReport::new(path, bundle.len());

        for entry in &bundle.entries {
            let scope = EntryScope {
                path,
                index: entry.index,
            };

            match &entry.resource {
                Resource::Patient(resource) => {
                    let patient_id = self.import_patient(scope, resource, &mut report.rows).await?;
                    ctx.set_active_patient(patient_id);
                }
                Resource::Encounter(resource) => {
                    let patient_id = active_patient(&ctx, scope, ResourceKind::Encounter)?;
                    self.import_encounter(scope, patient_id, resource, &mut report.rows)
                        .await?;
                }
                Resource::Observation(resource) => {
                    let patient_id = active_patient(&ctx, scope, ResourceKind::Observation)?;
                    let row = ObservationMapper
                        .map(patient_id, resource)
                        .map_err(|e| scope.mapping(e))?;
                    self.write_row(scope, ObservationMapper.statement(), &row, &mut report.rows)
                        .await?;
                }
                Resource::Condition(resource) => {
                    let patient_id = active_patient(&ctx, scope, ResourceKind::Condition)?;
                    let row = ConditionMapper
                        .map(patient_id, resource)
                        .map_err(|e| scope.mapping(e))?;
                    self.write_row(scope, ConditionMapper.statement(), &row, &mut report.rows)
                        .await?;
                }
                Resource::Other { resource_type, .. } => {
                    debug!(
                        entry = entry.index,
                        resource_type = resource_type.as_str(),
                        "Entry skipped"
                    );
                    report.skipped += 1;
                    continue;
                }
            }

            debug!(
                entry = entry.index,
                kind = %entry.resource.kind(),
                patient = ctx.active_patient().unwrap_or("-"),
                "Entry imported"
            );
        }

        Ok(report)
    }

    /// Writes the patient row and its sub-records; returns the patient id.
    async fn import_patient(
        &mut self,
        scope: EntryScope<'_>,
        resource: &Value,
        counts: &mut RowCounts,
    ) -> Result<String, ImportError> {
        let row = PatientMapper
            .map(&(), resource)
            .map_err(|e| scope.mapping(e))?;
        let patient_id = row
            .text("id")
            .map(str::to_owned)
            .ok_or_else(|| scope.mapping(MappingError::missing(PatientMapper::ENTITY, "id")))?;

        let sub_records = [
            sub_rows(scope, AddressMapper, &patient_id, resource)?,
            sub_rows(scope, NameMapper, &patient_id, resource)?,
            sub_rows(scope, LanguageMapper, &patient_id, resource)?,
            sub_rows(scope, TelecomMapper, &patient_id, resource)?,
            sub_rows(scope, IdentifierMapper, &patient_id, resource)?,
        ];

        self.write_row(scope, PatientMapper.statement(), &row, counts)
            .await?;
        for (statement, rows) in &sub_records {
            self.store
                .execute_many(statement, rows)
                .await
                .map_err(|e| scope.persistence(e))?;
            counts.add(statement.table(), rows.len());
        }

        Ok(patient_id)
    }

    async fn import_encounter(
        &mut self,
        scope: EntryScope<'_>,
        patient_id: &str,
        resource: &Value,
        counts: &mut RowCounts,
    ) -> Result<(), ImportError> {
        let row = EncounterMapper
            .map(patient_id, resource)
            .map_err(|e| scope.mapping(e))?;
        let encounter_id = row
            .text("id")
            .ok_or_else(|| scope.mapping(MappingError::missing(EncounterMapper::ENTITY, "id")))?;
        let batch = ParticipantMapper
            .map(patient_id, encounter_id, resource)
            .map_err(|e| scope.mapping(e))?;

        self.write_row(scope, EncounterMapper.statement(), &row, counts)
            .await?;
        self.store
            .insert_participants(&batch)
            .await
            .map_err(|e| scope.persistence(e))?;
        counts.add(batch.participant_statement.table(), batch.participants.len());
        counts.add(
            batch.link_statement.table(),
            batch.encounter_participants.len(),
        );
        Ok(())
    }

    async fn write_row(
        &mut self,
        scope: EntryScope<'_>,
        statement: &InsertStatement,
        row: &Row,
        counts: &mut RowCounts,
    ) -> Result<(), ImportError> {
        self.store
            .execute(statement, row)
            .await
            .map_err(|e| scope.persistence(e))?;
        counts.add(statement.table(), 1);
        Ok(())
    }

    async fn close_after_abort(&mut self) {
        if let Err(e) = self.store.close().await {
            warn!(error = %e, "Failed to close store after abort");
        }
    }
}

fn active_patient<'c>(
    ctx: &'c ImportContext,
    scope: EntryScope<'_>,
    kind: ResourceKind,
) -> Result<&'c str, ImportError> {
    ctx.active_patient()
        .ok_or_else(|| ImportError::missing_patient_context(scope.path, scope.index, kind))
}

fn sub_rows<M: SubEntityMapper>(
    scope: EntryScope<'_>,
    mapper: M,
    patient_id: &str,
    resource: &Value,
) -> Result<(&'static InsertStatement, Vec<Row>), ImportError> {
    let rows = mapper
        .map(patient_id, resource)
        .map_err(|e| scope.mapping(e))?;
    Ok((mapper.statement(), rows))
}
