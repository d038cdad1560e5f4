//! The data-access port that every persistence backend implements.

use async_trait::async_trait;
use fhir_ingest_core::{InsertStatement, ParticipantBatch, Row};

use crate::error::StorageError;

/// Owns the single store connection used by an import run.
///
/// The importer drives a port strictly sequentially: `begin` once per file,
/// any number of inserts, then either `commit` or `rollback`. `close` is
/// called exactly once when the run ends, including after an abort.
///
/// Implementations must reject inserts outside an open transaction with
/// [`StorageError::TransactionError`] and any call after `close` with
/// [`StorageError::Closed`].
///
/// # Example
///
/// ```ignore
/// use fhir_ingest_storage::DataAccess;
///
/// async fn write_file(store: &mut dyn DataAccess, stmt: &InsertStatement, rows: &[Row]) {
///     store.begin().await?;
///     if let Err(e) = store.execute_many(stmt, rows).await {
///         store.rollback().await?;
///         return Err(e);
///     }
///     store.commit().await?;
/// }
/// ```
#[async_trait]
pub trait DataAccess: Send {
    /// Opens the transaction that scopes one bundle file.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::TransactionError` if a transaction is already open.
    async fn begin(&mut self) -> Result<(), StorageError>;

    /// Executes a single-row insert.
    ///
    /// Columns the row leaves out are written as NULL.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` on a duplicate primary key unless
    /// the statement skips conflicts, `StorageError::ForeignKeyViolation` for
    /// a dangling reference and `StorageError::ConstraintViolation` for other
    /// rejected rows.
    async fn execute(
        &mut self,
        statement: &InsertStatement,
        row: &Row,
    ) -> Result<(), StorageError>;

    /// Executes one statement for each row, in order.
    ///
    /// An empty slice performs no store operation at all.
    ///
    /// # Errors
    ///
    /// Fails on the first rejected row with the same errors as [`execute`].
    ///
    /// [`execute`]: DataAccess::execute
    async fn execute_many(
        &mut self,
        statement: &InsertStatement,
        rows: &[Row],
    ) -> Result<(), StorageError>;

    /// Writes practitioner rows and their encounter links as one unit.
    ///
    /// Either both groups are written or neither is. Duplicate practitioner
    /// rows are skipped silently; link rows are not.
    ///
    /// # Errors
    ///
    /// Same as [`execute_many`], for whichever group fails first.
    ///
    /// [`execute_many`]: DataAccess::execute_many
    async fn insert_participants(&mut self, batch: &ParticipantBatch) -> Result<(), StorageError>;

    /// Makes every write since `begin` durable.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::TransactionError` when no transaction is open.
    async fn commit(&mut self) -> Result<(), StorageError>;

    /// Discards every write since `begin`.
    ///
    /// A rollback without an open transaction is a no-op.
    async fn rollback(&mut self) -> Result<(), StorageError>;

    /// Releases the connection. Any open transaction is rolled back first.
    ///
    /// Closing twice is a no-op.
    async fn close(&mut self) -> Result<(), StorageError>;

    /// Returns a static name for the backend, used in logs.
    fn backend_name(&self) -> &'static str;
}
