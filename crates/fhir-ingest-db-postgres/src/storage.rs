//! PostgreSQL implementation of the data-access port.

use async_trait::async_trait;
use fhir_ingest_core::{FieldValue, InsertStatement, ParticipantBatch, Row};
use fhir_ingest_storage::{DataAccess, StorageError};
use sqlx_core::connection::Connection;
use sqlx_core::query::Query;
use sqlx_postgres::{PgArguments, PgConnection, PgPool, PgTransaction, Postgres};
use tracing::{debug, info, instrument, warn};

use crate::config::PostgresConfig;
use crate::error::{self, Result};
use crate::{migrations, pool};

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

/// PostgreSQL backend holding the pool and the transaction of the file being imported.
///
/// The open transaction is stored as `PgTransaction<'static>` (obtained from
/// the pool) so it can live across port calls without a lifetime parameter.
pub struct PostgresStore {
    pool: PgPool,
    tx: Option<PgTransaction<'static>>,
    closed: bool,
}

impl std::fmt::Debug for PostgresStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresStore")
            .field("in_transaction", &self.tx.is_some())
            .field("closed", &self.closed)
            .finish()
    }
}

impl PostgresStore {
    /// Connects to PostgreSQL and runs the embedded migrations if configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails or a migration fails.
    #[instrument(skip(config), fields(url = %pool::mask_password(&config.url)))]
    pub async fn connect(config: &PostgresConfig) -> Result<Self> {
        let pool = pool::create_pool(config).await?;
        pool::test_connection(&pool).await?;

        if config.run_migrations {
            migrations::run(&pool).await?;
        }

        info!("PostgreSQL backend ready");
        Ok(Self::from_pool(pool))
    }

    /// Wraps an existing pool. The schema is expected to exist.
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            tx: None,
            closed: false,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn ensure_open(&self) -> std::result::Result<(), StorageError> {
        if self.closed {
            return Err(StorageError::Closed);
        }
        Ok(())
    }

    fn transaction(&mut self) -> std::result::Result<&mut PgTransaction<'static>, StorageError> {
        self.ensure_open()?;
        self.tx
            .as_mut()
            .ok_or_else(|| StorageError::transaction_error("no transaction in progress"))
    }
}

fn bind_value<'q>(query: PgQuery<'q>, value: Option<&FieldValue>) -> PgQuery<'q> {
    match value {
        None | Some(FieldValue::Null) => query.bind(None::<String>),
        Some(FieldValue::Text(s)) => query.bind(s.clone()),
        Some(FieldValue::Bool(b)) => query.bind(*b),
        Some(FieldValue::Integer(i)) => query.bind(*i),
        Some(FieldValue::Number(n)) => query.bind(*n),
    }
}

async fn insert_rows(
    conn: &mut PgConnection,
    statement: &InsertStatement,
    rows: &[Row],
) -> std::result::Result<(), StorageError> {
    let sql = statement.positional_sql();

    for row in rows {
        statement.check_row(row)?;

        let mut query = sqlx_core::query::query::<Postgres>(&sql);
        for (_, value) in statement.bind_values(row) {
            query = bind_value(query, value);
        }

        query.execute(&mut *conn).await.map_err(|e| {
            let key = statement.primary_key_column().and_then(|pk| row.text(pk));
            error::insert_error(e, statement.table(), key)
        })?;
    }

    debug!(table = statement.table(), rows = rows.len(), "Rows inserted");
    Ok(())
}

#[async_trait]
impl DataAccess for PostgresStore {
    async fn begin(&mut self) -> std::result::Result<(), StorageError> {
        self.ensure_open()?;
        if self.tx.is_some() {
            return Err(StorageError::transaction_error(
                "transaction already in progress",
            ));
        }
        let tx = self.pool.begin().await.map_err(|e| {
            StorageError::transaction_error(format!("Failed to begin transaction: {e}"))
        })?;
        self.tx = Some(tx);
        Ok(())
    }

    async fn execute(
        &mut self,
        statement: &InsertStatement,
        row: &Row,
    ) -> std::result::Result<(), StorageError> {
        let tx = self.transaction()?;
        insert_rows(&mut **tx, statement, std::slice::from_ref(row)).await
    }

    async fn execute_many(
        &mut self,
        statement: &InsertStatement,
        rows: &[Row],
    ) -> std::result::Result<(), StorageError> {
        if rows.is_empty() {
            return Ok(());
        }
        let tx = self.transaction()?;
        insert_rows(&mut **tx, statement, rows).await
    }

    async fn insert_participants(
        &mut self,
        batch: &ParticipantBatch,
    ) -> std::result::Result<(), StorageError> {
        if batch.is_empty() {
            return Ok(());
        }
        let tx = self.transaction()?;

        // nested begin on an open transaction issues a SAVEPOINT
        let mut savepoint = Connection::begin(&mut **tx).await.map_err(|e| {
            StorageError::transaction_error(format!("Failed to create savepoint: {e}"))
        })?;

        let result = async {
            insert_rows(
                &mut savepoint,
                batch.participant_statement,
                &batch.participants,
            )
            .await?;
            insert_rows(
                &mut savepoint,
                batch.link_statement,
                &batch.encounter_participants,
            )
            .await
        }
        .await;

        match result {
            Ok(()) => savepoint.commit().await.map_err(|e| {
                StorageError::transaction_error(format!("Failed to release savepoint: {e}"))
            }),
            Err(err) => {
                if let Err(e) = savepoint.rollback().await {
                    warn!(error = %e, "Failed to roll back participant savepoint");
                }
                Err(err)
            }
        }
    }

    async fn commit(&mut self) -> std::result::Result<(), StorageError> {
        self.ensure_open()?;
        let tx = self
            .tx
            .take()
            .ok_or_else(|| StorageError::transaction_error("no transaction in progress"))?;
        tx.commit().await.map_err(|e| {
            StorageError::transaction_error(format!("Failed to commit transaction: {e}"))
        })?;
        debug!("Transaction committed");
        Ok(())
    }

    async fn rollback(&mut self) -> std::result::Result<(), StorageError> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await.map_err(|e| {
                StorageError::transaction_error(format!("Failed to rollback transaction: {e}"))
            })?;
            debug!("Transaction rolled back");
        }
        Ok(())
    }

    async fn close(&mut self) -> std::result::Result<(), StorageError> {
        if self.closed {
            return Ok(());
        }
        let rollback = self.rollback().await;
        self.pool.close().await;
        self.closed = true;
        info!("PostgreSQL connection closed");
        rollback
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
