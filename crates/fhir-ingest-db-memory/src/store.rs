use std::sync::Arc;

use async_trait::async_trait;
use fhir_ingest_core::{InsertStatement, ParticipantBatch, Row};
use fhir_ingest_storage::{DataAccess, StorageError};
use tokio::sync::RwLock;
use tracing::trace;

use crate::tables::{Pending, Tables};

/// Counters for the transactions a store has seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionStats {
    pub total_transactions: u64,
    pub committed_transactions: u64,
    pub rolled_back_transactions: u64,
    pub total_operations: u64,
}

#[derive(Debug, Default)]
struct Shared {
    committed: Tables,
    stats: TransactionStats,
    closed: bool,
}

/// Transactional in-memory implementation of [`DataAccess`].
///
/// Writes of a transaction are held as a pending delta, checked against the
/// committed tables and their own earlier rows, and appended to the committed
/// tables on `commit`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    shared: Arc<RwLock<Shared>>,
    pending: Option<Pending>,
    operations: u64,
}

/// Read-only view of a [`MemoryStore`] that outlives moving the store itself.
#[derive(Debug, Clone)]
pub struct MemoryHandle {
    shared: Arc<RwLock<Shared>>,
}

impl MemoryHandle {
    /// Copy of the committed tables.
    pub async fn snapshot(&self) -> Tables {
        self.shared.read().await.committed.clone()
    }

    pub async fn count(&self, table: &str) -> usize {
        self.shared.read().await.committed.count(table)
    }

    /// Committed rows across all tables, without copying them.
    pub async fn total_rows(&self) -> usize {
        self.shared.read().await.committed.total_rows()
    }

    pub async fn stats(&self) -> TransactionStats {
        self.shared.read().await.stats
    }

    pub async fn is_closed(&self) -> bool {
        self.shared.read().await.closed
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with committed rows.
    pub fn with_tables(tables: Tables) -> Self {
        Self {
            shared: Arc::new(RwLock::new(Shared {
                committed: tables,
                ..Shared::default()
            })),
            ..Self::default()
        }
    }

    pub fn handle(&self) -> MemoryHandle {
        MemoryHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn in_transaction(&self) -> bool {
        self.pending.is_some()
    }

    async fn insert_all(
        &mut self,
        statement: &InsertStatement,
        rows: &[Row],
    ) -> Result<(), StorageError> {
        let shared = self.shared.read().await;
        if shared.closed {
            return Err(StorageError::Closed);
        }
        let pending = self
            .pending
            .as_mut()
            .ok_or_else(|| StorageError::transaction_error("no transaction in progress"))?;
        for row in rows {
            if !pending.insert(&shared.committed, statement, row)? {
                trace!(table = statement.table(), "conflicting row skipped");
            }
        }
        self.operations += rows.len() as u64;
        Ok(())
    }
}

#[async_trait]
impl DataAccess for MemoryStore {
    async fn begin(&mut self) -> Result<(), StorageError> {
        let mut shared = self.shared.write().await;
        if shared.closed {
            return Err(StorageError::Closed);
        }
        if self.pending.is_some() {
            return Err(StorageError::transaction_error(
                "transaction already in progress",
            ));
        }
        shared.stats.total_transactions += 1;
        self.pending = Some(Pending::default());
        self.operations = 0;
        Ok(())
    }

    async fn execute(
        &mut self,
        statement: &InsertStatement,
        row: &Row,
    ) -> Result<(), StorageError> {
        self.insert_all(statement, std::slice::from_ref(row)).await
    }

    async fn execute_many(
        &mut self,
        statement: &InsertStatement,
        rows: &[Row],
    ) -> Result<(), StorageError> {
        if rows.is_empty() {
            return Ok(());
        }
        self.insert_all(statement, rows).await
    }

    async fn insert_participants(&mut self, batch: &ParticipantBatch) -> Result<(), StorageError> {
        if batch.is_empty() {
            return Ok(());
        }
        // insert_all reports a missing transaction or a closed store
        let savepoint = self.pending.as_ref().map(Pending::mark).unwrap_or_default();
        let result = async {
            self.insert_all(batch.participant_statement, &batch.participants)
                .await?;
            self.insert_all(batch.link_statement, &batch.encounter_participants)
                .await
        }
        .await;
        if result.is_err()
            && let Some(pending) = self.pending.as_mut()
        {
            pending.rollback_to(savepoint);
        }
        result
    }

    async fn commit(&mut self) -> Result<(), StorageError> {
        let mut shared = self.shared.write().await;
        if shared.closed {
            return Err(StorageError::Closed);
        }
        let pending = self
            .pending
            .take()
            .ok_or_else(|| StorageError::transaction_error("no transaction in progress"))?;
        shared.committed.append(pending.into_writes());
        shared.stats.committed_transactions += 1;
        shared.stats.total_operations += self.operations;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StorageError> {
        if self.pending.take().is_some() {
            let mut shared = self.shared.write().await;
            shared.stats.rolled_back_transactions += 1;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), StorageError> {
        self.rollback().await?;
        self.shared.write().await.closed = true;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
