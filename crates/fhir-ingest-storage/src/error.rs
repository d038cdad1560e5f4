//! Storage error types for the data-access port.

use std::fmt;

use fhir_ingest_core::RowError;

/// Errors that can occur while persisting rows.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A row with the same primary key already exists.
    #[error("Duplicate key in {table}: {key}")]
    AlreadyExists {
        /// Destination table.
        table: String,
        /// Primary key value that collided.
        key: String,
    },

    /// A foreign key points at a row that does not exist.
    #[error("Foreign key violation: {table}.{column} = {value} has no parent row")]
    ForeignKeyViolation {
        /// Table of the rejected row.
        table: String,
        /// Referencing column.
        column: String,
        /// The dangling value.
        value: String,
    },

    /// Any other constraint the store enforces (not-null, check, unknown column).
    #[error("Constraint violation: {message}")]
    ConstraintViolation {
        /// Description of the violated constraint.
        message: String,
    },

    /// An error occurred while opening, committing or rolling back a transaction.
    #[error("Transaction error: {message}")]
    TransactionError {
        /// Description of the transaction error.
        message: String,
    },

    /// Failed to reach the store.
    #[error("Connection error: {message}")]
    ConnectionError {
        /// Description of the connection error.
        message: String,
    },

    /// The port was used after `close`.
    #[error("Connection already closed")]
    Closed,

    /// An internal storage error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl StorageError {
    /// Creates a new `AlreadyExists` error.
    #[must_use]
    pub fn already_exists(table: impl Into<String>, key: impl Into<String>) -> Self {
        Self::AlreadyExists {
            table: table.into(),
            key: key.into(),
        }
    }

    /// Creates a new `ForeignKeyViolation` error.
    #[must_use]
    pub fn foreign_key_violation(
        table: impl Into<String>,
        column: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::ForeignKeyViolation {
            table: table.into(),
            column: column.into(),
            value: value.into(),
        }
    }

    /// Creates a new `ConstraintViolation` error.
    #[must_use]
    pub fn constraint_violation(message: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            message: message.into(),
        }
    }

    /// Creates a new `TransactionError` error.
    #[must_use]
    pub fn transaction_error(message: impl Into<String>) -> Self {
        Self::TransactionError {
            message: message.into(),
        }
    }

    /// Creates a new `ConnectionError` error.
    #[must_use]
    pub fn connection_error(message: impl Into<String>) -> Self {
        Self::ConnectionError {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a duplicate key error.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Returns `true` for foreign key violations.
    #[must_use]
    pub fn is_foreign_key_violation(&self) -> bool {
        matches!(self, Self::ForeignKeyViolation { .. })
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::AlreadyExists { .. } => ErrorCategory::Conflict,
            Self::ForeignKeyViolation { .. } | Self::ConstraintViolation { .. } => {
                ErrorCategory::Constraint
            }
            Self::TransactionError { .. } => ErrorCategory::Transaction,
            Self::ConnectionError { .. } | Self::Closed => ErrorCategory::Infrastructure,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

impl From<RowError> for StorageError {
    fn from(err: RowError) -> Self {
        Self::constraint_violation(err.to_string())
    }
}

/// Categories of storage errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Duplicate primary key.
    Conflict,
    /// Foreign key, not-null or other constraint.
    Constraint,
    /// Transaction-related error.
    Transaction,
    /// Infrastructure/connection error.
    Infrastructure,
    /// Internal error.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conflict => write!(f, "conflict"),
            Self::Constraint => write!(f, "constraint"),
            Self::Transaction => write!(f, "transaction"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
