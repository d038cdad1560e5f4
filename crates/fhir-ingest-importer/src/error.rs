//! Import error types.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use fhir_ingest_core::{DecodeError, ErrorCategory, MappingError, ResourceKind};
use fhir_ingest_storage::StorageError;

/// Where in a run an error occurred.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    pub path: Option<PathBuf>,
    pub entry_index: Option<usize>,
}

impl Location {
    pub fn file(path: &Path) -> Self {
        Self {
            path: Some(path.to_path_buf()),
            entry_index: None,
        }
    }

    pub fn entry(path: &Path, entry_index: usize) -> Self {
        Self {
            path: Some(path.to_path_buf()),
            entry_index: Some(entry_index),
        }
    }

    /// Errors that belong to the run rather than a single file.
    pub fn run() -> Self {
        Self::default()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.path, self.entry_index) {
            (Some(path), Some(idx)) => write!(f, "{} entry {idx}", path.display()),
            (Some(path), None) => write!(f, "{}", path.display()),
            (None, Some(idx)) => write!(f, "entry {idx}"),
            (None, None) => write!(f, "run"),
        }
    }
}

/// Failure while importing a bundle file.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// The file or directory could not be read.
    #[error("I/O error at {location}: {source}")]
    Io {
        location: Location,
        #[source]
        source: io::Error,
    },

    /// The file is not a valid bundle.
    #[error("Invalid bundle at {location}: {source}")]
    Decode {
        location: Location,
        #[source]
        source: DecodeError,
    },

    /// A dependent resource appeared before any Patient entry of its file.
    #[error("{resource_type} at {location} has no active patient")]
    MissingPatientContext {
        location: Location,
        resource_type: ResourceKind,
    },

    /// A mapper could not extract a required field.
    #[error("Cannot map {location}: {source}")]
    FieldMapping {
        location: Location,
        #[source]
        source: MappingError,
    },

    /// The store rejected a write or transaction operation.
    #[error("Store rejected {location}: {source}")]
    Persistence {
        location: Location,
        #[source]
        source: StorageError,
    },
}

impl ImportError {
    pub fn io(location: Location, source: io::Error) -> Self {
        Self::Io { location, source }
    }

    /// Decode failure of `path`; entry-level decode errors keep their index.
    pub fn decode(path: &Path, source: DecodeError) -> Self {
        let location = match source.entry_index() {
            Some(idx) => Location::entry(path, idx),
            None => Location::file(path),
        };
        Self::Decode { location, source }
    }

    pub fn missing_patient_context(path: &Path, entry_index: usize, kind: ResourceKind) -> Self {
        Self::MissingPatientContext {
            location: Location::entry(path, entry_index),
            resource_type: kind,
        }
    }

    pub fn field_mapping(path: &Path, entry_index: usize, source: MappingError) -> Self {
        Self::FieldMapping {
            location: Location::entry(path, entry_index),
            source,
        }
    }

    pub fn persistence(location: Location, source: StorageError) -> Self {
        Self::Persistence { location, source }
    }

    pub fn location(&self) -> &Location {
        match self {
            Self::Io { location, .. }
            | Self::Decode { location, .. }
            | Self::MissingPatientContext { location, .. }
            | Self::FieldMapping { location, .. }
            | Self::Persistence { location, .. } => location,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.location().path.as_deref()
    }

    pub fn entry_index(&self) -> Option<usize> {
        self.location().entry_index
    }

    #[must_use]
    pub fn is_missing_patient_context(&self) -> bool {
        matches!(self, Self::MissingPatientContext { .. })
    }

    /// Returns the error category for logging and run summaries.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Io { .. } => ErrorCategory::Io,
            Self::Decode { .. } => ErrorCategory::Decode,
            Self::MissingPatientContext { .. } => ErrorCategory::MissingContext,
            Self::FieldMapping { .. } => ErrorCategory::Mapping,
            Self::Persistence { .. } => ErrorCategory::Persistence,
        }
    }
}
