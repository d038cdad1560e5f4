use std::fmt;

use thiserror::Error;

/// Errors raised while turning file content into a [`crate::Bundle`].
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Bundle document must be a JSON object")]
    NotAnObject,

    #[error("Missing top-level resourceType")]
    MissingResourceType,

    #[error("Expected resourceType Bundle, found {found}")]
    NotABundle { found: String },

    #[error("Bundle.entry must be an array")]
    InvalidEntryList,

    #[error("Bundle.entry[{index}] has no resource")]
    MissingEntryResource { index: usize },

    #[error("Bundle.entry[{index}].resource has no resourceType")]
    MissingEntryResourceType { index: usize },
}

impl DecodeError {
    /// Create a new NotABundle error
    pub fn not_a_bundle(found: impl Into<String>) -> Self {
        Self::NotABundle {
            found: found.into(),
        }
    }

    /// Entry position the error refers to, if any
    pub fn entry_index(&self) -> Option<usize> {
        match self {
            Self::MissingEntryResource { index } | Self::MissingEntryResourceType { index } => {
                Some(*index)
            }
            _ => None,
        }
    }
}

/// Errors raised by entity mappers when a resource fragment cannot be
/// flattened into a row.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("{entity}.{field} is required")]
    MissingField { entity: &'static str, field: String },

    #[error("{entity}.{field} must be {expected}")]
    InvalidField {
        entity: &'static str,
        field: String,
        expected: &'static str,
    },
}

impl MappingError {
    /// Create a new MissingField error
    pub fn missing(entity: &'static str, field: impl Into<String>) -> Self {
        Self::MissingField {
            entity,
            field: field.into(),
        }
    }

    /// Create a new InvalidField error
    pub fn invalid(entity: &'static str, field: impl Into<String>, expected: &'static str) -> Self {
        Self::InvalidField {
            entity,
            field: field.into(),
            expected,
        }
    }

    pub fn entity(&self) -> &'static str {
        match self {
            Self::MissingField { entity, .. } | Self::InvalidField { entity, .. } => entity,
        }
    }

    pub fn field(&self) -> &str {
        match self {
            Self::MissingField { field, .. } | Self::InvalidField { field, .. } => field,
        }
    }
}

/// Error categories for logging and run summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Decode,
    MissingContext,
    Mapping,
    Persistence,
    Io,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode => write!(f, "decode"),
            Self::MissingContext => write!(f, "missing_context"),
            Self::Mapping => write!(f, "mapping"),
            Self::Persistence => write!(f, "persistence"),
            Self::Io => write!(f, "io"),
        }
    }
}
