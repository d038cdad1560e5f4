pub mod bundle;
pub mod error;
pub mod fhir;
pub mod reference;
pub mod row;

pub use bundle::{Bundle, BundleEntry, Resource};
pub use error::{DecodeError, ErrorCategory, MappingError};
pub use fhir::ResourceKind;
pub use reference::{reference_id, FhirReference};
pub use row::{
    Column, ColumnType, FieldValue, ForeignKey, InsertStatement, OnConflict, ParticipantBatch, Row,
    RowError,
};
