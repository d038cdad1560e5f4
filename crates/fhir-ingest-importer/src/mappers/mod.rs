//! Entity mappers: pure conversions from resource fragments to rows.
//!
//! Every mapper exposes the [`InsertStatement`] its rows are written with.
//! Statements are built once and cached for the life of the process.
//!
//! | Mapper | Input | Output |
//! |---|---|---|
//! | [`PatientMapper`] | Patient resource | one `patient` row |
//! | [`AddressMapper`], [`NameMapper`], [`LanguageMapper`], [`TelecomMapper`], [`IdentifierMapper`] | patient id + optional list | zero or more rows |
//! | [`EncounterMapper`], [`ObservationMapper`], [`ConditionMapper`] | patient id + resource | one row |
//! | [`ParticipantMapper`] | patient id + encounter id + optional list | [`ParticipantBatch`] |

mod address;
mod condition;
mod encounter;
pub(crate) mod fields;
mod identifier;
mod language;
mod name;
mod observation;
mod participant;
mod patient;
mod telecom;

use fhir_ingest_core::{InsertStatement, MappingError, Row};
use serde_json::Value;

pub use address::AddressMapper;
pub use condition::ConditionMapper;
pub use encounter::EncounterMapper;
pub use identifier::IdentifierMapper;
pub use language::LanguageMapper;
pub use name::NameMapper;
pub use observation::ObservationMapper;
pub use participant::ParticipantMapper;
pub use patient::PatientMapper;
pub use telecom::TelecomMapper;

#[doc(no_inline)]
pub use fhir_ingest_core::ParticipantBatch;

/// Maps one resource to exactly one row.
pub trait EntityMapper {
    /// Key the row hangs off: `()` for root resources, the patient id otherwise.
    type Parent: ?Sized;

    /// Entity name used in mapping errors.
    const ENTITY: &'static str;

    fn statement(&self) -> &'static InsertStatement;

    /// # Errors
    ///
    /// Returns a [`MappingError`] when a required field is absent or a field
    /// has the wrong shape.
    fn map(&self, parent: &Self::Parent, resource: &Value) -> Result<Row, MappingError>;
}

/// Maps an optional list field of a patient to zero or more rows.
pub trait SubEntityMapper {
    /// Entity name used in mapping errors.
    const ENTITY: &'static str;

    /// Patient field holding the list.
    const FIELD: &'static str;

    fn statement(&self) -> &'static InsertStatement;

    /// Maps a single list item, already known to be an object.
    fn map_item(&self, patient_id: &str, item: &Value) -> Result<Row, MappingError>;

    /// Maps the list found under [`Self::FIELD`] of `patient`.
    ///
    /// An absent field or empty array yields no rows. A field that is not an
    /// array, or an item that is not an object, is an error.
    fn map(&self, patient_id: &str, patient: &Value) -> Result<Vec<Row>, MappingError> {
        let items = fields::array(Self::ENTITY, patient, Self::FIELD)?;
        items
            .iter()
            .enumerate()
            .map(|(idx, item)| {
                if !item.is_object() {
                    return Err(MappingError::invalid(
                        Self::ENTITY,
                        format!("{}[{idx}]", Self::FIELD),
                        "an object",
                    ));
                }
                self.map_item(patient_id, item)
            })
            .collect()
    }
}
