use std::collections::HashSet;
use std::sync::LazyLock;

use fhir_ingest_core::{
    ColumnType, InsertStatement, MappingError, OnConflict, ParticipantBatch, Row, reference_id,
};
use serde_json::Value;

use super::fields;

const ENTITY: &str = "EncounterParticipant";

static PARTICIPANT_STATEMENT: LazyLock<InsertStatement> = LazyLock::new(|| {
    InsertStatement::new("participant")
        .required("id", ColumnType::Text)
        .required("reference", ColumnType::Text)
        .optional("display", ColumnType::Text)
        .primary_key("id")
        .on_conflict(OnConflict::DoNothing)
});

static LINK_STATEMENT: LazyLock<InsertStatement> = LazyLock::new(|| {
    InsertStatement::new("encounter_participant")
        .required("encounter_id", ColumnType::Text)
        .required("participant_id", ColumnType::Text)
        .required("patient_id", ColumnType::Text)
        .optional("type_code", ColumnType::Text)
        .optional("type_text", ColumnType::Text)
        .optional("period_start", ColumnType::Timestamp)
        .optional("period_end", ColumnType::Timestamp)
        .references("encounter_id", "encounter", "id")
        .references("participant_id", "participant", "id")
        .references("patient_id", "patient", "id")
});

/// Maps `Encounter.participant[]` to practitioner rows plus one link row each.
///
/// Practitioners are keyed by the bare id of `individual.reference`. A
/// practitioner listed twice in one encounter produces a single pair of rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParticipantMapper;

impl ParticipantMapper {
    pub fn participant_statement(&self) -> &'static InsertStatement {
        &PARTICIPANT_STATEMENT
    }

    pub fn link_statement(&self) -> &'static InsertStatement {
        &LINK_STATEMENT
    }

    /// Maps the `participant` list of `encounter`.
    ///
    /// # Errors
    ///
    /// Fails when the list is not an array, an item is not an object, or an
    /// item has no resolvable `individual.reference`.
    pub fn map(
        &self,
        patient_id: &str,
        encounter_id: &str,
        encounter: &Value,
    ) -> Result<ParticipantBatch, MappingError> {
        let items = fields::array(ENTITY, encounter, "participant")?;

        let mut seen = HashSet::new();
        let mut participants = Vec::new();
        let mut links = Vec::new();

        for (idx, item) in items.iter().enumerate() {
            let path = format!("participant[{idx}]");
            if !item.is_object() {
                return Err(MappingError::invalid(ENTITY, path, "an object"));
            }

            let individual = fields::object(ENTITY, item, "individual")
                .map_err(|_| MappingError::invalid(ENTITY, format!("{path}.individual"), "an object"))?
                .ok_or_else(|| MappingError::missing(ENTITY, format!("{path}.individual.reference")))?;
            let reference = fields::text(ENTITY, individual, "reference")
                .map_err(|_| {
                    MappingError::invalid(ENTITY, format!("{path}.individual.reference"), "a string")
                })?
                .ok_or_else(|| MappingError::missing(ENTITY, format!("{path}.individual.reference")))?;
            let participant_id = reference_id(&reference).ok_or_else(|| {
                MappingError::invalid(
                    ENTITY,
                    format!("{path}.individual.reference"),
                    "a resolvable reference",
                )
            })?;

            if !seen.insert(participant_id.clone()) {
                continue;
            }

            let kind = fields::first_concept(ENTITY, item, "type")?.unwrap_or_default();
            let (period_start, period_end) = fields::period(ENTITY, item, "period")?;

            participants.push(
                Row::new()
                    .with("id", participant_id.as_str())
                    .with("reference", reference)
                    .with("display", fields::text(ENTITY, individual, "display")?),
            );
            links.push(
                Row::new()
                    .with("encounter_id", encounter_id)
                    .with("participant_id", participant_id)
                    .with("patient_id", patient_id)
                    .with("type_code", kind.code.clone())
                    .with("type_text", kind.display_or_text())
                    .with("period_start", period_start)
                    .with("period_end", period_end),
            );
        }

        Ok(ParticipantBatch {
            participant_statement: &PARTICIPANT_STATEMENT,
            participants,
            link_statement: &LINK_STATEMENT,
            encounter_participants: links,
        })
    }
}
