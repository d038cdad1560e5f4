use std::sync::LazyLock;

use fhir_ingest_core::{ColumnType, InsertStatement, MappingError, Row};
use serde_json::Value;

use super::EntityMapper;
use super::fields;

static STATEMENT: LazyLock<InsertStatement> = LazyLock::new(|| {
    InsertStatement::new("encounter")
        .required("id", ColumnType::Text)
        .required("patient_id", ColumnType::Text)
        .required("status", ColumnType::Text)
        .optional("class_code", ColumnType::Text)
        .optional("type_code", ColumnType::Text)
        .optional("type_text", ColumnType::Text)
        .optional("period_start", ColumnType::Timestamp)
        .optional("period_end", ColumnType::Timestamp)
        .optional("reason_code", ColumnType::Text)
        .optional("reason_text", ColumnType::Text)
        .optional("service_provider", ColumnType::Text)
        .primary_key("id")
        .references("patient_id", "patient", "id")
});

/// Maps an Encounter resource to its `encounter` row under the active patient.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncounterMapper;

/// `Encounter.class` is a Coding in R4 and a CodeableConcept list in R5.
fn class_code(resource: &Value) -> Result<Option<String>, MappingError> {
    let e = EncounterMapper::ENTITY;
    match resource.get("class") {
        Some(Value::Array(_)) => {
            Ok(fields::first_concept(e, resource, "class")?.and_then(|c| c.code_or_text()))
        }
        _ => match fields::object(e, resource, "class")? {
            Some(coding) => fields::text(e, coding, "code")
                .map_err(|_| MappingError::invalid(e, "class.code", "a string")),
            None => Ok(None),
        },
    }
}

impl EntityMapper for EncounterMapper {
    type Parent = str;
    const ENTITY: &'static str = "Encounter";

    fn statement(&self) -> &'static InsertStatement {
        &STATEMENT
    }

    fn map(&self, patient_id: &str, resource: &Value) -> Result<Row, MappingError> {
        let e = Self::ENTITY;
        let kind = fields::first_concept(e, resource, "type")?.unwrap_or_default();
        let reason = fields::first_concept(e, resource, "reasonCode")?.unwrap_or_default();
        let (period_start, period_end) = fields::period(e, resource, "period")?;

        Ok(Row::new()
            .with("id", fields::required_text(e, resource, "id")?)
            .with("patient_id", patient_id)
            .with("status", fields::required_text(e, resource, "status")?)
            .with("class_code", class_code(resource)?)
            .with("type_code", kind.code.clone())
            .with("type_text", kind.display_or_text())
            .with("period_start", period_start)
            .with("period_end", period_end)
            .with("reason_code", reason.code.clone())
            .with("reason_text", reason.display_or_text())
            .with(
                "service_provider",
                fields::reference(e, resource, "serviceProvider")?,
            ))
    }
}
