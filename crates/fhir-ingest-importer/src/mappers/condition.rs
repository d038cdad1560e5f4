use std::sync::LazyLock;

use fhir_ingest_core::{ColumnType, InsertStatement, MappingError, Row};
use serde_json::Value;

use super::EntityMapper;
use super::fields;

static STATEMENT: LazyLock<InsertStatement> = LazyLock::new(|| {
    InsertStatement::new("condition")
        .required("id", ColumnType::Text)
        .required("patient_id", ColumnType::Text)
        .optional("encounter_id", ColumnType::Text)
        .optional("clinical_status", ColumnType::Text)
        .optional("verification_status", ColumnType::Text)
        .required("code", ColumnType::Text)
        .optional("code_system", ColumnType::Text)
        .optional("code_display", ColumnType::Text)
        .optional("onset_date_time", ColumnType::Timestamp)
        .optional("abatement_date_time", ColumnType::Timestamp)
        .optional("recorded_date", ColumnType::Timestamp)
        .primary_key("id")
        .references("patient_id", "patient", "id")
});

/// Maps a Condition resource to its `condition` row under the active patient.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionMapper;

/// `{prefix}DateTime`, else the start of `{prefix}Period`.
fn moment(resource: &Value, prefix: &str) -> Result<Option<String>, MappingError> {
    let e = ConditionMapper::ENTITY;
    match fields::date_time(e, resource, &format!("{prefix}DateTime"))? {
        Some(instant) => Ok(Some(instant)),
        None => Ok(fields::period(e, resource, &format!("{prefix}Period"))?.0),
    }
}

impl EntityMapper for ConditionMapper {
    type Parent = str;
    const ENTITY: &'static str = "Condition";

    fn statement(&self) -> &'static InsertStatement {
        &STATEMENT
    }

    fn map(&self, patient_id: &str, resource: &Value) -> Result<Row, MappingError> {
        let e = Self::ENTITY;
        let id = fields::required_text(e, resource, "id")?;
        let code = fields::concept(e, resource, "code")?
            .ok_or_else(|| MappingError::missing(e, "code"))?;
        let code_value = code
            .code_or_text()
            .ok_or_else(|| MappingError::missing(e, "code.coding[0].code"))?;

        Ok(Row::new()
            .with("id", id)
            .with("patient_id", patient_id)
            .with(
                "encounter_id",
                fields::reference(e, resource, "encounter")?,
            )
            .with(
                "clinical_status",
                fields::concept(e, resource, "clinicalStatus")?.and_then(|c| c.code_or_text()),
            )
            .with(
                "verification_status",
                fields::concept(e, resource, "verificationStatus")?
                    .and_then(|c| c.code_or_text()),
            )
            .with("code", code_value)
            .with("code_system", code.system.clone())
            .with("code_display", code.display_or_text())
            .with("onset_date_time", moment(resource, "onset")?)
            .with("abatement_date_time", moment(resource, "abatement")?)
            .with("recorded_date", fields::date_time(e, resource, "recordedDate")?))
    }
}
