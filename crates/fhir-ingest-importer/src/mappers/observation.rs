use std::sync::LazyLock;

use fhir_ingest_core::{ColumnType, InsertStatement, MappingError, Row};
use serde_json::Value;

use super::EntityMapper;
use super::fields;

static STATEMENT: LazyLock<InsertStatement> = LazyLock::new(|| {
    InsertStatement::new("observation")
        .required("id", ColumnType::Text)
        .required("patient_id", ColumnType::Text)
        .optional("encounter_id", ColumnType::Text)
        .required("status", ColumnType::Text)
        .optional("category", ColumnType::Text)
        .required("code", ColumnType::Text)
        .optional("code_system", ColumnType::Text)
        .optional("code_display", ColumnType::Text)
        .optional("effective_date_time", ColumnType::Timestamp)
        .optional("issued", ColumnType::Timestamp)
        .optional("value_quantity", ColumnType::Numeric)
        .optional("value_unit", ColumnType::Text)
        .optional("value_string", ColumnType::Text)
        .primary_key("id")
        .references("patient_id", "patient", "id")
});

/// Maps an Observation resource to its `observation` row under the active patient.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObservationMapper;

struct ObservedValue {
    quantity: Option<f64>,
    unit: Option<String>,
    text: Option<String>,
}

fn observed_value(resource: &Value) -> Result<ObservedValue, MappingError> {
    let e = ObservationMapper::ENTITY;
    let mut value = ObservedValue {
        quantity: None,
        unit: None,
        text: fields::text(e, resource, "valueString")?,
    };

    if let Some(quantity) = fields::object(e, resource, "valueQuantity")? {
        value.quantity = fields::number(e, quantity, "value")
            .map_err(|_| MappingError::invalid(e, "valueQuantity.value", "a number"))?;
        value.unit = match fields::text(e, quantity, "unit")? {
            Some(unit) => Some(unit),
            None => fields::text(e, quantity, "code")?,
        };
    }
    if value.text.is_none()
        && let Some(concept) = fields::concept(e, resource, "valueCodeableConcept")?
    {
        value.text = concept.display_or_text().or(concept.code);
    }
    if value.text.is_none() {
        value.text = fields::boolean(e, resource, "valueBoolean")?.map(|b| b.to_string());
    }
    Ok(value)
}

impl EntityMapper for ObservationMapper {
    type Parent = str;
    const ENTITY: &'static str = "Observation";

    fn statement(&self) -> &'static InsertStatement {
        &STATEMENT
    }

    fn map(&self, patient_id: &str, resource: &Value) -> Result<Row, MappingError> {
        let e = Self::ENTITY;
        let id = fields::required_text(e, resource, "id")?;
        let status = fields::required_text(e, resource, "status")?;
        let code = fields::concept(e, resource, "code")?
            .ok_or_else(|| MappingError::missing(e, "code"))?;
        let code_value = code
            .code_or_text()
            .ok_or_else(|| MappingError::missing(e, "code.coding[0].code"))?;

        let effective = match fields::date_time(e, resource, "effectiveDateTime")? {
            Some(instant) => Some(instant),
            None => fields::period(e, resource, "effectivePeriod")?.0,
        };
        let value = observed_value(resource)?;

        Ok(Row::new()
            .with("id", id)
            .with("patient_id", patient_id)
            .with(
                "encounter_id",
                fields::reference(e, resource, "encounter")?,
            )
            .with("status", status)
            .with(
                "category",
                fields::first_concept(e, resource, "category")?.and_then(|c| c.code_or_text()),
            )
            .with("code", code_value)
            .with("code_system", code.system.clone())
            .with("code_display", code.display_or_text())
            .with("effective_date_time", effective)
            .with("issued", fields::date_time(e, resource, "issued")?)
            .with("value_quantity", value.quantity)
            .with("value_unit", value.unit)
            .with("value_string", value.text))
    }
}
