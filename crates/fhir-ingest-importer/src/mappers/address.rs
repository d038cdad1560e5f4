use std::sync::LazyLock;

use fhir_ingest_core::{ColumnType, InsertStatement, MappingError, Row};
use serde_json::Value;

use super::SubEntityMapper;
use super::fields;

const GEOLOCATION_URL: &str = "http://hl7.org/fhir/StructureDefinition/geolocation";

static STATEMENT: LazyLock<InsertStatement> = LazyLock::new(|| {
    InsertStatement::new("address")
        .required("patient_id", ColumnType::Text)
        .optional("use", ColumnType::Text)
        .optional("line", ColumnType::Text)
        .optional("city", ColumnType::Text)
        .optional("district", ColumnType::Text)
        .optional("state", ColumnType::Text)
        .optional("postal_code", ColumnType::Text)
        .optional("country", ColumnType::Text)
        .optional("latitude", ColumnType::Numeric)
        .optional("longitude", ColumnType::Numeric)
        .references("patient_id", "patient", "id")
});

/// Maps `Patient.address[]` to `address` rows.
///
/// Address lines are joined with `", "`. Coordinates come from the standard
/// geolocation extension when present.
#[derive(Debug, Clone, Copy, Default)]
pub struct AddressMapper;

fn geolocation(address: &Value) -> Result<(Option<f64>, Option<f64>), MappingError> {
    let e = AddressMapper::ENTITY;
    let geo = fields::array(e, address, "extension")?
        .iter()
        .find(|ext| ext.get("url").and_then(Value::as_str) == Some(GEOLOCATION_URL));
    let Some(geo) = geo else {
        return Ok((None, None));
    };

    let mut latitude = None;
    let mut longitude = None;
    for part in fields::array(e, geo, "extension")? {
        match part.get("url").and_then(Value::as_str) {
            Some("latitude") => latitude = fields::number(e, part, "valueDecimal")?,
            Some("longitude") => longitude = fields::number(e, part, "valueDecimal")?,
            _ => {}
        }
    }
    Ok((latitude, longitude))
}

impl SubEntityMapper for AddressMapper {
    const ENTITY: &'static str = "Address";
    const FIELD: &'static str = "address";

    fn statement(&self) -> &'static InsertStatement {
        &STATEMENT
    }

    fn map_item(&self, patient_id: &str, item: &Value) -> Result<Row, MappingError> {
        let e = Self::ENTITY;
        let (latitude, longitude) = geolocation(item)?;

        Ok(Row::new()
            .with("patient_id", patient_id)
            .with("use", fields::text(e, item, "use")?)
            .with("line", fields::joined(e, item, "line", ", ")?)
            .with("city", fields::text(e, item, "city")?)
            .with("district", fields::text(e, item, "district")?)
            .with("state", fields::text(e, item, "state")?)
            .with("postal_code", fields::text(e, item, "postalCode")?)
            .with("country", fields::text(e, item, "country")?)
            .with("latitude", latitude)
            .with("longitude", longitude))
    }
}
