use std::sync::LazyLock;

use fhir_ingest_core::{ColumnType, InsertStatement, MappingError, Row};
use serde_json::Value;

use super::SubEntityMapper;
use super::fields;

static STATEMENT: LazyLock<InsertStatement> = LazyLock::new(|| {
    InsertStatement::new("identifier")
        .required("patient_id", ColumnType::Text)
        .optional("system", ColumnType::Text)
        .required("value", ColumnType::Text)
        .optional("type_code", ColumnType::Text)
        .optional("type_text", ColumnType::Text)
        .references("patient_id", "patient", "id")
});

/// Maps `Patient.identifier[]` to `identifier` rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentifierMapper;

impl SubEntityMapper for IdentifierMapper {
    const ENTITY: &'static str = "Identifier";
    const FIELD: &'static str = "identifier";

    fn statement(&self) -> &'static InsertStatement {
        &STATEMENT
    }

    fn map_item(&self, patient_id: &str, item: &Value) -> Result<Row, MappingError> {
        let e = Self::ENTITY;
        let kind = fields::concept(e, item, "type")?.unwrap_or_default();

        Ok(Row::new()
            .with("patient_id", patient_id)
            .with("system", fields::text(e, item, "system")?)
            .with("value", fields::required_text(e, item, "value")?)
            .with("type_code", kind.code.clone())
            .with("type_text", kind.display_or_text()))
    }
}
