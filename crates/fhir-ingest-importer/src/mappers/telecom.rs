use std::sync::LazyLock;

use fhir_ingest_core::{ColumnType, InsertStatement, MappingError, Row};
use serde_json::Value;

use super::SubEntityMapper;
use super::fields;

static STATEMENT: LazyLock<InsertStatement> = LazyLock::new(|| {
    InsertStatement::new("telecom")
        .required("patient_id", ColumnType::Text)
        .optional("system", ColumnType::Text)
        .required("value", ColumnType::Text)
        .optional("use", ColumnType::Text)
        .optional("rank", ColumnType::Integer)
        .references("patient_id", "patient", "id")
});

/// Maps `Patient.telecom[]` to `telecom` rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct TelecomMapper;

impl SubEntityMapper for TelecomMapper {
    const ENTITY: &'static str = "Telecom";
    const FIELD: &'static str = "telecom";

    fn statement(&self) -> &'static InsertStatement {
        &STATEMENT
    }

    fn map_item(&self, patient_id: &str, item: &Value) -> Result<Row, MappingError> {
        let e = Self::ENTITY;
        Ok(Row::new()
            .with("patient_id", patient_id)
            .with("system", fields::text(e, item, "system")?)
            .with("value", fields::required_text(e, item, "value")?)
            .with("use", fields::text(e, item, "use")?)
            .with("rank", fields::integer(e, item, "rank")?))
    }
}
