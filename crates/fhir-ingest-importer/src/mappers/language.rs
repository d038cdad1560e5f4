use std::sync::LazyLock;

use fhir_ingest_core::{ColumnType, InsertStatement, MappingError, Row};
use serde_json::Value;

use super::SubEntityMapper;
use super::fields;

static STATEMENT: LazyLock<InsertStatement> = LazyLock::new(|| {
    InsertStatement::new("language")
        .required("patient_id", ColumnType::Text)
        .optional("code", ColumnType::Text)
        .optional("system", ColumnType::Text)
        .optional("display", ColumnType::Text)
        .optional("text", ColumnType::Text)
        .required("preferred", ColumnType::Boolean)
        .references("patient_id", "patient", "id")
});

/// Maps `Patient.communication[]` to `language` rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct LanguageMapper;

impl SubEntityMapper for LanguageMapper {
    const ENTITY: &'static str = "Language";
    const FIELD: &'static str = "communication";

    fn statement(&self) -> &'static InsertStatement {
        &STATEMENT
    }

    fn map_item(&self, patient_id: &str, item: &Value) -> Result<Row, MappingError> {
        let e = Self::ENTITY;
        let language = fields::concept(e, item, "language")?
            .filter(|c| c.code.is_some() || c.text.is_some())
            .ok_or_else(|| MappingError::missing(e, "language.coding[0].code"))?;

        Ok(Row::new()
            .with("patient_id", patient_id)
            .with("code", language.code)
            .with("system", language.system)
            .with("display", language.display)
            .with("text", language.text)
            .with(
                "preferred",
                fields::boolean(e, item, "preferred")?.unwrap_or(false),
            ))
    }
}
