use std::sync::LazyLock;

use fhir_ingest_core::{ColumnType, InsertStatement, MappingError, Row};
use serde_json::Value;

use super::SubEntityMapper;
use super::fields;

static STATEMENT: LazyLock<InsertStatement> = LazyLock::new(|| {
    InsertStatement::new("name")
        .required("patient_id", ColumnType::Text)
        .optional("use", ColumnType::Text)
        .optional("text", ColumnType::Text)
        .optional("family", ColumnType::Text)
        .optional("given", ColumnType::Text)
        .optional("prefix", ColumnType::Text)
        .optional("suffix", ColumnType::Text)
        .references("patient_id", "patient", "id")
});

/// Maps `Patient.name[]` to `name` rows. A name needs a family part or free text.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameMapper;

impl SubEntityMapper for NameMapper {
    const ENTITY: &'static str = "Name";
    const FIELD: &'static str = "name";

    fn statement(&self) -> &'static InsertStatement {
        &STATEMENT
    }

    fn map_item(&self, patient_id: &str, item: &Value) -> Result<Row, MappingError> {
        let e = Self::ENTITY;
        let family = fields::text(e, item, "family")?;
        let text = fields::text(e, item, "text")?;
        if family.is_none() && text.is_none() {
            return Err(MappingError::missing(e, "family"));
        }

        Ok(Row::new()
            .with("patient_id", patient_id)
            .with("use", fields::text(e, item, "use")?)
            .with("text", text)
            .with("family", family)
            .with("given", fields::joined(e, item, "given", " ")?)
            .with("prefix", fields::joined(e, item, "prefix", " ")?)
            .with("suffix", fields::joined(e, item, "suffix", " ")?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_map_names() {
        let patient = json!({
            "name": [
                {"use": "official", "family": "Lee", "given": ["Ann", "Marie"], "prefix": ["Dr."]},
                {"use": "nickname", "text": "Annie"}
            ]
        });
        let rows = NameMapper.map("P1", &patient).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].text("family"), Some("Lee"));
        assert_eq!(rows[0].text("given"), Some("Ann Marie"));
        assert_eq!(rows[0].text("prefix"), Some("Dr."));
        assert_eq!(rows[1].text("text"), Some("Annie"));
        assert_eq!(rows[1].text("family"), None);
    }

    #[test]
    fn test_name_without_family_or_text() {
        let patient = json!({"name": [{"given": ["Ann"]}]});
        assert_eq!(
            NameMapper.map("P1", &patient).unwrap_err(),
            MappingError::missing("Name", "family")
        );
    }
}
