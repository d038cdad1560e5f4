use std::sync::LazyLock;

use fhir_ingest_core::{ColumnType, InsertStatement, MappingError, Row};
use serde_json::Value;

use super::EntityMapper;
use super::fields;

static STATEMENT: LazyLock<InsertStatement> = LazyLock::new(|| {
    InsertStatement::new("patient")
        .required("id", ColumnType::Text)
        .optional("gender", ColumnType::Text)
        .optional("birth_date", ColumnType::Date)
        .optional("deceased", ColumnType::Boolean)
        .optional("deceased_date_time", ColumnType::Timestamp)
        .optional("marital_status", ColumnType::Text)
        .optional("multiple_birth", ColumnType::Boolean)
        .primary_key("id")
});

/// Maps a Patient resource to its `patient` row.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatientMapper;

impl EntityMapper for PatientMapper {
    type Parent = ();
    const ENTITY: &'static str = "Patient";

    fn statement(&self) -> &'static InsertStatement {
        &STATEMENT
    }

    fn map(&self, _parent: &(), resource: &Value) -> Result<Row, MappingError> {
        let e = Self::ENTITY;

        let deceased_date_time = fields::date_time(e, resource, "deceasedDateTime")?;
        let deceased = match fields::boolean(e, resource, "deceasedBoolean")? {
            Some(flag) => Some(flag),
            None => deceased_date_time.as_ref().map(|_| true),
        };

        // multipleBirthInteger is a birth order, so its presence implies a multiple birth
        let multiple_birth = match fields::boolean(e, resource, "multipleBirthBoolean")? {
            Some(flag) => Some(flag),
            None => fields::integer(e, resource, "multipleBirthInteger")?.map(|_| true),
        };

        Ok(Row::new()
            .with("id", fields::required_text(e, resource, "id")?)
            .with("gender", fields::text(e, resource, "gender")?)
            .with("birth_date", fields::date(e, resource, "birthDate")?)
            .with("deceased", deceased)
            .with("deceased_date_time", deceased_date_time)
            .with(
                "marital_status",
                fields::concept(e, resource, "maritalStatus")?.and_then(|c| c.code_or_text()),
            )
            .with("multiple_birth", multiple_birth))
    }
}
