//! Relational row representations and insert statement descriptors.
//!
//! Mappers flatten resource fragments into [`Row`] values whose keys are
//! column names. Each mapper also exposes one [`InsertStatement`] that
//! describes the destination table; its placeholders are named after the
//! same columns so a row can be bound to it by name.

use std::fmt::Write as _;

use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;

/// A single column value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Text(String),
    Bool(bool),
    Integer(i64),
    Number(f64),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}

/// Flattened key-value mapping ready for parameterized insertion.
///
/// Column order is insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Row {
    values: IndexMap<&'static str, FieldValue>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    #[must_use]
    pub fn with(mut self, column: &'static str, value: impl Into<FieldValue>) -> Self {
        self.values.insert(column, value.into());
        self
    }

    pub fn set(&mut self, column: &'static str, value: impl Into<FieldValue>) {
        self.values.insert(column, value.into());
    }

    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.values.get(column)
    }

    /// Text value of a column; `None` for missing, null or non-text values
    pub fn text(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(FieldValue::as_str)
    }

    pub fn columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.values.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &FieldValue)> {
        self.values.iter().map(|(k, v)| (*k, v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// SQL type of a destination column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Date,
    Timestamp,
    Boolean,
    Integer,
    Numeric,
}

impl ColumnType {
    /// Placeholder cast so text and NULL parameters land in typed columns
    pub fn sql_cast(self) -> &'static str {
        match self {
            Self::Text => "",
            Self::Date => "::date",
            Self::Timestamp => "::timestamptz",
            Self::Boolean => "::boolean",
            Self::Integer => "::integer",
            Self::Numeric => "::double precision",
        }
    }

    pub fn sql_type(self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Date => "DATE",
            Self::Timestamp => "TIMESTAMPTZ",
            Self::Boolean => "BOOLEAN",
            Self::Integer => "INTEGER",
            Self::Numeric => "DOUBLE PRECISION",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub ty: ColumnType,
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub column: &'static str,
    pub table: &'static str,
    pub references: &'static str,
}

/// Behaviour when a row collides with an existing primary key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OnConflict {
    /// Reject the write
    #[default]
    Error,
    /// Keep the existing row and skip the new one
    DoNothing,
}

/// Rejections raised when a row does not fit its statement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    #[error("column {table}.{column} does not exist")]
    UnknownColumn {
        table: &'static str,
        column: &'static str,
    },

    #[error("null value in column {table}.{column} violates not-null constraint")]
    NullViolation {
        table: &'static str,
        column: &'static str,
    },
}

/// Stable description of a parameterized insert into one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertStatement {
    table: &'static str,
    columns: Vec<Column>,
    primary_key: Option<&'static str>,
    foreign_keys: Vec<ForeignKey>,
    on_conflict: OnConflict,
}

impl InsertStatement {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            columns: Vec::new(),
            primary_key: None,
            foreign_keys: Vec::new(),
            on_conflict: OnConflict::Error,
        }
    }

    /// Adds a NOT NULL column
    #[must_use]
    pub fn required(mut self, name: &'static str, ty: ColumnType) -> Self {
        self.columns.push(Column {
            name,
            ty,
            nullable: false,
        });
        self
    }

    /// Adds a nullable column
    #[must_use]
    pub fn optional(mut self, name: &'static str, ty: ColumnType) -> Self {
        self.columns.push(Column {
            name,
            ty,
            nullable: true,
        });
        self
    }

    #[must_use]
    pub fn primary_key(mut self, column: &'static str) -> Self {
        self.primary_key = Some(column);
        self
    }

    #[must_use]
    pub fn references(
        mut self,
        column: &'static str,
        table: &'static str,
        references: &'static str,
    ) -> Self {
        self.foreign_keys.push(ForeignKey {
            column,
            table,
            references,
        });
        self
    }

    #[must_use]
    pub fn on_conflict(mut self, on_conflict: OnConflict) -> Self {
        self.on_conflict = on_conflict;
        self
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn primary_key_column(&self) -> Option<&'static str> {
        self.primary_key
    }

    pub fn foreign_keys(&self) -> &[ForeignKey] {
        &self.foreign_keys
    }

    pub fn conflict_policy(&self) -> OnConflict {
        self.on_conflict
    }

    /// Statement text with named placeholders: `VALUES (:id, :gender)`
    pub fn named_sql(&self) -> String {
        self.render(|_, column| format!(":{}", column.name))
    }

    /// Statement text with positional, typed placeholders: `VALUES ($1, $2::date)`
    pub fn positional_sql(&self) -> String {
        self.render(|idx, column| format!("${}{}", idx + 1, column.ty.sql_cast()))
    }

    fn render(&self, placeholder: impl Fn(usize, &Column) -> String) -> String {
        let names: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("\"{}\"", c.name))
            .collect();
        let values: Vec<String> = self
            .columns
            .iter()
            .enumerate()
            .map(|(idx, c)| placeholder(idx, c))
            .collect();

        let mut sql = format!(
            "INSERT INTO \"{}\" ({}) VALUES ({})",
            self.table,
            names.join(", "),
            values.join(", ")
        );
        if self.on_conflict == OnConflict::DoNothing {
            let _ = write!(sql, " ON CONFLICT DO NOTHING");
        }
        sql
    }

    /// Checks that the row only names known columns and fills every NOT NULL one.
    pub fn check_row(&self, row: &Row) -> Result<(), RowError> {
        if let Some(unknown) = row
            .columns()
            .find(|name| !self.columns.iter().any(|c| c.name == *name))
        {
            return Err(RowError::UnknownColumn {
                table: self.table,
                column: unknown,
            });
        }

        for column in self.columns.iter().filter(|c| !c.nullable) {
            if row.get(column.name).is_none_or(FieldValue::is_null) {
                return Err(RowError::NullViolation {
                    table: self.table,
                    column: column.name,
                });
            }
        }
        Ok(())
    }

    /// Row values in column order, NULL for columns the row leaves out
    pub fn bind_values<'r>(&self, row: &'r Row) -> Vec<(&Column, Option<&'r FieldValue>)> {
        self.columns
            .iter()
            .map(|column| (column, row.get(column.name).filter(|v| !v.is_null())))
            .collect()
    }
}

/// Aligned output of the encounter participant mapper.
///
/// `participants` holds one row per distinct practitioner and
/// `encounter_participants` one link row per participant entry. Both are
/// written together by a single port call.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantBatch {
    pub participant_statement: &'static InsertStatement,
    pub participants: Vec<Row>,
    pub link_statement: &'static InsertStatement,
    pub encounter_participants: Vec<Row>,
}

impl ParticipantBatch {
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty() && self.encounter_participants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patient_statement() -> InsertStatement {
        InsertStatement::new("patient")
            .required("id", ColumnType::Text)
            .optional("gender", ColumnType::Text)
            .optional("birth_date", ColumnType::Date)
            .primary_key("id")
    }

    #[test]
    fn test_named_sql() {
        assert_eq!(
            patient_statement().named_sql(),
            r#"INSERT INTO "patient" ("id", "gender", "birth_date") VALUES (:id, :gender, :birth_date)"#
        );
    }

    #[test]
    fn test_positional_sql_with_casts_and_conflict() {
        let stmt = InsertStatement::new("participant")
            .required("id", ColumnType::Text)
            .optional("since", ColumnType::Timestamp)
            .primary_key("id")
            .on_conflict(OnConflict::DoNothing);
        assert_eq!(
            stmt.positional_sql(),
            r#"INSERT INTO "participant" ("id", "since") VALUES ($1, $2::timestamptz) ON CONFLICT DO NOTHING"#
        );
    }

    #[test]
    fn test_check_row() {
        let stmt = patient_statement();
        let ok = Row::new().with("id", "P1").with("gender", "female");
        assert!(stmt.check_row(&ok).is_ok());

        let missing_id = Row::new().with("gender", "female");
        assert_eq!(
            stmt.check_row(&missing_id),
            Err(RowError::NullViolation {
                table: "patient",
                column: "id"
            })
        );

        let null_id = Row::new().with("id", None::<String>);
        assert!(matches!(
            stmt.check_row(&null_id),
            Err(RowError::NullViolation { .. })
        ));

        let unknown = Row::new().with("id", "P1").with("shoe_size", 42i64);
        assert_eq!(
            stmt.check_row(&unknown),
            Err(RowError::UnknownColumn {
                table: "patient",
                column: "shoe_size"
            })
        );
    }

    #[test]
    fn test_bind_values_fill_missing_with_null() {
        let stmt = patient_statement();
        let row = Row::new().with("birth_date", "1990-01-02").with("id", "P1");
        let values = stmt.bind_values(&row);
        assert_eq!(values.len(), 3);
        assert_eq!(values[0].0.name, "id");
        assert_eq!(values[0].1, Some(&FieldValue::from("P1")));
        assert_eq!(values[1].1, None);
        assert_eq!(values[2].1.and_then(FieldValue::as_str), Some("1990-01-02"));
    }

    #[test]
    fn test_row_serializes_as_object() {
        let row = Row::new()
            .with("id", "P1")
            .with("preferred", true)
            .with("rank", 2i64)
            .with("value", None::<f64>);
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"id": "P1", "preferred": true, "rank": 2, "value": null})
        );
    }
}
