use std::collections::{BTreeMap, HashMap, HashSet};

use fhir_ingest_core::{FieldValue, InsertStatement, OnConflict, Row};
use fhir_ingest_storage::StorageError;

/// Rows per table, in insertion order.
///
/// Primary-key values are indexed per table, so key and foreign key checks
/// cost the same however many rows are held.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tables {
    tables: BTreeMap<&'static str, Vec<Row>>,
    keys: HashMap<&'static str, KeyIndex>,
}

#[derive(Debug, Clone, PartialEq)]
struct KeyIndex {
    column: &'static str,
    values: HashSet<IndexKey>,
}

/// Hashable form of a non-null [`FieldValue`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum IndexKey {
    Text(String),
    Bool(bool),
    Integer(i64),
    Number(u64),
}

impl IndexKey {
    fn of(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Null => None,
            FieldValue::Text(s) => Some(Self::Text(s.clone())),
            FieldValue::Bool(b) => Some(Self::Bool(*b)),
            FieldValue::Integer(i) => Some(Self::Integer(*i)),
            FieldValue::Number(n) => Some(Self::Number(n.to_bits())),
        }
    }
}

impl Tables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows of `table`; empty when nothing was ever written to it.
    pub fn rows(&self, table: &str) -> &[Row] {
        self.tables.get(table).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn count(&self, table: &str) -> usize {
        self.rows(table).len()
    }

    pub fn total_rows(&self) -> usize {
        self.tables.values().map(Vec::len).sum()
    }

    /// Names of tables holding at least one row.
    pub fn table_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tables
            .iter()
            .filter(|(_, rows)| !rows.is_empty())
            .map(|(name, _)| *name)
    }

    pub fn is_empty(&self) -> bool {
        self.total_rows() == 0
    }

    /// Validates `row` against `statement` and appends it.
    ///
    /// Returns `false` when the row was skipped by an `ON CONFLICT DO NOTHING`
    /// statement.
    pub fn insert(&mut self, statement: &InsertStatement, row: &Row) -> Result<bool, StorageError> {
        if !admit(&[&*self], statement, row)? {
            return Ok(false);
        }
        self.push(statement, row.clone());
        Ok(true)
    }

    /// Whether `table` holds a row whose `column` equals `value`.
    fn contains(&self, table: &str, column: &str, value: &FieldValue) -> bool {
        match self.keys.get(table) {
            Some(index) if index.column == column => {
                IndexKey::of(value).is_some_and(|key| index.values.contains(&key))
            }
            _ => self.rows(table).iter().any(|r| r.get(column) == Some(value)),
        }
    }

    fn push(&mut self, statement: &InsertStatement, row: Row) {
        let table = statement.table();
        if let Some(pk) = statement.primary_key_column() {
            let index = self.keys.entry(table).or_insert_with(|| KeyIndex {
                column: pk,
                values: HashSet::new(),
            });
            if let Some(key) = row.get(pk).and_then(IndexKey::of) {
                index.values.insert(key);
            }
        }
        self.tables.entry(table).or_default().push(row);
    }

    /// Removes the most recent row of `table`.
    fn pop(&mut self, table: &'static str) {
        let Some(row) = self.tables.get_mut(table).and_then(Vec::pop) else {
            return;
        };
        if let Some(index) = self.keys.get_mut(table)
            && let Some(key) = row.get(index.column).and_then(IndexKey::of)
        {
            index.values.remove(&key);
        }
    }

    /// Moves every row of `other` to the end of this set.
    pub(crate) fn append(&mut self, other: Tables) {
        for (table, index) in other.keys {
            match self.keys.get_mut(table) {
                Some(own) => own.values.extend(index.values),
                None => {
                    self.keys.insert(table, index);
                }
            }
        }
        for (table, rows) in other.tables {
            self.tables.entry(table).or_default().extend(rows);
        }
    }
}

/// Writes of an open transaction, checked together with the committed rows.
#[derive(Debug, Default)]
pub(crate) struct Pending {
    writes: Tables,
    /// Table of every accepted row, oldest first.
    log: Vec<&'static str>,
}

impl Pending {
    /// Validates `row` against both `committed` and the pending writes, then
    /// records it.
    pub(crate) fn insert(
        &mut self,
        committed: &Tables,
        statement: &InsertStatement,
        row: &Row,
    ) -> Result<bool, StorageError> {
        if !admit(&[committed, &self.writes], statement, row)? {
            return Ok(false);
        }
        self.writes.push(statement, row.clone());
        self.log.push(statement.table());
        Ok(true)
    }

    /// Position to roll back to with [`Pending::rollback_to`].
    pub(crate) fn mark(&self) -> usize {
        self.log.len()
    }

    /// Drops every write recorded after `mark`.
    pub(crate) fn rollback_to(&mut self, mark: usize) {
        while self.log.len() > mark {
            if let Some(table) = self.log.pop() {
                self.writes.pop(table);
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.log.len()
    }

    pub(crate) fn into_writes(self) -> Tables {
        self.writes
    }
}

/// Checks `row` against the constraints of `statement`, looking up keys in
/// every layer.
///
/// `Ok(false)` means the row collides with an existing key and the statement
/// skips conflicts.
fn admit(layers: &[&Tables], statement: &InsertStatement, row: &Row) -> Result<bool, StorageError> {
    statement.check_row(row)?;

    let present = |table: &str, column: &str, value: &FieldValue| {
        layers.iter().any(|t| t.contains(table, column, value))
    };

    for fk in statement.foreign_keys() {
        let Some(value) = row.get(fk.column).filter(|v| !v.is_null()) else {
            continue;
        };
        if !present(fk.table, fk.references, value) {
            return Err(StorageError::foreign_key_violation(
                statement.table(),
                fk.column,
                key_text(value),
            ));
        }
    }

    if let Some(pk) = statement.primary_key_column()
        && let Some(key) = row.get(pk)
        && present(statement.table(), pk, key)
    {
        return match statement.conflict_policy() {
            OnConflict::DoNothing => Ok(false),
            OnConflict::Error => Err(StorageError::already_exists(
                statement.table(),
                key_text(key),
            )),
        };
    }
    Ok(true)
}

fn key_text(value: &FieldValue) -> String {
    match value {
        FieldValue::Null => "NULL".to_string(),
        FieldValue::Text(s) => s.clone(),
        FieldValue::Bool(b) => b.to_string(),
        FieldValue::Integer(i) => i.to_string(),
        FieldValue::Number(n) => n.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fhir_ingest_core::ColumnType;

    fn patient() -> InsertStatement {
        InsertStatement::new("patient")
            .required("id", ColumnType::Text)
            .optional("gender", ColumnType::Text)
            .primary_key("id")
    }

    fn name() -> InsertStatement {
        InsertStatement::new("name")
            .required("patient_id", ColumnType::Text)
            .optional("family", ColumnType::Text)
            .references("patient_id", "patient", "id")
    }

    #[test]
    fn test_insert_and_count() {
        let mut tables = Tables::new();
        assert!(tables.insert(&patient(), &Row::new().with("id", "P1")).unwrap());
        assert!(
            tables
                .insert(&name(), &Row::new().with("patient_id", "P1").with("family", "Doe"))
                .unwrap()
        );
        assert_eq!(tables.count("patient"), 1);
        assert_eq!(tables.count("name"), 1);
        assert_eq!(tables.count("telecom"), 0);
        assert_eq!(tables.total_rows(), 2);
        assert_eq!(tables.table_names().collect::<Vec<_>>(), vec!["name", "patient"]);
    }

    #[test]
    fn test_duplicate_primary_key() {
        let mut tables = Tables::new();
        tables.insert(&patient(), &Row::new().with("id", "P1")).unwrap();
        let err = tables
            .insert(&patient(), &Row::new().with("id", "P1"))
            .unwrap_err();
        assert!(err.is_already_exists());

        let skip = patient().on_conflict(OnConflict::DoNothing);
        assert!(!tables.insert(&skip, &Row::new().with("id", "P1")).unwrap());
        assert_eq!(tables.count("patient"), 1);
    }

    #[test]
    fn test_dangling_foreign_key() {
        let mut tables = Tables::new();
        let err = tables
            .insert(&name(), &Row::new().with("patient_id", "P9"))
            .unwrap_err();
        assert!(err.is_foreign_key_violation());
        assert!(tables.is_empty());
    }

    #[test]
    fn test_not_null_enforced() {
        let mut tables = Tables::new();
        let err = tables
            .insert(&patient(), &Row::new().with("gender", "male"))
            .unwrap_err();
        assert!(matches!(err, StorageError::ConstraintViolation { .. }));
    }

    #[test]
    fn test_pending_checks_committed_and_own_writes() {
        let mut committed = Tables::new();
        committed.insert(&patient(), &Row::new().with("id", "P1")).unwrap();

        let mut pending = Pending::default();
        assert!(
            pending
                .insert(&committed, &name(), &Row::new().with("patient_id", "P1"))
                .unwrap()
        );
        pending
            .insert(&committed, &patient(), &Row::new().with("id", "P2"))
            .unwrap();
        pending
            .insert(&committed, &name(), &Row::new().with("patient_id", "P2"))
            .unwrap();

        let err = pending
            .insert(&committed, &patient(), &Row::new().with("id", "P1"))
            .unwrap_err();
        assert!(err.is_already_exists());
        let err = pending
            .insert(&committed, &patient(), &Row::new().with("id", "P2"))
            .unwrap_err();
        assert!(err.is_already_exists());
        let err = pending
            .insert(&committed, &name(), &Row::new().with("patient_id", "P3"))
            .unwrap_err();
        assert!(err.is_foreign_key_violation());

        assert_eq!(pending.len(), 3);
        // committed rows are untouched until the writes are appended
        assert_eq!(committed.total_rows(), 1);
        committed.append(pending.into_writes());
        assert_eq!(committed.count("patient"), 2);
        assert_eq!(committed.count("name"), 2);
        assert!(
            committed
                .insert(&patient(), &Row::new().with("id", "P2"))
                .unwrap_err()
                .is_already_exists()
        );
    }

    #[test]
    fn test_rollback_to_mark_releases_keys() {
        let committed = Tables::new();
        let mut pending = Pending::default();
        pending
            .insert(&committed, &patient(), &Row::new().with("id", "P1"))
            .unwrap();

        let mark = pending.mark();
        pending
            .insert(&committed, &patient(), &Row::new().with("id", "P2"))
            .unwrap();
        pending
            .insert(&committed, &name(), &Row::new().with("patient_id", "P2"))
            .unwrap();
        pending.rollback_to(mark);
        assert_eq!(pending.len(), 1);

        // P2 is gone, so its key is free again and children of it dangle
        let err = pending
            .insert(&committed, &name(), &Row::new().with("patient_id", "P2"))
            .unwrap_err();
        assert!(err.is_foreign_key_violation());
        assert!(
            pending
                .insert(&committed, &patient(), &Row::new().with("id", "P2"))
                .unwrap()
        );

        let writes = pending.into_writes();
        assert_eq!(writes.count("patient"), 2);
        assert_eq!(writes.count("name"), 0);
    }

    #[test]
    fn test_key_lookup_distinguishes_value_types() {
        let numbered = InsertStatement::new("numbered")
            .required("id", ColumnType::Integer)
            .primary_key("id");
        let mut tables = Tables::new();
        tables.insert(&numbered, &Row::new().with("id", 1_i64)).unwrap();
        assert!(tables.contains("numbered", "id", &FieldValue::Integer(1)));
        assert!(!tables.contains("numbered", "id", &FieldValue::Text("1".into())));
        // columns other than the key fall back to a scan
        assert!(!tables.contains("numbered", "other", &FieldValue::Integer(1)));
    }
}
