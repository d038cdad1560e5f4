//! Per-file reports and the run summary.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::error::ImportError;
use crate::policy::AbortPolicy;

/// Rows written per table, in first-write order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowCounts {
    counts: IndexMap<&'static str, usize>,
}

impl RowCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, table: &'static str, rows: usize) {
        if rows > 0 {
            *self.counts.entry(table).or_default() += rows;
        }
    }

    pub fn get(&self, table: &str) -> usize {
        self.counts.get(table).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, usize)> + '_ {
        self.counts.iter().map(|(table, n)| (*table, *n))
    }

    pub fn merge(&mut self, other: &RowCounts) {
        for (table, rows) in other.iter() {
            self.add(table, rows);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// Outcome of one committed bundle file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub path: PathBuf,
    /// Entries in the bundle.
    pub entries: usize,
    /// Entries of kinds the importer does not handle.
    pub skipped: usize,
    pub rows: RowCounts,
}

impl FileReport {
    pub fn new(path: &Path, entries: usize) -> Self {
        Self {
            path: path.to_path_buf(),
            entries,
            skipped: 0,
            rows: RowCounts::new(),
        }
    }
}

/// A file that was rolled back under [`AbortPolicy::PerFile`].
#[derive(Debug)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: ImportError,
}

/// Aggregated result of an import run.
#[derive(Debug)]
pub struct RunSummary {
    pub policy: AbortPolicy,
    pub imported: Vec<FileReport>,
    pub failed: Vec<FileFailure>,
}

impl RunSummary {
    pub fn new(policy: AbortPolicy) -> Self {
        Self {
            policy,
            imported: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn files_imported(&self) -> usize {
        self.imported.len()
    }

    pub fn files_failed(&self) -> usize {
        self.failed.len()
    }

    /// Rows written across every committed file.
    pub fn rows(&self) -> RowCounts {
        let mut total = RowCounts::new();
        for report in &self.imported {
            total.merge(&report.rows);
        }
        total
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fhir_ingest_core::MappingError;

    #[test]
    fn test_row_counts() {
        let mut counts = RowCounts::new();
        counts.add("patient", 1);
        counts.add("telecom", 3);
        counts.add("address", 0);
        counts.add("patient", 1);

        assert_eq!(counts.get("patient"), 2);
        assert_eq!(counts.get("address"), 0);
        assert_eq!(counts.total(), 5);
        assert_eq!(
            counts.iter().collect::<Vec<_>>(),
            vec![("patient", 2), ("telecom", 3)]
        );
    }

    #[test]
    fn test_summary() {
        let mut summary = RunSummary::new(AbortPolicy::PerFile);
        assert!(summary.is_success());

        let mut a = FileReport::new(Path::new("a.json"), 2);
        a.rows.add("patient", 1);
        let mut b = FileReport::new(Path::new("b.json"), 3);
        b.rows.add("patient", 1);
        b.rows.add("encounter", 2);
        summary.imported.push(a);
        summary.imported.push(b);
        summary.failed.push(FileFailure {
            path: PathBuf::from("c.json"),
            error: ImportError::field_mapping(
                Path::new("c.json"),
                0,
                MappingError::missing("Patient", "id"),
            ),
        });

        assert_eq!(summary.files_imported(), 2);
        assert_eq!(summary.files_failed(), 1);
        assert_eq!(summary.rows().get("patient"), 2);
        assert_eq!(summary.rows().total(), 4);
        assert!(!summary.is_success());
    }
}
