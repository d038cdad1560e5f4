use std::fmt::Write;

use colored::Colorize;
use fhir_ingest_importer::RunSummary;

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Human-readable run summary: file counts, failed files and rows per table.
pub fn render_summary(summary: &RunSummary) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "{} {} imported, {} failed ({} policy)",
        "Files:".cyan(),
        summary.files_imported().to_string().green(),
        if summary.files_failed() > 0 {
            summary.files_failed().to_string().red()
        } else {
            summary.files_failed().to_string().normal()
        },
        summary.policy
    );

    for failure in &summary.failed {
        let _ = writeln!(
            out,
            "  {} {}: {}",
            "✗".red(),
            failure.path.display(),
            failure.error
        );
    }

    let rows = summary.rows();
    if rows.is_empty() {
        let _ = writeln!(out, "{} none", "Rows:".cyan());
        return out;
    }

    let _ = writeln!(out, "{} {}", "Rows:".cyan(), rows.total());
    let width = rows.iter().map(|(table, _)| table.len()).max().unwrap_or(0);
    for (table, count) in rows.iter() {
        let _ = writeln!(out, "  {table:<width$}  {count:>8}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use fhir_ingest_importer::{AbortPolicy, FileReport};
    use std::path::Path;

    #[test]
    fn test_render_summary() {
        colored::control::set_override(false);

        let mut summary = RunSummary::new(AbortPolicy::WholeRun);
        let mut report = FileReport::new(Path::new("a.json"), 3);
        report.rows.add("patient", 1);
        report.rows.add("encounter_participant", 12);
        summary.imported.push(report);

        let text = render_summary(&summary);
        assert!(text.contains("Files: 1 imported, 0 failed (whole-run policy)"));
        assert!(text.contains("Rows: 13"));
        assert!(
            text.lines()
                .any(|l| l.split_whitespace().eq(["patient", "1"]))
        );
        assert!(
            text.lines()
                .any(|l| l.split_whitespace().eq(["encounter_participant", "12"]))
        );
    }

    #[test]
    fn test_render_empty_summary() {
        colored::control::set_override(false);
        let text = render_summary(&RunSummary::new(AbortPolicy::PerFile));
        assert!(text.contains("Rows: none"));
    }
}
