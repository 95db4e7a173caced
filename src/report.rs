//! Output formatting for batch results.
//!
//! Two outputs:
//! - Pretty: colored per-cohort summary on stdout
//! - JSON: every per-record diagnostic, for later audit

use colored::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Context;

use crate::batch::{BatchReport, Diagnostic, DiagnosticKind};
use crate::model::SourceTree;

const KINDS: &[DiagnosticKind] = &[
    DiagnosticKind::NotFound,
    DiagnosticKind::Ambiguous,
    DiagnosticKind::EmptySource,
    DiagnosticKind::ParseSkipped,
    DiagnosticKind::ToolFailure,
    DiagnosticKind::Cancelled,
];

// =============================================================================
// JSON diagnostics
// =============================================================================

#[derive(Serialize)]
pub struct JsonReport {
    pub version: String,
    pub cohorts: Vec<JsonCohort>,
}

#[derive(Serialize)]
pub struct JsonCohort {
    pub cohort: String,
    pub language: String,
    pub records: usize,
    pub rows: usize,
    pub dropped: usize,
    pub cancelled: bool,
    /// Diagnostic count per kind; kinds that never occurred are omitted.
    pub counts: BTreeMap<String, usize>,
    pub diagnostics: Vec<Diagnostic>,
}

pub fn json_report(reports: &[BatchReport]) -> JsonReport {
    let cohorts = reports
        .iter()
        .map(|r| JsonCohort {
            cohort: r.cohort.clone(),
            language: r.language.to_string(),
            records: r.total,
            rows: r.rows.len(),
            dropped: r.dropped,
            cancelled: r.cancelled,
            counts: KINDS
                .iter()
                .map(|&k| (k.as_str().to_string(), r.count(k)))
                .filter(|(_, n)| *n > 0)
                .collect(),
            diagnostics: r.diagnostics.clone(),
        })
        .collect();

    JsonReport {
        version: env!("CARGO_PKG_VERSION").to_string(),
        cohorts,
    }
}

/// Write the diagnostics of every cohort run to `path`.
pub fn write_diagnostics(path: &Path, reports: &[BatchReport]) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&json_report(reports))?;
    fs::write(path, json + "\n").with_context(|| format!("writing diagnostics to {}", path.display()))?;
    Ok(())
}

// =============================================================================
// Pretty format
// =============================================================================

pub fn write_header() {
    println!();
    print!("  ");
    print!("{}", "cohortscan".cyan().bold());
    println!(" v{}", env!("CARGO_PKG_VERSION"));
    println!();
}

/// Summary of one cohort run.
pub fn write_pretty(report: &BatchReport, output: Option<&Path>) {
    print!("  {}", report.cohort.bold());
    println!("  {}", format!("({})", report.language).dimmed());

    print!("    {}", "Records: ".dimmed());
    print!("{}", report.total);
    print!("  {}", "Rows: ".dimmed());
    write_colored_rows(report.rows.len(), report.total);
    print!("  {}", "Dropped: ".dimmed());
    println!("{}", report.dropped);

    let counts: Vec<(DiagnosticKind, usize)> = KINDS
        .iter()
        .map(|&k| (k, report.count(k)))
        .filter(|(_, n)| *n > 0)
        .collect();
    if !counts.is_empty() {
        println!("    {}", "Diagnostics:".dimmed());
        for (kind, n) in counts {
            print!("      ");
            write_kind_tag(kind);
            println!(" {}", n);
        }
    }

    let shared = report.shared_directories();
    if !shared.is_empty() {
        println!(
            "    {} {} directories resolved for more than one record",
            "WARN".yellow(),
            shared.len()
        );
    }

    if report.cancelled {
        println!("    {}", "CANCELLED (results not written)".red());
    } else if let Some(path) = output {
        print!("    {}", "Output: ".dimmed());
        println!("{}", path.display().to_string().blue());
    }
    println!();
}

fn write_colored_rows(rows: usize, total: usize) {
    let text = rows.to_string();
    if rows == total {
        print!("{}", text.green());
    } else if rows * 2 >= total {
        print!("{}", text.yellow());
    } else {
        print!("{}", text.red());
    }
}

fn write_kind_tag(kind: DiagnosticKind) {
    let tag = format!("{:<14}", kind.as_str());
    match kind {
        DiagnosticKind::ParseSkipped => print!("{}", tag.blue()),
        DiagnosticKind::NotFound | DiagnosticKind::EmptySource => print!("{}", tag.yellow()),
        DiagnosticKind::Ambiguous | DiagnosticKind::ToolFailure | DiagnosticKind::Cancelled => {
            print!("{}", tag.red())
        }
    }
}

/// Result of the `locate` command.
pub fn write_located(identity: &str, tree: &SourceTree) {
    print!("  {}", "Identity: ".dimmed());
    println!("{}", identity);
    print!("  {}", "Directory: ".dimmed());
    println!("{}", tree.dir.display().to_string().blue());
    if let Some(submission) = &tree.submission {
        print!("  {}", "Submission: ".dimmed());
        println!("{} (of {})", submission.label, submission.count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RecordKey, SourceLanguage};
    use std::path::PathBuf;

    fn report() -> BatchReport {
        BatchReport {
            cohort: "CS151_Fall21".to_string(),
            language: SourceLanguage::Python,
            total: 2,
            rows: vec![],
            dropped: 2,
            diagnostics: vec![Diagnostic {
                kind: DiagnosticKind::NotFound,
                cohort: "CS151_Fall21".to_string(),
                row: 4,
                identity: "bkim@school.edu".to_string(),
                username: Some("bkim".to_string()),
                project_id: 2,
                path: None,
                message: "no source directory".to_string(),
            }],
            resolved: vec![(
                RecordKey {
                    username: "jdoe".to_string(),
                    project_id: 1,
                    project_name: "Hangman".to_string(),
                },
                PathBuf::from("/s/jdoe/project_1"),
            )],
            cancelled: false,
        }
    }

    #[test]
    fn test_json_report_counts() {
        let json = json_report(&[report()]);
        assert_eq!(json.cohorts.len(), 1);
        let cohort = &json.cohorts[0];
        assert_eq!(cohort.counts.get("not_found"), Some(&1));
        assert!(!cohort.counts.contains_key("ambiguous"));

        let text = serde_json::to_string(&json).unwrap();
        assert!(text.contains("\"kind\":\"not_found\""));
        assert!(text.contains("\"identity\":\"bkim@school.edu\""));
        assert!(!text.contains("\"path\""));
    }

    #[test]
    fn test_write_diagnostics_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("diag.json");
        write_diagnostics(&path, &[report()]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["cohorts"][0]["records"], 2);
        assert_eq!(value["cohorts"][0]["diagnostics"][0]["row"], 4);
    }
}
