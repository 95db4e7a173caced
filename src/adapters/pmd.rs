//! PMD violation report parsing.
//!
//! PMD reports cognitive complexity only as a violation whose description
//! carries the score in prose: "The method 'f()' has a cognitive
//! complexity of 17, current threshold is 15". [`parse_cognitive_score`] is
//! the one place that prose is read.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use crate::error::ToolError;

pub const TOOL: &str = "pmd";

/// Rule id of per-method cognitive complexity reports.
pub const COGNITIVE_RULE: &str = "CognitiveComplexity";

lazy_static! {
    static ref COGNITIVE_SCORE: Regex =
        Regex::new(r"(?i)\bcognitive complexity of (\d+)\b").unwrap();
}

/// PMD's JSON report (`--format json`).
#[derive(Debug, Deserialize)]
pub struct PmdReport {
    #[serde(default)]
    pub files: Vec<PmdFile>,
}

#[derive(Debug, Deserialize)]
pub struct PmdFile {
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub violations: Vec<PmdViolation>,
}

#[derive(Debug, Deserialize)]
pub struct PmdViolation {
    pub rule: String,
    #[serde(default)]
    pub description: String,
}

/// Violation tallies extracted from a report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PmdSummary {
    /// Violations other than cognitive complexity reports.
    pub violations: usize,
    /// One score per reported method.
    pub cognitive: Vec<f64>,
}

/// Extract the score from a cognitive complexity description.
pub fn parse_cognitive_score(description: &str) -> Result<u32, ToolError> {
    let captures = COGNITIVE_SCORE.captures(description).ok_or_else(|| {
        ToolError::malformed(
            TOOL,
            format!("unrecognized {} description: {:?}", COGNITIVE_RULE, description),
        )
    })?;
    captures[1].parse().map_err(|_| {
        ToolError::malformed(TOOL, format!("score out of range in {:?}", description))
    })
}

/// Parse a JSON report and tally its violations.
pub fn summarize(json: &str) -> Result<PmdSummary, ToolError> {
    let report: PmdReport = serde_json::from_str(json)
        .map_err(|e| ToolError::malformed(TOOL, format!("invalid JSON report: {}", e)))?;

    let mut summary = PmdSummary::default();
    for file in &report.files {
        for violation in &file.violations {
            if violation.rule == COGNITIVE_RULE {
                summary
                    .cognitive
                    .push(parse_cognitive_score(&violation.description)? as f64);
            } else {
                summary.violations += 1;
            }
        }
    }
    Ok(summary)
}
