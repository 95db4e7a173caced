//! Per-record diagnostics kept for later audit.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::{AnalysisError, LocateError};
use crate::model::ParticipantRecord;

/// Why a record lost some or all of its metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// No directory matched the participant.
    NotFound,
    /// Several directories matched and none was configured.
    Ambiguous,
    /// The directory held nothing analyzable.
    EmptySource,
    /// One file failed to load or parse; the record continues without it.
    ParseSkipped,
    /// An analyzer exited non-zero, timed out, or produced malformed output.
    ToolFailure,
    /// The batch was cancelled before this record ran.
    Cancelled,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::NotFound => "not_found",
            DiagnosticKind::Ambiguous => "ambiguous",
            DiagnosticKind::EmptySource => "empty_source",
            DiagnosticKind::ParseSkipped => "parse_skipped",
            DiagnosticKind::ToolFailure => "tool_failure",
            DiagnosticKind::Cancelled => "cancelled",
        }
    }

    pub fn for_locate(error: &LocateError) -> Self {
        match error {
            LocateError::Ambiguous { .. } => DiagnosticKind::Ambiguous,
            LocateError::NotFound { .. } | LocateError::Io { .. } => DiagnosticKind::NotFound,
        }
    }

    pub fn for_analysis(error: &AnalysisError) -> Self {
        match error {
            AnalysisError::Tool(_) | AnalysisError::Query(_) => DiagnosticKind::ToolFailure,
            AnalysisError::EmptyScores { .. }
            | AnalysisError::ZeroSourceLines
            | AnalysisError::Parse { .. } => DiagnosticKind::EmptySource,
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One audit entry: what happened to which record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub cohort: String,
    /// Survey row (zero-based, after the header).
    pub row: usize,
    pub identity: String,
    pub username: Option<String>,
    pub project_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, record: &ParticipantRecord, message: impl Into<String>) -> Self {
        Self {
            kind,
            cohort: record.experiment_id.clone(),
            row: record.row,
            identity: record.identity.clone(),
            username: record.username.clone(),
            project_id: record.project_id,
            path: None,
            message: message.into(),
        }
    }

    pub fn with_path(mut self, path: PathBuf) -> Self {
        self.path = Some(path);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolError;
    use std::time::Duration;

    #[test]
    fn test_kind_mapping() {
        let ambiguous = LocateError::Ambiguous {
            identity: "Angelo Li".to_string(),
            candidates: vec!["amli".to_string(), "jli".to_string()],
        };
        assert_eq!(DiagnosticKind::for_locate(&ambiguous), DiagnosticKind::Ambiguous);

        let timeout = AnalysisError::Tool(ToolError::Timeout {
            tool: "pmd".to_string(),
            timeout: Duration::from_secs(1),
        });
        assert_eq!(DiagnosticKind::for_analysis(&timeout), DiagnosticKind::ToolFailure);
        assert_eq!(
            DiagnosticKind::for_analysis(&AnalysisError::ZeroSourceLines),
            DiagnosticKind::EmptySource
        );
    }

    #[test]
    fn test_serialized_kind() {
        let json = serde_json::to_string(&DiagnosticKind::ParseSkipped).unwrap();
        assert_eq!(json, "\"parse_skipped\"");
    }
}
