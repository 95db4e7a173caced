//! Error taxonomy for the analysis pipeline.
//!
//! Everything here except [`SchemaViolation`] is recoverable at record
//! granularity: the batch records a diagnostic and moves on.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failures while resolving a participant to a source directory.
#[derive(Error, Debug)]
pub enum LocateError {
    #[error("no source directory found for {identity:?}: {reason}")]
    NotFound { identity: String, reason: String },
    #[error("{identity:?} matches several directories: {}", candidates.join(", "))]
    Ambiguous {
        identity: String,
        candidates: Vec<String>,
    },
    #[error("probing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures while enumerating or reading source files.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("walking {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("invalid exclusion pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

/// Failures of an out-of-process analyzer.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("{tool}: failed to start {program:?}: {source}")]
    Spawn {
        tool: String,
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{tool}: exited with status {code:?}: {stderr}")]
    Exit {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("{tool}: timed out after {}s", timeout.as_secs())]
    Timeout { tool: String, timeout: Duration },
    #[error("{tool}: malformed output: {message}")]
    Malformed { tool: String, message: String },
    #[error("{tool}: {source}")]
    Io {
        tool: String,
        #[source]
        source: std::io::Error,
    },
}

impl ToolError {
    pub fn malformed(tool: &str, message: impl Into<String>) -> Self {
        ToolError::Malformed {
            tool: tool.to_string(),
            message: message.into(),
        }
    }
}

/// Failures of an analyzer adapter for one participant's file set.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// A mean/min/max was requested over an empty score set.
    #[error("no {metric} scores to aggregate")]
    EmptyScores { metric: &'static str },
    #[error("source line count is zero, comment ratio is undefined")]
    ZeroSourceLines,
    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid tree-sitter query: {0}")]
    Query(#[from] tree_sitter::QueryError),
    #[error(transparent)]
    Tool(#[from] ToolError),
}

/// The normalized vector does not fit the destination schema.
///
/// This is a configuration defect and aborts the whole batch.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("schema violation ({language}): {message}")]
pub struct SchemaViolation {
    pub language: String,
    pub message: String,
}
