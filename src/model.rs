//! Core records that flow through the pipeline.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::normalize::MetricsVector;

/// Source language of a cohort's submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceLanguage {
    Python,
    Java,
}

impl SourceLanguage {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceLanguage::Python => "python",
            SourceLanguage::Java => "java",
        }
    }

    /// File extension (without dot) of source files in this language.
    pub fn extension(&self) -> &'static str {
        match self {
            SourceLanguage::Python => "py",
            SourceLanguage::Java => "java",
        }
    }

    /// File-name globs skipped unless the cohort overrides them.
    ///
    /// Python course scaffolds ship instructor-written `*authority*` modules.
    pub fn default_exclusions(&self) -> Vec<String> {
        match self {
            SourceLanguage::Python => vec!["*authority*".to_string()],
            SourceLanguage::Java => Vec::new(),
        }
    }
}

impl fmt::Display for SourceLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SourceLanguage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "python" | "py" => Ok(SourceLanguage::Python),
            "java" => Ok(SourceLanguage::Java),
            _ => Err(format!("unknown language: {}", s)),
        }
    }
}

/// One completed survey response: a participant working on one project.
#[derive(Debug, Clone)]
pub struct ParticipantRecord {
    /// Zero-based row in the survey table (after the header).
    pub row: usize,
    /// Raw identity field: an email, a full name, or a username.
    pub identity: String,
    /// Username derived from `identity`; `None` when the field is blank.
    pub username: Option<String>,
    /// Sequential id, stable per username within a cohort.
    pub participant_id: u32,
    /// Cohort/experiment tag.
    pub experiment_id: String,
    pub project_id: i64,
    pub project_name: String,
    pub language: SourceLanguage,
    /// Values of the cohort's passthrough columns, in config order.
    pub passthrough: Vec<String>,
    /// Number of recorded submissions (multi-submission cohorts only).
    pub submit_num: Option<usize>,
    /// Filled by the batch once analysis finishes.
    pub metrics: Option<MetricsVector>,
}

impl ParticipantRecord {
    /// Key used to sort output rows and to label diagnostics.
    pub fn key(&self) -> RecordKey {
        RecordKey {
            username: self.username.clone().unwrap_or_default(),
            project_id: self.project_id,
            project_name: self.project_name.clone(),
        }
    }

    /// Human-readable label for logs.
    pub fn label(&self) -> String {
        match &self.username {
            Some(u) => format!("{}/project {}", u, self.project_id),
            None => format!("row {}/project {}", self.row, self.project_id),
        }
    }
}

/// Sort and identity key for a record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub username: String,
    pub project_id: i64,
    pub project_name: String,
}

/// The submission snapshot chosen for a multi-submission participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Folder name of the snapshot (`submit`, `submit-3`, `last-submit`).
    pub label: String,
    /// Number of submissions recorded for the participant.
    pub count: usize,
}

/// A resolved directory holding one participant's submission for one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTree {
    pub dir: PathBuf,
    pub submission: Option<Submission>,
    /// Files found under `dir` that failed to load or parse.
    pub skipped: usize,
}

impl SourceTree {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            submission: None,
            skipped: 0,
        }
    }
}

/// A source file that was read and parsed successfully.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub text: String,
    pub language: SourceLanguage,
}
