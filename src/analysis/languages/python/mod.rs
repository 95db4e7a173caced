//! Python language analyzer using tree-sitter.
//!
//! Besides parse validation this computes every per-file metric the Python
//! adapter reports: raw counts, per-function cyclomatic and cognitive
//! scores, Halstead counts, and the maintainability index.

mod complexity;
mod halstead;
mod raw;

use std::path::Path;

use serde::Serialize;
use tree_sitter::{Language, Parser};

use crate::analysis::{maintainability_index, LanguageAnalyzer, ParsedFile};
use crate::error::AnalysisError;
use crate::model::SourceLanguage;

pub use halstead::Halstead;
pub use raw::RawCounts;

/// Metrics of one Python file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileMetrics {
    pub raw: RawCounts,
    /// One score per function or method; empty when the file has none.
    pub cyclomatic: Vec<u32>,
    /// One score per module-level function.
    pub cognitive: Vec<u32>,
    pub halstead: Halstead,
    pub maintainability: f64,
}

pub struct PythonAnalyzer {
    language: Language,
}

impl PythonAnalyzer {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_python::LANGUAGE.into(),
        }
    }

    fn create_parser(&self) -> Result<Parser, tree_sitter::LanguageError> {
        let mut parser = Parser::new();
        parser.set_language(&self.language)?;
        Ok(parser)
    }

    /// Compute all metrics for a parsed file.
    pub fn measure(&self, parsed: &ParsedFile) -> Result<FileMetrics, AnalysisError> {
        let raw = raw::raw_counts(parsed);
        let root = parsed.tree.root_node();

        let functions = complexity::scored_functions(&self.language, parsed)?;
        let cyclomatic: Vec<u32> = functions.iter().map(|f| complexity::cyclomatic(*f)).collect();
        let total_complexity = complexity::total_complexity(root, functions.len());
        let cognitive = complexity::module_cognitive(root);
        let halstead = halstead::halstead(&self.language, parsed)?;

        let comment_percent = if raw.sloc > 0 {
            (raw.comments + raw.multi) as f64 / raw.sloc as f64 * 100.0
        } else {
            0.0
        };
        let maintainability = maintainability_index(
            halstead.volume(),
            total_complexity as f64,
            raw.lloc as f64,
            comment_percent,
        );

        Ok(FileMetrics {
            raw,
            cyclomatic,
            cognitive,
            halstead,
            maintainability,
        })
    }
}

impl Default for PythonAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageAnalyzer for PythonAnalyzer {
    fn language(&self) -> SourceLanguage {
        SourceLanguage::Python
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["py"]
    }

    fn parse(&self, path: &Path, source: &[u8]) -> Result<ParsedFile, AnalysisError> {
        let parse_error = |message: String| AnalysisError::Parse {
            path: path.to_path_buf(),
            message,
        };
        let mut parser = self.create_parser().map_err(|e| parse_error(e.to_string()))?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| parse_error("parser returned no tree".to_string()))?;

        Ok(ParsedFile {
            tree,
            source: source.to_vec(),
            path: path.to_path_buf(),
        })
    }
}
