//! Core traits for language analysis.

use std::path::{Path, PathBuf};

use crate::error::AnalysisError;
use crate::model::SourceLanguage;

/// Holds a parsed tree-sitter tree and associated metadata.
///
/// Kept separate from the metrics so one parse can serve several passes.
pub struct ParsedFile {
    /// The tree-sitter parse tree.
    pub tree: tree_sitter::Tree,
    /// The original source code (kept for node text extraction).
    pub source: Vec<u8>,
    /// The file path (for error reporting).
    pub path: PathBuf,
}

impl ParsedFile {
    /// Get the source code as a string slice.
    pub fn source_str(&self) -> &str {
        std::str::from_utf8(&self.source).unwrap_or("")
    }

    /// Get text for a tree-sitter node.
    pub fn node_text(&self, node: tree_sitter::Node) -> &str {
        node.utf8_text(&self.source).unwrap_or("")
    }

    /// Whether the tree contains ERROR or MISSING nodes.
    pub fn has_errors(&self) -> bool {
        self.tree.root_node().has_error()
    }

    /// Position of the first syntax error, 1-based.
    pub fn first_error(&self) -> Option<(usize, usize)> {
        let mut cursor = self.tree.walk();
        let mut stack = vec![self.tree.root_node()];
        while let Some(node) = stack.pop() {
            if node.is_error() || node.is_missing() {
                let pos = node.start_position();
                return Some((pos.row + 1, pos.column + 1));
            }
            if node.has_error() {
                let children: Vec<_> = node.children(&mut cursor).collect();
                stack.extend(children.into_iter().rev());
            }
        }
        None
    }
}

/// Language-specific analyzer trait.
///
/// # Thread Safety
///
/// Note: tree_sitter::Parser is not Sync, so implementations create
/// parsers as needed.
pub trait LanguageAnalyzer: Send + Sync {
    /// The language this analyzer handles.
    fn language(&self) -> SourceLanguage;

    /// Returns file extensions this analyzer handles (without dot).
    fn file_extensions(&self) -> &'static [&'static str];

    /// Parse a source file into a tree-sitter tree.
    ///
    /// Partial parse errors still produce a tree with ERROR nodes; use
    /// [`LanguageAnalyzer::parse_strict`] to reject those.
    fn parse(&self, path: &Path, source: &[u8]) -> Result<ParsedFile, AnalysisError>;

    /// Parse and reject any tree with syntax errors.
    fn parse_strict(&self, path: &Path, source: &[u8]) -> Result<ParsedFile, AnalysisError> {
        let parsed = self.parse(path, source)?;
        if let Some((line, column)) = parsed.first_error() {
            return Err(AnalysisError::Parse {
                path: path.to_path_buf(),
                message: format!("syntax error at {}:{}", line, column),
            });
        }
        if parsed.has_errors() {
            return Err(AnalysisError::Parse {
                path: path.to_path_buf(),
                message: "syntax error".to_string(),
            });
        }
        Ok(parsed)
    }

    /// Check if this analyzer handles the given file extension.
    fn handles_extension(&self, ext: &str) -> bool {
        self.file_extensions().contains(&ext)
    }
}
