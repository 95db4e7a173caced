//! Java language analyzer using tree-sitter.
//!
//! Java metrics come from external tools; this analyzer only validates
//! that each file parses.

use std::path::Path;

use tree_sitter::{Language, Parser};

use crate::analysis::{LanguageAnalyzer, ParsedFile};
use crate::error::AnalysisError;
use crate::model::SourceLanguage;

pub struct JavaAnalyzer {
    language: Language,
}

impl JavaAnalyzer {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_java::LANGUAGE.into(),
        }
    }
}

impl Default for JavaAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageAnalyzer for JavaAnalyzer {
    fn language(&self) -> SourceLanguage {
        SourceLanguage::Java
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["java"]
    }

    fn parse(&self, path: &Path, source: &[u8]) -> Result<ParsedFile, AnalysisError> {
        let mut parser = Parser::new();
        parser
            .set_language(&self.language)
            .map_err(|e| AnalysisError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        let tree = parser.parse(source, None).ok_or_else(|| AnalysisError::Parse {
            path: path.to_path_buf(),
            message: "parser returned no tree".to_string(),
        })?;
        Ok(ParsedFile {
            tree,
            source: source.to_vec(),
            path: path.to_path_buf(),
        })
    }
}
