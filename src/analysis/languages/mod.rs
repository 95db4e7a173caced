//! Language-specific analyzer implementations.

mod java;
mod python;

pub use java::JavaAnalyzer;
pub use python::{FileMetrics, Halstead, PythonAnalyzer, RawCounts};

use super::LanguageAnalyzer;
use crate::model::SourceLanguage;
use once_cell::sync::OnceCell;

/// Static storage for Java analyzer.
static JAVA_ANALYZER: OnceCell<JavaAnalyzer> = OnceCell::new();

/// Static storage for Python analyzer.
static PYTHON_ANALYZER: OnceCell<PythonAnalyzer> = OnceCell::new();

/// The Python analyzer, created on first use.
pub fn python_analyzer() -> &'static PythonAnalyzer {
    PYTHON_ANALYZER.get_or_init(PythonAnalyzer::new)
}

/// The Java analyzer, created on first use.
pub fn java_analyzer() -> &'static JavaAnalyzer {
    JAVA_ANALYZER.get_or_init(JavaAnalyzer::new)
}

/// Get the analyzer for a language.
pub fn analyzer_for(language: SourceLanguage) -> &'static dyn LanguageAnalyzer {
    match language {
        SourceLanguage::Python => python_analyzer(),
        SourceLanguage::Java => java_analyzer(),
    }
}
