//! Analyzer adapters: one per source language, each wrapping its tool
//! chain behind [`Adapter::analyze`].
//!
//! Adapters report named values in an [`AnalyzerOutput`]; the normalizer
//! maps those names to result columns.

mod java;
pub mod multimetric;
pub mod pmd;
pub mod process;
mod python;
pub mod style;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::analysis::{round2, Triple};
use crate::config::ToolsConfig;
use crate::error::AnalysisError;
use crate::model::{SourceFile, SourceLanguage};

pub use java::JavaAdapter;
pub use python::PythonAdapter;
pub use style::{style_checker, BuiltinStyle, Pycodestyle, StyleChecker};

/// Names adapters report values under.
pub mod keys {
    pub const LOC: &str = "raw.loc";
    pub const LLOC: &str = "raw.lloc";
    pub const SLOC: &str = "raw.sloc";
    pub const COMMENTS: &str = "raw.comments";
    pub const MULTI: &str = "raw.multi";
    pub const SINGLE_COMMENTS: &str = "raw.single_comments";
    pub const FUNCTIONS: &str = "raw.functions";
    pub const CLASSES: &str = "raw.classes";
    pub const COMMENT_RATIO: &str = "raw.comment_ratio";
    pub const STYLE_ERRORS: &str = "style.errors";
    /// Prefixes of mean/min/max triples.
    pub const CC: &str = "cc";
    pub const MI: &str = "mi";
    pub const HALSTEAD_VOLUME: &str = "halstead.volume";
    pub const HALSTEAD_DIFFICULTY: &str = "halstead.difficulty";
    pub const HALSTEAD_TIME: &str = "halstead.time";
    pub const HALSTEAD_EFFORT: &str = "halstead.effort";
    pub const COGNITIVE: &str = "cognitive";
    /// Per-method cognitive scores reported by an external linter.
    pub const COGNITIVE_SCORES: &str = "cognitive.scores";
    /// Files found but not loaded; filled in by the batch.
    pub const SKIPPED: &str = "source.skipped";

    pub fn mean(prefix: &str) -> String {
        format!("{}.mean", prefix)
    }

    pub fn min(prefix: &str) -> String {
        format!("{}.min", prefix)
    }

    pub fn max(prefix: &str) -> String {
        format!("{}.max", prefix)
    }
}

/// Named values reported by one adapter run.
///
/// Scalars are rounded to two decimals on insertion.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalyzerOutput {
    pub scalars: BTreeMap<String, f64>,
    pub series: BTreeMap<String, Vec<f64>>,
}

impl AnalyzerOutput {
    pub fn set(&mut self, key: &str, value: f64) {
        self.scalars.insert(key.to_string(), round2(value));
    }

    pub fn set_count(&mut self, key: &str, value: usize) {
        self.set(key, value as f64);
    }

    /// Store a triple as `<prefix>.mean`, `<prefix>.min`, `<prefix>.max`.
    pub fn set_triple(&mut self, prefix: &str, triple: Triple) {
        self.set(&keys::mean(prefix), triple.mean);
        self.set(&keys::min(prefix), triple.min);
        self.set(&keys::max(prefix), triple.max);
    }

    pub fn set_series(&mut self, key: &str, values: Vec<f64>) {
        self.series.insert(key.to_string(), values);
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.scalars.get(key).copied()
    }

    pub fn series(&self, key: &str) -> Option<&[f64]> {
        self.series.get(key).map(Vec::as_slice)
    }
}

/// A language's analyzer tool chain.
pub trait Adapter: Send + Sync {
    fn language(&self) -> SourceLanguage;

    /// Analyze one participant's loaded files.
    ///
    /// `files` is never empty.
    fn analyze(&self, files: &[SourceFile]) -> Result<AnalyzerOutput, AnalysisError>;
}

/// Build the adapter for a language.
pub fn for_language(language: SourceLanguage, tools: &ToolsConfig) -> Box<dyn Adapter> {
    match language {
        SourceLanguage::Python => Box::new(PythonAdapter::new(style_checker(tools))),
        SourceLanguage::Java => Box::new(JavaAdapter::new(tools)),
    }
}
