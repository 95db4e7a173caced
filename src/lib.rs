//! Cohortscan - code metrics across a study cohort.
//!
//! For every completed survey response, cohortscan finds the participant's
//! submitted source tree, measures it with the language's analyzers, and
//! writes one fixed-order metrics row per participant and project.
//!
//! # Architecture
//!
//! - `locate`: survey identity → source directory (fuzzy names, submission history)
//! - `source`: enumerate, read, and parse-validate a directory's files
//! - `analysis`: tree-sitter parsing and in-process Python metrics
//! - `adapters`: per-language tool chains (in-process Python, PMD/multimetric Java)
//! - `normalize`: adapter output → the language's fixed column schema
//! - `batch`: runs every record on a worker pool and collects diagnostics
//! - `table`: survey CSV input, result CSV output
//! - `config`, `report`, `cli`: YAML configuration, terminal/JSON output, CLI
//!
//! # Adding a New Language
//!
//! Implement `LanguageAnalyzer` in `src/analysis/languages/`, an `Adapter`
//! in `src/adapters/`, and a schema in `src/normalize/schema.rs`.

pub mod adapters;
pub mod analysis;
pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod locate;
pub mod model;
pub mod normalize;
pub mod report;
pub mod source;
pub mod table;

pub use batch::{Batch, BatchError, BatchReport, Diagnostic, DiagnosticKind};
pub use config::{CohortConfig, Config};
pub use locate::Locator;
pub use model::{ParticipantRecord, SourceLanguage};
pub use normalize::{normalize, MetricsVector, Schema};
pub use source::SourceLoader;
