//! Batch aggregator: runs every record of a cohort through
//! locate → load → analyze → normalize on a bounded worker pool.
//!
//! Each record walks a small state machine. `NotFound`, `Empty`, and
//! `AnalysisFailed` end the record with a zero-filled vector and a
//! diagnostic; only a [`SchemaViolation`] stops the batch. Rows whose `loc`
//! is zero are dropped once every record is done.

pub mod diagnostics;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use thiserror::Error;

use crate::adapters::{self, keys, Adapter};
use crate::config::{CohortConfig, Config};
use crate::error::{LoadError, SchemaViolation};
use crate::locate::Locator;
use crate::model::{ParticipantRecord, RecordKey, SourceLanguage};
use crate::normalize::{normalize, MetricsVector, NormalizeError, Schema};
use crate::source::SourceLoader;

pub use diagnostics::{Diagnostic, DiagnosticKind};

/// Errors that stop a whole batch.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error(transparent)]
    Schema(#[from] SchemaViolation),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("failed to start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Where a record is in its pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    New,
    Locating,
    NotFound,
    Located,
    Loading,
    Empty,
    Loaded,
    Analyzing,
    AnalysisFailed,
    Normalized,
    Done,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::New => "NEW",
            Stage::Locating => "LOCATING",
            Stage::NotFound => "NOT_FOUND",
            Stage::Located => "LOCATED",
            Stage::Loading => "LOADING",
            Stage::Empty => "EMPTY",
            Stage::Loaded => "LOADED",
            Stage::Analyzing => "ANALYZING",
            Stage::AnalysisFailed => "ANALYSIS_FAILED",
            Stage::Normalized => "NORMALIZED",
            Stage::Done => "DONE",
        }
    }

    /// Terminal failure states; the record keeps a zero-filled vector.
    pub fn is_failure(&self) -> bool {
        matches!(self, Stage::NotFound | Stage::Empty | Stage::AnalysisFailed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Logs each stage transition of one record.
struct Tracker {
    label: String,
    stage: Stage,
}

impl Tracker {
    fn new(record: &ParticipantRecord) -> Self {
        Self {
            label: record.label(),
            stage: Stage::New,
        }
    }

    fn to(&mut self, next: Stage) {
        tracing::debug!(record = self.label.as_str(), from = %self.stage, to = %next, "stage");
        self.stage = next;
    }
}

/// What happened to one record.
struct Outcome {
    record: ParticipantRecord,
    diagnostics: Vec<Diagnostic>,
    resolved: Option<PathBuf>,
    fatal: Option<SchemaViolation>,
    cancelled: bool,
    /// Never started because another record hit a schema violation.
    abandoned: bool,
}

impl Outcome {
    fn new(record: ParticipantRecord) -> Self {
        Self {
            record,
            diagnostics: Vec::new(),
            resolved: None,
            fatal: None,
            cancelled: false,
            abandoned: false,
        }
    }

    fn diagnose(&mut self, diagnostic: Diagnostic) {
        tracing::warn!(
            kind = %diagnostic.kind,
            record = self.record.label().as_str(),
            "{}",
            diagnostic.message
        );
        self.diagnostics.push(diagnostic);
    }
}

/// Result of running one cohort.
#[derive(Debug)]
pub struct BatchReport {
    pub cohort: String,
    pub language: SourceLanguage,
    /// Number of records submitted to the batch.
    pub total: usize,
    /// Records with usable source (`loc` > 0), in input order.
    pub rows: Vec<ParticipantRecord>,
    /// Records that finished with a zero size metric.
    pub dropped: usize,
    pub diagnostics: Vec<Diagnostic>,
    /// Directory each located record resolved to.
    pub resolved: Vec<(RecordKey, PathBuf)>,
    /// The batch was cancelled before every record ran.
    pub cancelled: bool,
}

impl BatchReport {
    /// Directories that more than one distinct record resolved to.
    pub fn shared_directories(&self) -> Vec<(PathBuf, Vec<RecordKey>)> {
        let mut by_dir: BTreeMap<&PathBuf, BTreeSet<&RecordKey>> = BTreeMap::new();
        for (key, dir) in &self.resolved {
            by_dir.entry(dir).or_default().insert(key);
        }
        by_dir
            .into_iter()
            .filter(|(_, keys)| keys.len() > 1)
            .map(|(dir, keys)| (dir.clone(), keys.into_iter().cloned().collect()))
            .collect()
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.diagnostics.iter().filter(|d| d.kind == kind).count()
    }
}

/// Runs one cohort's records.
pub struct Batch {
    cohort: String,
    language: SourceLanguage,
    locator: Locator,
    loader: SourceLoader,
    adapter: Box<dyn Adapter>,
    schema: &'static Schema,
    jobs: Option<usize>,
    cancel: Arc<AtomicBool>,
    progress: bool,
}

impl Batch {
    pub fn new(config: &Config, cohort: &CohortConfig, cancel: Arc<AtomicBool>) -> Result<Self, BatchError> {
        Ok(Self {
            cohort: cohort.name.clone(),
            language: cohort.language,
            locator: Locator::new(config, cohort),
            loader: SourceLoader::new(cohort.language, &cohort.exclusions())?,
            adapter: adapters::for_language(cohort.language, &config.tools),
            schema: Schema::for_language(cohort.language),
            jobs: config.jobs,
            cancel,
            progress: std::io::stderr().is_terminal(),
        })
    }

    /// Override the number of worker threads.
    pub fn with_jobs(mut self, jobs: Option<usize>) -> Self {
        if jobs.is_some() {
            self.jobs = jobs;
        }
        self
    }

    /// Show or hide the progress bar.
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress && std::io::stderr().is_terminal();
        self
    }

    /// Replace the adapter, e.g. with tool stand-ins.
    pub fn with_adapter(mut self, adapter: Box<dyn Adapter>) -> Self {
        self.adapter = adapter;
        self
    }

    /// Run every record and collect the rows worth keeping.
    pub fn run(&self, records: Vec<ParticipantRecord>) -> Result<BatchReport, BatchError> {
        let total = records.len();
        tracing::info!(cohort = self.cohort.as_str(), records = total, "starting cohort");

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs.unwrap_or(0))
            .build()?;
        let bar = self.progress_bar(total);
        let abort = AtomicBool::new(false);

        let outcomes: Vec<Outcome> = pool.install(|| {
            records
                .into_par_iter()
                .map(|record| {
                    let outcome = self.process(record, &abort);
                    bar.inc(1);
                    outcome
                })
                .collect()
        });
        bar.finish_and_clear();

        let mut report = BatchReport {
            cohort: self.cohort.clone(),
            language: self.language,
            total,
            rows: Vec::new(),
            dropped: 0,
            diagnostics: Vec::new(),
            resolved: Vec::new(),
            cancelled: false,
        };
        let mut fatal = None;

        for outcome in outcomes {
            report.diagnostics.extend(outcome.diagnostics);
            if let Some(dir) = outcome.resolved {
                report.resolved.push((outcome.record.key(), dir));
            }
            if let Some(violation) = outcome.fatal {
                fatal.get_or_insert(violation);
            }
            if outcome.abandoned {
                continue;
            }
            if outcome.cancelled {
                report.cancelled = true;
                continue;
            }
            let loc = outcome.record.metrics.as_ref().map_or(0.0, MetricsVector::loc);
            if loc > 0.0 {
                report.rows.push(outcome.record);
            } else {
                report.dropped += 1;
            }
        }

        if let Some(violation) = fatal {
            tracing::error!(cohort = self.cohort.as_str(), "{}", violation);
            return Err(violation.into());
        }

        for (dir, keys) in report.shared_directories() {
            tracing::warn!(
                dir = %dir.display(),
                records = keys.len(),
                "several records resolved to the same directory"
            );
        }

        tracing::info!(
            cohort = self.cohort.as_str(),
            rows = report.rows.len(),
            dropped = report.dropped,
            diagnostics = report.diagnostics.len(),
            cancelled = report.cancelled,
            "finished cohort"
        );
        Ok(report)
    }

    fn progress_bar(&self, total: usize) -> ProgressBar {
        if !self.progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::with_template("{prefix} [{bar:40}] {pos}/{len} {elapsed}") {
            bar.set_style(style.progress_chars("=> "));
        }
        bar.set_prefix(self.cohort.clone());
        bar
    }

    fn process(&self, record: ParticipantRecord, abort: &AtomicBool) -> Outcome {
        let mut outcome = Outcome::new(record);
        if abort.load(Ordering::Relaxed) {
            outcome.abandoned = true;
            return outcome;
        }
        if self.cancel.load(Ordering::Relaxed) {
            outcome.cancelled = true;
            let diagnostic = Diagnostic::new(
                DiagnosticKind::Cancelled,
                &outcome.record,
                "batch cancelled before this record started",
            );
            outcome.diagnostics.push(diagnostic);
            return outcome;
        }

        let mut tracker = Tracker::new(&outcome.record);
        self.run_stages(&mut outcome, &mut tracker);

        if let Some(violation) = &outcome.fatal {
            abort.store(true, Ordering::Relaxed);
            tracing::error!(record = tracker.label.as_str(), "{}", violation);
        }
        if tracker.stage.is_failure() {
            outcome.record.metrics = Some(MetricsVector::zeroed(self.language));
        }
        tracker.to(Stage::Done);
        outcome
    }

    fn run_stages(&self, outcome: &mut Outcome, tracker: &mut Tracker) {
        tracker.to(Stage::Locating);
        let tree = match self.locator.locate(&outcome.record) {
            Ok(tree) => tree,
            Err(e) => {
                tracker.to(Stage::NotFound);
                let diagnostic = Diagnostic::new(DiagnosticKind::for_locate(&e), &outcome.record, e.to_string());
                outcome.diagnose(diagnostic);
                return;
            }
        };
        tracker.to(Stage::Located);
        outcome.record.submit_num = tree.submission.as_ref().map(|s| s.count);
        outcome.resolved = Some(tree.dir.clone());

        tracker.to(Stage::Loading);
        let loaded = match self.loader.load(&tree.dir) {
            Ok(loaded) => loaded,
            Err(e) => {
                tracker.to(Stage::Empty);
                let diagnostic = Diagnostic::new(DiagnosticKind::EmptySource, &outcome.record, e.to_string())
                    .with_path(tree.dir);
                outcome.diagnose(diagnostic);
                return;
            }
        };
        for skipped in &loaded.skipped {
            let diagnostic = Diagnostic::new(
                DiagnosticKind::ParseSkipped,
                &outcome.record,
                skipped.reason.clone(),
            )
            .with_path(skipped.path.clone());
            outcome.diagnose(diagnostic);
        }
        if loaded.files.is_empty() {
            tracker.to(Stage::Empty);
            let message = if loaded.is_empty_dir() {
                format!("no .{} files found", self.language.extension())
            } else {
                format!("all {} candidate files were skipped", loaded.skipped.len())
            };
            let diagnostic =
                Diagnostic::new(DiagnosticKind::EmptySource, &outcome.record, message).with_path(tree.dir);
            outcome.diagnose(diagnostic);
            return;
        }
        tracker.to(Stage::Loaded);

        tracker.to(Stage::Analyzing);
        let mut output = match self.adapter.analyze(&loaded.files) {
            Ok(output) => output,
            Err(e) => {
                tracker.to(Stage::AnalysisFailed);
                let diagnostic =
                    Diagnostic::new(DiagnosticKind::for_analysis(&e), &outcome.record, e.to_string())
                        .with_path(tree.dir);
                outcome.diagnose(diagnostic);
                return;
            }
        };
        output.set_count(keys::SKIPPED, loaded.skipped.len());

        if output.get(keys::LOC).unwrap_or(0.0) <= 0.0 {
            tracker.to(Stage::AnalysisFailed);
            let diagnostic = Diagnostic::new(
                DiagnosticKind::EmptySource,
                &outcome.record,
                "analyzed files contain no lines of code",
            )
            .with_path(tree.dir);
            outcome.diagnose(diagnostic);
            return;
        }

        match normalize(self.schema, &output) {
            Ok(vector) => {
                tracker.to(Stage::Normalized);
                outcome.record.metrics = Some(vector);
            }
            Err(NormalizeError::Schema(violation)) => {
                tracker.to(Stage::AnalysisFailed);
                outcome.fatal = Some(violation);
            }
            Err(e @ NormalizeError::Undefined { .. }) => {
                tracker.to(Stage::AnalysisFailed);
                let diagnostic = Diagnostic::new(DiagnosticKind::EmptySource, &outcome.record, e.to_string())
                    .with_path(tree.dir);
                outcome.diagnose(diagnostic);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::AnalyzerOutput;
    use crate::config::StyleKind;
    use crate::error::{AnalysisError, ToolError};
    use crate::model::SourceFile;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const GAME: &str = "def play(board):\n    if board:\n        return 1\n    return 0\n";

    fn config(root: &Path) -> Config {
        let yaml = r#"
tools:
  style:
    kind: builtin
cohorts:
  - name: CS151_Fall21
    language: python
    survey: survey.csv
    source_root: src
    output: out.csv
    layout:
      kind: direct
"#;
        let mut config: Config = serde_yaml::from_str(yaml).unwrap();
        config.base_dir = root.to_path_buf();
        config.jobs = Some(2);
        config
    }

    fn record(row: usize, username: &str, project_id: i64) -> ParticipantRecord {
        ParticipantRecord {
            row,
            identity: format!("{}@school.edu", username),
            username: Some(username.to_string()),
            participant_id: row as u32 + 1,
            experiment_id: "CS151_Fall21".to_string(),
            project_id,
            project_name: "Tic Tac Toe".to_string(),
            language: SourceLanguage::Python,
            passthrough: vec![],
            submit_num: None,
            metrics: None,
        }
    }

    fn write(root: &Path, rel: &str, text: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    fn batch(config: &Config) -> Batch {
        assert_eq!(config.tools.style.kind, StyleKind::Builtin);
        Batch::new(config, &config.cohorts[0], Arc::new(AtomicBool::new(false)))
            .unwrap()
            .with_progress(false)
    }

    #[test]
    fn test_failures_do_not_stop_the_batch() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "src/jdoe/project_1/game.py", GAME);
        write(tmp.path(), "src/asmith/project_1/notes.txt", "nothing here");
        let config = config(tmp.path());

        let report = batch(&config)
            .run(vec![record(0, "jdoe", 1), record(1, "asmith", 1), record(2, "bkim", 1)])
            .unwrap();

        assert_eq!(report.total, 3);
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.dropped, 2);
        assert_eq!(report.count(DiagnosticKind::NotFound), 1);
        assert_eq!(report.count(DiagnosticKind::EmptySource), 1);
        assert!(!report.cancelled);

        let row = &report.rows[0];
        assert_eq!(row.username.as_deref(), Some("jdoe"));
        let metrics = row.metrics.as_ref().unwrap();
        assert_eq!(metrics.loc(), 4.0);
        assert_eq!(metrics.get("skipped"), Some(0.0));
    }

    #[test]
    fn test_broken_file_is_skipped() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "src/jdoe/project_1/game.py", GAME);
        write(tmp.path(), "src/jdoe/project_1/broken.py", "def broken(:\n    pass\n");
        let config = config(tmp.path());

        let report = batch(&config).run(vec![record(0, "jdoe", 1)]).unwrap();
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.count(DiagnosticKind::ParseSkipped), 1);
        let metrics = report.rows[0].metrics.as_ref().unwrap();
        assert_eq!(metrics.get("skipped"), Some(1.0));
        assert_eq!(metrics.loc(), 4.0);
    }

    #[test]
    fn test_sources_without_functions_keep_their_rows() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "src/jdoe/project_1/script.py",
            "board = [1, 2, 3]\nfor x in board:\n    print(x)\n",
        );
        write(
            tmp.path(),
            "src/asmith/project_1/board.py",
            "class Board:\n    def size(self):\n        return 3\n",
        );
        let config = config(tmp.path());

        let report = batch(&config)
            .run(vec![record(0, "jdoe", 1), record(1, "asmith", 1)])
            .unwrap();
        assert_eq!(report.rows.len(), 2);
        assert!(report.diagnostics.is_empty());
        for row in &report.rows {
            let metrics = row.metrics.as_ref().unwrap();
            assert_eq!(metrics.get("cognitive_mean"), Some(1.0));
            assert_eq!(metrics.get("cognitive_min"), Some(1.0));
            assert_eq!(metrics.get("cognitive_max"), Some(1.0));
        }
        let jdoe = report
            .rows
            .iter()
            .find(|r| r.username.as_deref() == Some("jdoe"))
            .unwrap();
        assert_eq!(jdoe.metrics.as_ref().unwrap().loc(), 3.0);
    }

    #[cfg(unix)]
    #[test]
    fn test_walk_error_keeps_valid_files() {
        let tmp = TempDir::new().unwrap();
        let project = tmp.path().join("src/jdoe/project_1");
        write(tmp.path(), "src/jdoe/project_1/game.py", GAME);
        fs::create_dir_all(project.join("pkg")).unwrap();
        std::os::unix::fs::symlink(&project, project.join("pkg/loop")).unwrap();
        let config = config(tmp.path());

        let report = batch(&config).run(vec![record(0, "jdoe", 1)]).unwrap();
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.count(DiagnosticKind::ParseSkipped), 1);
        assert_eq!(report.count(DiagnosticKind::EmptySource), 0);
        let metrics = report.rows[0].metrics.as_ref().unwrap();
        assert_eq!(metrics.loc(), 4.0);
        assert_eq!(metrics.get("skipped"), Some(1.0));
    }

    #[test]
    fn test_cancelled_batch_produces_no_rows() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "src/jdoe/project_1/game.py", GAME);
        let config = config(tmp.path());

        let cancel = Arc::new(AtomicBool::new(true));
        let report = Batch::new(&config, &config.cohorts[0], cancel)
            .unwrap()
            .with_progress(false)
            .run(vec![record(0, "jdoe", 1)])
            .unwrap();
        assert!(report.cancelled);
        assert!(report.rows.is_empty());
        assert_eq!(report.count(DiagnosticKind::Cancelled), 1);
    }

    struct FailingAdapter;

    impl Adapter for FailingAdapter {
        fn language(&self) -> SourceLanguage {
            SourceLanguage::Python
        }

        fn analyze(&self, _files: &[SourceFile]) -> Result<AnalyzerOutput, AnalysisError> {
            Err(ToolError::malformed("pycodestyle", "unexpected banner").into())
        }
    }

    /// Reports only `loc`, so most columns cannot be resolved.
    struct PartialAdapter;

    impl Adapter for PartialAdapter {
        fn language(&self) -> SourceLanguage {
            SourceLanguage::Python
        }

        fn analyze(&self, _files: &[SourceFile]) -> Result<AnalyzerOutput, AnalysisError> {
            let mut out = AnalyzerOutput::default();
            out.set(keys::LOC, 10.0);
            Ok(out)
        }
    }

    #[test]
    fn test_tool_failure_is_a_diagnostic() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "src/jdoe/project_1/game.py", GAME);
        let config = config(tmp.path());

        let report = batch(&config)
            .with_adapter(Box::new(FailingAdapter))
            .run(vec![record(0, "jdoe", 1)])
            .unwrap();
        assert!(report.rows.is_empty());
        assert_eq!(report.count(DiagnosticKind::ToolFailure), 1);
        assert_eq!(report.diagnostics[0].path, Some(tmp.path().join("src/jdoe/project_1")));
    }

    #[test]
    fn test_schema_violation_aborts() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "src/jdoe/project_1/game.py", GAME);
        let config = config(tmp.path());

        let result = batch(&config)
            .with_adapter(Box::new(PartialAdapter))
            .run(vec![record(0, "jdoe", 1)]);
        assert!(matches!(result, Err(BatchError::Schema(_))));
    }

    #[test]
    fn test_shared_directories() {
        let key = |name: &str| RecordKey {
            username: name.to_string(),
            project_id: 1,
            project_name: "Hangman".to_string(),
        };
        let report = BatchReport {
            cohort: "c".to_string(),
            language: SourceLanguage::Python,
            total: 3,
            rows: vec![],
            dropped: 0,
            diagnostics: vec![],
            resolved: vec![
                (key("amli"), PathBuf::from("/s/amli")),
                (key("jli"), PathBuf::from("/s/amli")),
                (key("bkim"), PathBuf::from("/s/bkim")),
                (key("bkim"), PathBuf::from("/s/bkim")),
            ],
            cancelled: false,
        };
        let shared = report.shared_directories();
        assert_eq!(shared.len(), 1);
        assert_eq!(shared[0].0, PathBuf::from("/s/amli"));
        assert_eq!(shared[0].1.len(), 2);
    }

    #[test]
    fn test_failure_stages() {
        assert!(Stage::NotFound.is_failure());
        assert!(Stage::AnalysisFailed.is_failure());
        assert!(!Stage::Normalized.is_failure());
        assert_eq!(Stage::AnalysisFailed.to_string(), "ANALYSIS_FAILED");
    }
}
