//! Python adapter: in-process tree-sitter metrics plus a style checker.

use crate::analysis::languages::{python_analyzer, RawCounts};
use crate::analysis::{LanguageAnalyzer, Triple};
use crate::error::AnalysisError;
use crate::model::{SourceFile, SourceLanguage};

use super::{keys, Adapter, AnalyzerOutput, StyleChecker};

pub struct PythonAdapter {
    style: Box<dyn StyleChecker>,
}

impl PythonAdapter {
    pub fn new(style: Box<dyn StyleChecker>) -> Self {
        Self { style }
    }
}

/// Per-file score lists gathered before aggregation.
#[derive(Default)]
struct Scores {
    cyclomatic: Vec<Triple>,
    maintainability: Vec<f64>,
    volume: Vec<f64>,
    difficulty: Vec<f64>,
    time: Vec<f64>,
    effort: Vec<f64>,
    cognitive: Vec<Triple>,
}

/// One file's function scores; a file without functions scores the unit value.
fn per_file(scores: &[u32], metric: &'static str) -> Result<Triple, AnalysisError> {
    if scores.is_empty() {
        return Ok(Triple::UNIT);
    }
    let scores: Vec<f64> = scores.iter().map(|&c| c as f64).collect();
    Triple::of(&scores, metric)
}

impl Adapter for PythonAdapter {
    fn language(&self) -> SourceLanguage {
        SourceLanguage::Python
    }

    fn analyze(&self, files: &[SourceFile]) -> Result<AnalyzerOutput, AnalysisError> {
        let analyzer = python_analyzer();
        let mut raw = RawCounts::default();
        let mut scores = Scores::default();

        for file in files {
            let parsed = analyzer.parse(&file.path, file.text.as_bytes())?;
            let metrics = analyzer.measure(&parsed)?;

            raw += metrics.raw;
            scores
                .cyclomatic
                .push(per_file(&metrics.cyclomatic, "cyclomatic")?);
            scores
                .cognitive
                .push(per_file(&metrics.cognitive, "cognitive")?);
            scores.maintainability.push(metrics.maintainability);
            scores.volume.push(metrics.halstead.volume());
            scores.difficulty.push(metrics.halstead.difficulty());
            scores.time.push(metrics.halstead.time());
            scores.effort.push(metrics.halstead.effort());
        }

        if raw.sloc == 0 {
            return Err(AnalysisError::ZeroSourceLines);
        }

        let mut out = AnalyzerOutput::default();
        out.set_count(keys::LOC, raw.loc);
        out.set_count(keys::LLOC, raw.lloc);
        out.set_count(keys::SLOC, raw.sloc);
        out.set_count(keys::COMMENTS, raw.comments);
        out.set_count(keys::MULTI, raw.multi);
        out.set_count(keys::SINGLE_COMMENTS, raw.single_comments);
        out.set_count(keys::FUNCTIONS, raw.functions);
        out.set_count(keys::CLASSES, raw.classes);
        out.set(keys::COMMENT_RATIO, raw.comments as f64 / raw.sloc as f64);

        out.set_count(keys::STYLE_ERRORS, self.style.count(files)?);

        out.set_triple(keys::CC, Triple::combine(&scores.cyclomatic, "cyclomatic")?);
        out.set_triple(keys::MI, Triple::of(&scores.maintainability, "maintainability")?);
        out.set_triple(keys::HALSTEAD_VOLUME, Triple::of(&scores.volume, "halstead volume")?);
        out.set_triple(
            keys::HALSTEAD_DIFFICULTY,
            Triple::of(&scores.difficulty, "halstead difficulty")?,
        );
        out.set_triple(keys::HALSTEAD_TIME, Triple::of(&scores.time, "halstead time")?);
        out.set_triple(keys::HALSTEAD_EFFORT, Triple::of(&scores.effort, "halstead effort")?);
        out.set_triple(keys::COGNITIVE, Triple::combine(&scores.cognitive, "cognitive")?);

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::BuiltinStyle;
    use std::path::PathBuf;

    fn file(name: &str, text: &str) -> SourceFile {
        SourceFile {
            path: PathBuf::from(name),
            text: text.to_string(),
            language: SourceLanguage::Python,
        }
    }

    fn adapter() -> PythonAdapter {
        PythonAdapter::new(Box::new(BuiltinStyle::default()))
    }

    #[test]
    fn test_analyze_two_files() {
        let files = vec![
            file(
                "game.py",
                "def play(board):\n    if board:\n        return 1\n    return 0 \n",
            ),
            file("consts.py", "# settings\nSIZE = 3\n"),
        ];
        let out = adapter().analyze(&files).unwrap();

        assert_eq!(out.get(keys::LOC), Some(6.0));
        assert_eq!(out.get(keys::SLOC), Some(5.0));
        assert_eq!(out.get(keys::COMMENTS), Some(1.0));
        assert_eq!(out.get(keys::COMMENT_RATIO), Some(0.2));
        // W291 on the trailing space
        assert_eq!(out.get(keys::STYLE_ERRORS), Some(1.0));

        // play() scores 2; consts.py has no functions and scores 1
        assert_eq!(out.get("cc.mean"), Some(1.5));
        assert_eq!(out.get("cc.min"), Some(1.0));
        assert_eq!(out.get("cc.max"), Some(2.0));

        assert_eq!(out.get("cognitive.mean"), Some(1.0));
        assert_eq!(out.get("mi.max"), Some(100.0));
        assert!(out.get("halstead.volume.mean").is_some());
    }

    #[test]
    fn test_files_without_functions_score_unit() {
        let files = vec![
            file("script.py", "board = [1, 2, 3]\nfor x in board:\n    print(x)\n"),
            file(
                "board.py",
                "class Board:\n    def full(self, cells):\n        for c in cells:\n            if not c:\n                return False\n        return True\n",
            ),
        ];
        let out = adapter().analyze(&files).unwrap();
        assert_eq!(out.get("cognitive.mean"), Some(1.0));
        assert_eq!(out.get("cognitive.min"), Some(1.0));
        assert_eq!(out.get("cognitive.max"), Some(1.0));
        assert_eq!(out.get("cc.min"), Some(1.0));
    }

    #[test]
    fn test_cognitive_mean_of_file_means() {
        let files = vec![
            file(
                "game.py",
                "def a(x):\n    if x:\n        return 1\n    return 0\n\n\ndef b(x):\n    for i in x:\n        if i:\n            return i\n    return 0\n",
            ),
            file("consts.py", "SIZE = 3\n"),
        ];
        let out = adapter().analyze(&files).unwrap();
        // game.py: a() = 1, b() = 3; consts.py scores 1
        assert_eq!(out.get("cognitive.mean"), Some(1.5));
        assert_eq!(out.get("cognitive.min"), Some(1.0));
        assert_eq!(out.get("cognitive.max"), Some(3.0));
    }

    #[test]
    fn test_zero_source_lines() {
        let files = vec![file("empty.py", "# only a comment\n\n")];
        assert!(matches!(
            adapter().analyze(&files),
            Err(AnalysisError::ZeroSourceLines)
        ));
    }
}
