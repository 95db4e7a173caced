//! multimetric JSON report parsing.
//!
//! The report has three sections: `overall` totals, per-file metrics under
//! `files`, and `stats` with `mean`/`min`/`max` maps over every metric.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::analysis::{maintainability_index, Triple};
use crate::error::{AnalysisError, ToolError};

pub const TOOL: &str = "multimetric";

pub const CYCLOMATIC: &str = "cyclomatic_complexity";
pub const HALSTEAD_VOLUME: &str = "halstead_volume";
pub const HALSTEAD_DIFFICULTY: &str = "halstead_difficulty";
pub const HALSTEAD_TIME: &str = "halstead_timerequired";
pub const HALSTEAD_EFFORT: &str = "halstead_effort";

#[derive(Debug, Deserialize)]
pub struct MultimetricReport {
    pub overall: Map<String, Value>,
    #[serde(default)]
    pub files: BTreeMap<String, Map<String, Value>>,
    pub stats: MultimetricStats,
}

#[derive(Debug, Deserialize)]
pub struct MultimetricStats {
    pub mean: Map<String, Value>,
    pub min: Map<String, Value>,
    pub max: Map<String, Value>,
}

impl MultimetricReport {
    pub fn parse(json: &str) -> Result<Self, ToolError> {
        serde_json::from_str(json)
            .map_err(|e| ToolError::malformed(TOOL, format!("invalid JSON report: {}", e)))
    }

    /// A total from the `overall` section.
    pub fn overall(&self, metric: &str) -> Result<f64, ToolError> {
        number(&self.overall, metric, "overall")
    }

    /// Mean/min/max of a metric across files.
    pub fn stat(&self, metric: &str) -> Result<Triple, ToolError> {
        Ok(Triple {
            mean: number(&self.stats.mean, metric, "stats.mean")?,
            min: number(&self.stats.min, metric, "stats.min")?,
            max: number(&self.stats.max, metric, "stats.max")?,
        })
    }

    /// Maintainability index of every non-empty file.
    pub fn maintainability(&self) -> Result<Vec<f64>, ToolError> {
        let mut scores = Vec::new();
        for (path, metrics) in &self.files {
            if metrics.is_empty() {
                continue;
            }
            let section = format!("files[{}]", path);
            scores.push(maintainability_index(
                number(metrics, HALSTEAD_VOLUME, &section)?,
                number(metrics, CYCLOMATIC, &section)?,
                number(metrics, "loc", &section)?,
                number(metrics, "comment_ratio", &section)?,
            ));
        }
        Ok(scores)
    }

    /// Mean/min/max maintainability; an error when every file was empty.
    pub fn maintainability_triple(&self) -> Result<Triple, AnalysisError> {
        Triple::of(&self.maintainability()?, "maintainability")
    }
}

fn number(map: &Map<String, Value>, metric: &str, section: &str) -> Result<f64, ToolError> {
    map.get(metric)
        .and_then(Value::as_f64)
        .ok_or_else(|| ToolError::malformed(TOOL, format!("{} has no numeric {:?}", section, metric)))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const REPORT: &str = r#"{
      "overall": {"loc": 120, "comment_ratio": 12.5, "cyclomatic_complexity": 14},
      "files": {
        "/s/Main.java": {"loc": 80, "comment_ratio": 10.0, "cyclomatic_complexity": 9, "halstead_volume": 900.0},
        "/s/Board.java": {"loc": 40, "comment_ratio": 20.0, "cyclomatic_complexity": 5, "halstead_volume": 300.0},
        "/s/Empty.java": {}
      },
      "stats": {
        "mean": {"cyclomatic_complexity": 7.0, "halstead_volume": 600.0, "halstead_difficulty": 12.0, "halstead_timerequired": 400.0, "halstead_effort": 7200.0},
        "min": {"cyclomatic_complexity": 5, "halstead_volume": 300.0, "halstead_difficulty": 8.0, "halstead_timerequired": 133.3, "halstead_effort": 2400.0},
        "max": {"cyclomatic_complexity": 9, "halstead_volume": 900.0, "halstead_difficulty": 16.0, "halstead_timerequired": 666.7, "halstead_effort": 12000.0}
      }
    }"#;

    #[test]
    fn test_parse_report() {
        let report = MultimetricReport::parse(REPORT).unwrap();
        assert_eq!(report.overall("loc").unwrap(), 120.0);
        assert_eq!(report.overall("comment_ratio").unwrap(), 12.5);

        let cc = report.stat(CYCLOMATIC).unwrap();
        assert_eq!((cc.mean, cc.min, cc.max), (7.0, 5.0, 9.0));
    }

    #[test]
    fn test_maintainability_skips_empty_files() {
        let report = MultimetricReport::parse(REPORT).unwrap();
        let mi = report.maintainability().unwrap();
        assert_eq!(mi.len(), 2);
        assert!(mi.iter().all(|m| (0.0..=100.0).contains(m)));
        let triple = report.maintainability_triple().unwrap();
        assert!(triple.min <= triple.mean && triple.mean <= triple.max);
    }

    #[test]
    fn test_missing_metric_is_malformed() {
        let report = MultimetricReport::parse(REPORT).unwrap();
        assert!(matches!(
            report.stat("halstead_bugprop"),
            Err(ToolError::Malformed { .. })
        ));
        assert!(MultimetricReport::parse("{\"overall\": {}}").is_err());
    }

    #[test]
    fn test_all_files_empty() {
        let json = r#"{"overall": {"loc": 0}, "files": {"/s/A.java": {}},
            "stats": {"mean": {}, "min": {}, "max": {}}}"#;
        let report = MultimetricReport::parse(json).unwrap();
        assert!(matches!(
            report.maintainability_triple(),
            Err(AnalysisError::EmptyScores { .. })
        ));
    }
}
