//! Aggregation helpers shared by every analyzer.

use serde::Serialize;

use crate::error::AnalysisError;

/// Decimal places every reported metric is rounded to.
pub const PRECISION: i32 = 2;

/// Round to [`PRECISION`] decimal places.
pub fn round2(value: f64) -> f64 {
    let scale = 10f64.powi(PRECISION);
    (value * scale).round() / scale
}

/// Mean, min and max of a score set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Triple {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

impl Triple {
    /// Every score of a file with no functions.
    pub const UNIT: Triple = Triple {
        mean: 1.0,
        min: 1.0,
        max: 1.0,
    };

    /// Compute over a non-empty set of scores.
    pub fn of(values: &[f64], metric: &'static str) -> Result<Self, AnalysisError> {
        if values.is_empty() {
            return Err(AnalysisError::EmptyScores { metric });
        }
        let sum: f64 = values.iter().sum();
        Ok(Self {
            mean: sum / values.len() as f64,
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        })
    }

    /// Combine per-file triples: mean of means, min of mins, max of maxes.
    pub fn combine(parts: &[Triple], metric: &'static str) -> Result<Self, AnalysisError> {
        if parts.is_empty() {
            return Err(AnalysisError::EmptyScores { metric });
        }
        let means: Vec<f64> = parts.iter().map(|t| t.mean).collect();
        Ok(Self {
            mean: means.iter().sum::<f64>() / means.len() as f64,
            min: parts.iter().map(|t| t.min).fold(f64::INFINITY, f64::min),
            max: parts.iter().map(|t| t.max).fold(f64::NEG_INFINITY, f64::max),
        })
    }

    pub fn rounded(self) -> Self {
        Self {
            mean: round2(self.mean),
            min: round2(self.min),
            max: round2(self.max),
        }
    }
}

/// Maintainability index on a 0..=100 scale.
///
/// `comment_percent` is comment lines as a percentage of source lines.
/// Files with no Halstead volume or no logical lines score 100.
pub fn maintainability_index(volume: f64, complexity: f64, lloc: f64, comment_percent: f64) -> f64 {
    if volume <= 0.0 || lloc <= 0.0 {
        return 100.0;
    }
    let comment_term = 50.0 * (2.46 * comment_percent.to_radians()).sqrt().sin();
    let raw = 171.0 - 5.2 * volume.ln() - 0.23 * complexity - 16.2 * lloc.ln() + comment_term;
    (raw * 100.0 / 171.0).clamp(0.0, 100.0)
}
