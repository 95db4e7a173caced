//! Result normalizer: adapter output → fixed-order metrics vector.
//!
//! Resolution is by name. A column whose source the adapter never reported
//! is a [`SchemaViolation`]; the only arithmetic done here is the
//! style-errors-per-line ratio and mean/min/max over a reported series.

pub mod schema;

use serde::Serialize;
use thiserror::Error;

use crate::adapters::AnalyzerOutput;
use crate::analysis::{round2, Triple};
use crate::error::SchemaViolation;
use crate::model::SourceLanguage;

pub use schema::{Column, Schema, Source};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NormalizeError {
    #[error(transparent)]
    Schema(#[from] SchemaViolation),
    #[error("{column} is undefined because {denominator} is zero")]
    Undefined { column: String, denominator: String },
}

/// Ordered metric values matching a language's [`Schema`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsVector {
    pub language: SourceLanguage,
    values: Vec<f64>,
}

impl MetricsVector {
    /// Wrap `values`, rejecting any width other than the schema's.
    pub fn new(language: SourceLanguage, values: Vec<f64>) -> Result<Self, SchemaViolation> {
        let expected = Schema::for_language(language).len();
        if values.len() != expected {
            return Err(SchemaViolation {
                language: language.to_string(),
                message: format!("{} values for {} columns", values.len(), expected),
            });
        }
        Ok(Self { language, values })
    }

    /// All-zero vector for a record that produced no metrics.
    pub fn zeroed(language: SourceLanguage) -> Self {
        Self {
            language,
            values: vec![0.0; Schema::for_language(language).len()],
        }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, column: &str) -> Option<f64> {
        Schema::for_language(self.language)
            .index_of(column)
            .map(|i| self.values[i])
    }

    /// The size metric used to drop rows without usable source.
    pub fn loc(&self) -> f64 {
        self.get("loc").unwrap_or(0.0)
    }
}

/// Resolve every schema column against an adapter's output.
pub fn normalize(schema: &Schema, output: &AnalyzerOutput) -> Result<MetricsVector, NormalizeError> {
    let violation = |message: String| SchemaViolation {
        language: schema.language.to_string(),
        message,
    };
    let field = |column: &str, key: &str| {
        output.get(key).ok_or_else(|| {
            violation(format!("column {} needs {}, which the adapter did not report", column, key))
        })
    };

    let mut values = Vec::with_capacity(schema.len());
    for column in &schema.columns {
        let value = match &column.source {
            Source::Field(key) => field(&column.name, key)?,
            Source::Ratio {
                numerator,
                denominator,
            } => {
                let den = field(&column.name, denominator)?;
                if den == 0.0 {
                    return Err(NormalizeError::Undefined {
                        column: column.name.clone(),
                        denominator: denominator.clone(),
                    });
                }
                round2(field(&column.name, numerator)? / den)
            }
            Source::SeriesMean(key) | Source::SeriesMin(key) | Source::SeriesMax(key) => {
                let series = output.series(key).ok_or_else(|| {
                    violation(format!(
                        "column {} needs series {}, which the adapter did not report",
                        column.name, key
                    ))
                })?;
                series_value(&column.source, series)
            }
        };
        values.push(value);
    }

    Ok(MetricsVector::new(schema.language, values)?)
}

/// Mean/min/max of a series; an empty series scores the unit value, like a
/// Python file without functions.
fn series_value(source: &Source, series: &[f64]) -> f64 {
    let triple = Triple::of(series, "series")
        .unwrap_or(Triple::UNIT)
        .rounded();
    match source {
        Source::SeriesMin(_) => triple.min,
        Source::SeriesMax(_) => triple.max,
        _ => triple.mean,
    }
}
