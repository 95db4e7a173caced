//! Per-language result schemas.
//!
//! A schema is an ordered list of columns, each naming where its value
//! comes from in an [`AnalyzerOutput`](crate::adapters::AnalyzerOutput).

use once_cell::sync::Lazy;

use crate::adapters::keys;
use crate::model::SourceLanguage;

/// Where a column's value comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// A scalar reported by the adapter.
    Field(String),
    /// `numerator / denominator`, undefined when the denominator is zero.
    Ratio {
        numerator: String,
        denominator: String,
    },
    SeriesMean(String),
    SeriesMin(String),
    SeriesMax(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub source: Source,
}

impl Column {
    fn field(name: &str, key: &str) -> Self {
        Self {
            name: name.to_string(),
            source: Source::Field(key.to_string()),
        }
    }
}

/// Ordered output columns for one language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub language: SourceLanguage,
    pub columns: Vec<Column>,
}

static PYTHON: Lazy<Schema> = Lazy::new(python_schema);
static JAVA: Lazy<Schema> = Lazy::new(java_schema);

impl Schema {
    pub fn for_language(language: SourceLanguage) -> &'static Schema {
        match language {
            SourceLanguage::Python => &*PYTHON,
            SourceLanguage::Java => &*JAVA,
        }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

fn triple(columns: &mut Vec<Column>, name: &str, prefix: &str) {
    columns.push(Column::field(&format!("{}_mean", name), &keys::mean(prefix)));
    columns.push(Column::field(&format!("{}_min", name), &keys::min(prefix)));
    columns.push(Column::field(&format!("{}_max", name), &keys::max(prefix)));
}

/// Columns shared by both languages, through the Halstead triples.
fn common_columns() -> Vec<Column> {
    let mut columns = vec![
        Column::field("loc", keys::LOC),
        Column::field("comment_ratio", keys::COMMENT_RATIO),
        Column::field("style_errors", keys::STYLE_ERRORS),
        Column {
            name: "style_errors_per_loc".to_string(),
            source: Source::Ratio {
                numerator: keys::STYLE_ERRORS.to_string(),
                denominator: keys::LOC.to_string(),
            },
        },
    ];
    triple(&mut columns, "cc", keys::CC);
    triple(&mut columns, "mi", keys::MI);
    triple(&mut columns, "halstead_volume", keys::HALSTEAD_VOLUME);
    triple(&mut columns, "halstead_difficulty", keys::HALSTEAD_DIFFICULTY);
    triple(&mut columns, "halstead_time", keys::HALSTEAD_TIME);
    triple(&mut columns, "halstead_effort", keys::HALSTEAD_EFFORT);
    columns
}

pub fn python_schema() -> Schema {
    let mut columns = common_columns();
    // A file without module-level functions contributes 1.0 to each.
    triple(&mut columns, "cognitive", keys::COGNITIVE);
    for (name, key) in [
        ("lloc", keys::LLOC),
        ("sloc", keys::SLOC),
        ("comments", keys::COMMENTS),
        ("multi", keys::MULTI),
        ("single_comments", keys::SINGLE_COMMENTS),
        ("functions", keys::FUNCTIONS),
        ("classes", keys::CLASSES),
        ("skipped", keys::SKIPPED),
    ] {
        columns.push(Column::field(name, key));
    }
    Schema {
        language: SourceLanguage::Python,
        columns,
    }
}

pub fn java_schema() -> Schema {
    let mut columns = common_columns();
    // PMD only reports methods over its threshold. With none reported, all
    // three columns are 1.0, the same unit value Python uses.
    let scores = keys::COGNITIVE_SCORES.to_string();
    columns.push(Column {
        name: "cognitive_mean".to_string(),
        source: Source::SeriesMean(scores.clone()),
    });
    columns.push(Column {
        name: "cognitive_min".to_string(),
        source: Source::SeriesMin(scores.clone()),
    });
    columns.push(Column {
        name: "cognitive_max".to_string(),
        source: Source::SeriesMax(scores),
    });
    columns.push(Column::field("skipped", keys::SKIPPED));
    Schema {
        language: SourceLanguage::Java,
        columns,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_python_column_order() {
        let schema = Schema::for_language(SourceLanguage::Python);
        assert_eq!(schema.len(), 33);
        let names: Vec<&str> = schema.names().collect();
        assert_eq!(&names[..4], &["loc", "comment_ratio", "style_errors", "style_errors_per_loc"]);
        assert_eq!(names[4], "cc_mean");
        assert_eq!(names[7], "mi_mean");
        assert_eq!(names[10], "halstead_volume_mean");
        assert_eq!(names[22], "cognitive_mean");
        assert_eq!(names[25], "lloc");
        assert_eq!(names[32], "skipped");
    }

    #[test]
    fn test_java_shares_prefix() {
        let python = Schema::for_language(SourceLanguage::Python);
        let java = Schema::for_language(SourceLanguage::Java);
        assert_eq!(java.len(), 26);
        let py: Vec<&str> = python.names().take(25).collect();
        let jv: Vec<&str> = java.names().take(25).collect();
        assert_eq!(py, jv);
        assert_eq!(java.index_of("skipped"), Some(25));
        assert!(matches!(
            java.columns[22].source,
            Source::SeriesMean(_)
        ));
    }

    #[test]
    fn test_column_names_unique() {
        for language in [SourceLanguage::Python, SourceLanguage::Java] {
            let schema = Schema::for_language(language);
            let mut names: Vec<&str> = schema.names().collect();
            names.sort_unstable();
            names.dedup();
            assert_eq!(names.len(), schema.len());
        }
    }
}
