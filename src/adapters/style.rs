//! Style checkers for the Python `style_errors` column.

use std::path::PathBuf;
use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;

use super::process::run_tool;
use crate::config::{StyleKind, ToolCommand, ToolsConfig};
use crate::error::AnalysisError;
use crate::model::SourceFile;

/// Counts coding-convention violations across a file set.
pub trait StyleChecker: Send + Sync {
    fn name(&self) -> &'static str;

    fn count(&self, files: &[SourceFile]) -> Result<usize, AnalysisError>;
}

/// Build the configured checker.
pub fn style_checker(tools: &ToolsConfig) -> Box<dyn StyleChecker> {
    match tools.style.kind {
        StyleKind::Builtin => Box::new(BuiltinStyle::default()),
        StyleKind::Pycodestyle => Box::new(Pycodestyle {
            command: tools.style.command.clone(),
            timeout: tools.timeout_for(&tools.style.command),
        }),
    }
}

/// A PEP 8 violation found by [`BuiltinStyle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleViolation {
    /// 1-based line number.
    pub line: usize,
    pub code: &'static str,
}

/// In-process subset of pycodestyle's line checks.
pub struct BuiltinStyle {
    pub max_line_length: usize,
}

impl Default for BuiltinStyle {
    fn default() -> Self {
        Self { max_line_length: 79 }
    }
}

impl BuiltinStyle {
    /// Check one file's text.
    pub fn check(&self, text: &str) -> Vec<StyleViolation> {
        let mut found = Vec::new();
        let lines: Vec<&str> = text.lines().collect();

        for (idx, line) in lines.iter().enumerate() {
            let line_no = idx + 1;
            if line.chars().count() > self.max_line_length {
                found.push(StyleViolation { line: line_no, code: "E501" });
            }
            let indent: String = line.chars().take_while(|c| c.is_whitespace()).collect();
            if indent.contains('\t') {
                found.push(StyleViolation { line: line_no, code: "W191" });
            }
            if line.trim().is_empty() {
                if !line.is_empty() {
                    found.push(StyleViolation { line: line_no, code: "W293" });
                }
            } else if line.ends_with(char::is_whitespace) {
                found.push(StyleViolation { line: line_no, code: "W291" });
            }
        }

        if let Some(last) = lines.iter().rposition(|l| !l.trim().is_empty()) {
            if last + 1 < lines.len() {
                found.push(StyleViolation {
                    line: lines.len(),
                    code: "W391",
                });
            }
        }
        found
    }
}

impl StyleChecker for BuiltinStyle {
    fn name(&self) -> &'static str {
        "builtin"
    }

    fn count(&self, files: &[SourceFile]) -> Result<usize, AnalysisError> {
        Ok(files.iter().map(|f| self.check(&f.text).len()).sum())
    }
}

lazy_static! {
    /// `path:line:col: CODE message`
    static ref REPORT_LINE: Regex = Regex::new(r"^.+:\d+:\d+: [A-Z]\d+\b").unwrap();
}

/// External `pycodestyle` process.
pub struct Pycodestyle {
    pub command: ToolCommand,
    pub timeout: Duration,
}

impl StyleChecker for Pycodestyle {
    fn name(&self) -> &'static str {
        "pycodestyle"
    }

    fn count(&self, files: &[SourceFile]) -> Result<usize, AnalysisError> {
        let paths: Vec<PathBuf> = files.iter().map(|f| f.path.clone()).collect();
        let output = run_tool(self.name(), &self.command, &paths, self.timeout)?;
        Ok(count_report_lines(&output.stdout))
    }
}

fn count_report_lines(stdout: &str) -> usize {
    stdout.lines().filter(|l| REPORT_LINE.is_match(l)).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SourceLanguage;

    fn codes(text: &str) -> Vec<&'static str> {
        BuiltinStyle::default()
            .check(text)
            .into_iter()
            .map(|v| v.code)
            .collect()
    }

    #[test]
    fn test_clean_file() {
        assert!(codes("def f():\n    return 1\n").is_empty());
    }

    #[test]
    fn test_line_checks() {
        let long = format!("x = '{}'\n", "a".repeat(80));
        assert_eq!(codes(&long), vec!["E501"]);
        assert_eq!(codes("if x:\n\ty = 1\n"), vec!["W191"]);
        assert_eq!(codes("x = 1   \n"), vec!["W291"]);
        assert_eq!(codes("x = 1\n    \ny = 2\n"), vec!["W293"]);
    }

    #[test]
    fn test_trailing_blank_lines() {
        assert_eq!(codes("x = 1\n\n\n"), vec!["W391"]);
    }

    #[test]
    fn test_count_across_files() {
        let files = vec![
            SourceFile {
                path: PathBuf::from("a.py"),
                text: "x = 1 \n".to_string(),
                language: SourceLanguage::Python,
            },
            SourceFile {
                path: PathBuf::from("b.py"),
                text: "y = 2\n\n".to_string(),
                language: SourceLanguage::Python,
            },
        ];
        assert_eq!(BuiltinStyle::default().count(&files).unwrap(), 2);
    }

    #[test]
    fn test_count_report_lines() {
        let stdout = "\
/s/a.py:1:80: E501 line too long (85 > 79 characters)
/s/a.py:3:1: W391 blank line at end of file
1       E501 line too long
";
        assert_eq!(count_report_lines(stdout), 2);
    }
}
