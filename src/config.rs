//! Configuration schema for cohortscan.
//!
//! A configuration file describes the external analyzer tools and one or
//! more cohorts: where each cohort's survey table and source trees live, how
//! participants map to directories, and where results go.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::model::SourceLanguage;

/// Placeholders allowed in tool argument lists.
pub const MANIFEST_PLACEHOLDER: &str = "{manifest}";
pub const FILES_PLACEHOLDER: &str = "{files}";

/// Placeholders allowed in directory templates.
const TEMPLATE_PLACEHOLDERS: &[&str] = &["{username}", "{project_id}", "{project_name}"];

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub version: String,
    /// Number of records analyzed concurrently (default: one per CPU)
    #[serde(default)]
    pub jobs: Option<usize>,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub cohorts: Vec<CohortConfig>,
    /// Directory relative paths are resolved against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Config {
    /// Parse a configuration from a YAML file.
    ///
    /// Relative paths inside the file resolve against the file's directory.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&content)?;
        config.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(config)
    }

    /// Resolve a configured path against the config file's directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Find a cohort by name.
    pub fn cohort(&self, name: &str) -> Option<&CohortConfig> {
        self.cohorts.iter().find(|c| c.name == name)
    }
}

/// External analyzer tool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolsConfig {
    /// Default timeout for every external tool invocation, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub style: StyleConfig,
    #[serde(default = "ToolCommand::default_pmd")]
    pub pmd: ToolCommand,
    #[serde(default = "ToolCommand::default_multimetric")]
    pub multimetric: ToolCommand,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            style: StyleConfig::default(),
            pmd: ToolCommand::default_pmd(),
            multimetric: ToolCommand::default_multimetric(),
        }
    }
}

impl ToolsConfig {
    /// Effective timeout for a command (its own override or the default).
    pub fn timeout_for(&self, command: &ToolCommand) -> Duration {
        Duration::from_secs(command.timeout_secs.unwrap_or(self.timeout_secs))
    }
}

fn default_timeout_secs() -> u64 {
    120
}

/// Which style checker backs the Python `style_errors` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StyleKind {
    /// In-process PEP 8 subset.
    Builtin,
    /// External `pycodestyle` process.
    #[default]
    Pycodestyle,
}

/// Style checker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StyleConfig {
    #[serde(default)]
    pub kind: StyleKind,
    #[serde(default = "ToolCommand::default_pycodestyle")]
    pub command: ToolCommand,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            kind: StyleKind::default(),
            command: ToolCommand::default_pycodestyle(),
        }
    }
}

/// How to invoke one external tool.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ToolCommand {
    pub program: String,
    /// Arguments; `{manifest}` and `{files}` are expanded per invocation
    #[serde(default)]
    pub args: Vec<String>,
    /// Exit codes that still mean the output is usable (default: [0])
    #[serde(default = "default_ok_exit_codes")]
    pub ok_exit_codes: Vec<i32>,
    /// Per-tool timeout override, in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_ok_exit_codes() -> Vec<i32> {
    vec![0]
}

impl ToolCommand {
    /// PMD with a JSON report; exit code 4 means "violations found".
    pub fn default_pmd() -> Self {
        Self {
            program: "pmd".to_string(),
            args: [
                "check",
                "--no-progress",
                "--file-list",
                MANIFEST_PLACEHOLDER,
                "--format",
                "json",
                "--rulesets",
                "rulesets/internal/all-java.xml",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            ok_exit_codes: vec![0, 4],
            timeout_secs: None,
        }
    }

    pub fn default_multimetric() -> Self {
        Self {
            program: "multimetric".to_string(),
            args: vec![FILES_PLACEHOLDER.to_string()],
            ok_exit_codes: vec![0],
            timeout_secs: None,
        }
    }

    /// pycodestyle exits 1 when it reports violations.
    pub fn default_pycodestyle() -> Self {
        Self {
            program: "pycodestyle".to_string(),
            args: vec![FILES_PLACEHOLDER.to_string()],
            ok_exit_codes: vec![0, 1],
            timeout_secs: None,
        }
    }

    /// Whether any argument references the manifest file.
    pub fn uses_manifest(&self) -> bool {
        self.args.iter().any(|a| a.contains(MANIFEST_PLACEHOLDER))
    }
}

/// One cohort: a survey table plus the source trees it refers to.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CohortConfig {
    /// Cohort/experiment id written to every output row
    pub name: String,
    pub language: SourceLanguage,
    /// Survey CSV path
    pub survey: PathBuf,
    /// Root directory of the cohort's source trees
    pub source_root: PathBuf,
    /// Result CSV path
    pub output: PathBuf,
    #[serde(default)]
    pub columns: SurveyColumns,
    /// Survey columns copied verbatim to the output (default: Gender, Race)
    #[serde(default = "default_passthrough")]
    pub passthrough: Vec<Passthrough>,
    /// How the identity column maps to a username (default: email)
    #[serde(default)]
    pub identity: IdentityScheme,
    /// Full names that match several directories, mapped to the right one
    #[serde(default)]
    pub disambiguation: BTreeMap<String, String>,
    /// File-name globs to skip (default depends on the language)
    #[serde(default)]
    pub exclude: Option<Vec<String>>,
    pub layout: LayoutConfig,
}

impl CohortConfig {
    /// Exclusion globs in effect for this cohort.
    pub fn exclusions(&self) -> Vec<String> {
        self.exclude
            .clone()
            .unwrap_or_else(|| self.language.default_exclusions())
    }

    /// Whether output rows carry a `submit_num` column.
    pub fn tracks_submissions(&self) -> bool {
        matches!(self.layout, LayoutConfig::SubmitHistory { .. })
    }
}

/// Survey column names.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SurveyColumns {
    #[serde(default = "default_progress_column")]
    pub progress: String,
    /// Value of the progress column that marks a complete response
    #[serde(default = "default_complete_value")]
    pub complete_value: String,
    #[serde(default = "default_identity_column")]
    pub identity: String,
    #[serde(default = "default_project_id_column")]
    pub project_id: String,
    #[serde(default = "default_project_name_column")]
    pub project_name: String,
}

impl Default for SurveyColumns {
    fn default() -> Self {
        Self {
            progress: default_progress_column(),
            complete_value: default_complete_value(),
            identity: default_identity_column(),
            project_id: default_project_id_column(),
            project_name: default_project_name_column(),
        }
    }
}

fn default_progress_column() -> String {
    "Progress".to_string()
}

fn default_complete_value() -> String {
    "100".to_string()
}

fn default_identity_column() -> String {
    "Q4".to_string()
}

fn default_project_id_column() -> String {
    "Project Number".to_string()
}

fn default_project_name_column() -> String {
    "Q5".to_string()
}

/// A survey column copied to the output table.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Passthrough {
    pub from: String,
    pub to: String,
}

fn default_passthrough() -> Vec<Passthrough> {
    vec![
        Passthrough {
            from: "Gender".to_string(),
            to: "gender".to_string(),
        },
        Passthrough {
            from: "Race".to_string(),
            to: "race".to_string(),
        },
    ]
}

/// How the survey identity field becomes a username.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IdentityScheme {
    /// Lower-cased local part of an email address.
    #[default]
    Email,
    /// The field already is a username.
    Username,
    /// "First Last" → first initial + last name, fuzzy-matched on disk.
    FullName,
}

/// Which snapshot of a multi-submission history to analyze.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionPolicy {
    /// The oldest snapshot (`submit`).
    First,
    /// The `last-submit` marker if present, else the newest numbered snapshot.
    #[default]
    Latest,
}

/// On-disk layout of a cohort's source trees.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayoutConfig {
    /// `{source_root}/{template}` is the project directory.
    Direct {
        #[serde(default = "default_direct_template")]
        template: String,
    },
    /// `{source_root}/{students_template}/{student}/{submission}`.
    SubmitHistory {
        #[serde(default = "default_students_template")]
        students_template: String,
        /// Directory whose entries list every known student (default: the
        /// project's students directory)
        #[serde(default)]
        student_index: Option<PathBuf>,
        #[serde(default)]
        submission: SubmissionPolicy,
    },
}

fn default_direct_template() -> String {
    "{username}/project_{project_id}".to_string()
}

fn default_students_template() -> String {
    "{project_name}/students".to_string()
}

/// Validate a configuration for correctness.
pub fn validate(config: &Config) -> anyhow::Result<()> {
    if config.cohorts.is_empty() {
        anyhow::bail!("no cohorts configured");
    }

    if config.jobs == Some(0) {
        anyhow::bail!("jobs must be at least 1");
    }

    if config.tools.timeout_secs == 0 {
        anyhow::bail!("tools.timeout_secs must be positive");
    }

    for (name, command) in [
        ("style", &config.tools.style.command),
        ("pmd", &config.tools.pmd),
        ("multimetric", &config.tools.multimetric),
    ] {
        validate_command(name, command)?;
    }

    let mut seen = HashSet::new();
    for cohort in &config.cohorts {
        if cohort.name.trim().is_empty() {
            anyhow::bail!("cohort with empty name");
        }
        if !seen.insert(cohort.name.as_str()) {
            anyhow::bail!("duplicate cohort name {:?}", cohort.name);
        }

        for pattern in cohort.exclusions() {
            globset::Glob::new(&pattern).map_err(|e| {
                anyhow::anyhow!(
                    "cohort {:?}: invalid exclude pattern {:?}: {}",
                    cohort.name,
                    pattern,
                    e
                )
            })?;
        }

        let template = match &cohort.layout {
            LayoutConfig::Direct { template } => template,
            LayoutConfig::SubmitHistory {
                students_template, ..
            } => students_template,
        };
        validate_template(&cohort.name, template)?;

        if let (IdentityScheme::FullName, LayoutConfig::Direct { template }) =
            (cohort.identity, &cohort.layout)
        {
            if let Some((prefix, suffix)) = template.split_once("{username}") {
                let whole_segment = (prefix.is_empty() || prefix.ends_with('/'))
                    && (suffix.is_empty() || suffix.starts_with('/'));
                if !whole_segment {
                    anyhow::bail!(
                        "cohort {:?}: full_name identity needs {{username}} as a whole path segment in {:?}",
                        cohort.name,
                        template
                    );
                }
            }
        }
    }

    Ok(())
}

fn validate_command(name: &str, command: &ToolCommand) -> anyhow::Result<()> {
    if command.program.trim().is_empty() {
        anyhow::bail!("tools.{}: program is empty", name);
    }
    if command.timeout_secs == Some(0) {
        anyhow::bail!("tools.{}: timeout_secs must be positive", name);
    }
    for arg in &command.args {
        for placeholder in placeholders(arg) {
            if placeholder != MANIFEST_PLACEHOLDER && placeholder != FILES_PLACEHOLDER {
                anyhow::bail!("tools.{}: unknown placeholder {} in {:?}", name, placeholder, arg);
            }
        }
        if arg.contains(FILES_PLACEHOLDER) && arg != FILES_PLACEHOLDER {
            anyhow::bail!("tools.{}: {} must be a whole argument", name, FILES_PLACEHOLDER);
        }
    }
    Ok(())
}

fn validate_template(cohort: &str, template: &str) -> anyhow::Result<()> {
    for placeholder in placeholders(template) {
        if !TEMPLATE_PLACEHOLDERS.contains(&placeholder) {
            anyhow::bail!(
                "cohort {:?}: unknown placeholder {} in layout template {:?}",
                cohort,
                placeholder,
                template
            );
        }
    }
    Ok(())
}

lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(r"\{[^{}]*\}").unwrap();
}

/// All `{...}` placeholders in a string.
fn placeholders(s: &str) -> Vec<&str> {
    PLACEHOLDER.find_iter(s).map(|m| m.as_str()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
version: "1"
jobs: 2
tools:
  timeout_secs: 30
  style:
    kind: builtin
cohorts:
  - name: CS151_Fall21
    language: python
    survey: surveys/cs151.csv
    source_root: sources/cs151
    output: results/cs151.csv
    layout:
      kind: direct
  - name: Hamilton_Fall20
    language: python
    survey: surveys/hamilton.csv
    source_root: sources/hamilton
    output: results/hamilton.csv
    identity: full_name
    disambiguation:
      "angelo li": amli
    layout:
      kind: submit_history
      submission: first
"#;

    #[test]
    fn test_parse_config() {
        let config: Config = serde_yaml::from_str(YAML).unwrap();
        assert_eq!(config.jobs, Some(2));
        assert_eq!(config.tools.style.kind, StyleKind::Builtin);
        assert_eq!(config.cohorts.len(), 2);

        let cs151 = &config.cohorts[0];
        assert_eq!(cs151.identity, IdentityScheme::Email);
        assert_eq!(cs151.columns.progress, "Progress");
        assert_eq!(cs151.exclusions(), vec!["*authority*".to_string()]);
        assert!(!cs151.tracks_submissions());
        match &cs151.layout {
            LayoutConfig::Direct { template } => {
                assert_eq!(template, "{username}/project_{project_id}")
            }
            other => panic!("unexpected layout {:?}", other),
        }

        let hamilton = config.cohort("Hamilton_Fall20").unwrap();
        assert_eq!(hamilton.identity, IdentityScheme::FullName);
        assert_eq!(hamilton.disambiguation.get("angelo li").unwrap(), "amli");
        assert!(hamilton.tracks_submissions());
        match &hamilton.layout {
            LayoutConfig::SubmitHistory { submission, .. } => {
                assert_eq!(*submission, SubmissionPolicy::First)
            }
            other => panic!("unexpected layout {:?}", other),
        }

        validate(&config).unwrap();
    }

    #[test]
    fn test_tool_defaults() {
        let tools = ToolsConfig::default();
        assert!(tools.pmd.uses_manifest());
        assert!(!tools.multimetric.uses_manifest());
        assert_eq!(tools.pmd.ok_exit_codes, vec![0, 4]);
        assert_eq!(tools.timeout_for(&tools.pmd), Duration::from_secs(120));
    }

    #[test]
    fn test_validate_rejects_duplicate_cohorts() {
        let mut config: Config = serde_yaml::from_str(YAML).unwrap();
        config.cohorts[1].name = config.cohorts[0].name.clone();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_validate_rejects_unknown_placeholders() {
        let mut config: Config = serde_yaml::from_str(YAML).unwrap();
        config.tools.pmd.args.push("{output}".to_string());
        assert!(validate(&config).is_err());

        let mut config: Config = serde_yaml::from_str(YAML).unwrap();
        config.cohorts[0].layout = LayoutConfig::Direct {
            template: "{user}/p{project_id}".to_string(),
        };
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_full_name_template_segment() {
        let mut config: Config = serde_yaml::from_str(YAML).unwrap();
        config.cohorts[0].identity = IdentityScheme::FullName;
        config.cohorts[0].layout = LayoutConfig::Direct {
            template: "u_{username}/p{project_id}".to_string(),
        };
        assert!(validate(&config).is_err());

        config.cohorts[0].layout = LayoutConfig::Direct {
            template: "students/{username}/p{project_id}".to_string(),
        };
        validate(&config).unwrap();
    }

    #[test]
    fn test_resolve_relative_paths() {
        let config = Config {
            base_dir: PathBuf::from("/data/study"),
            ..Default::default()
        };
        assert_eq!(
            config.resolve(Path::new("surveys/a.csv")),
            PathBuf::from("/data/study/surveys/a.csv")
        );
        assert_eq!(config.resolve(Path::new("/abs/b.csv")), PathBuf::from("/abs/b.csv"));
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(
            placeholders("{username}/project_{project_id}"),
            vec!["{username}", "{project_id}"]
        );
        assert!(placeholders("plain").is_empty());
        assert_eq!(placeholders("{open/{project_name}}"), vec!["{project_name}"]);
    }
}
