//! Java adapter: multimetric for size/complexity/Halstead, PMD for
//! violations and per-method cognitive complexity.

use std::path::PathBuf;

use crate::config::{ToolCommand, ToolsConfig};
use crate::error::AnalysisError;
use crate::model::{SourceFile, SourceLanguage};

use super::multimetric::{self, MultimetricReport};
use super::pmd;
use super::process::run_tool;
use super::{keys, Adapter, AnalyzerOutput};

pub struct JavaAdapter {
    tools: ToolsConfig,
}

impl JavaAdapter {
    pub fn new(tools: &ToolsConfig) -> Self {
        Self {
            tools: tools.clone(),
        }
    }

    fn run(&self, tool: &str, command: &ToolCommand, files: &[PathBuf]) -> Result<String, AnalysisError> {
        let output = run_tool(tool, command, files, self.tools.timeout_for(command))?;
        Ok(output.stdout)
    }
}

impl Adapter for JavaAdapter {
    fn language(&self) -> SourceLanguage {
        SourceLanguage::Java
    }

    fn analyze(&self, files: &[SourceFile]) -> Result<AnalyzerOutput, AnalysisError> {
        let paths: Vec<PathBuf> = files.iter().map(|f| f.path.clone()).collect();

        let report = MultimetricReport::parse(&self.run(
            multimetric::TOOL,
            &self.tools.multimetric,
            &paths,
        )?)?;
        let violations = pmd::summarize(&self.run(pmd::TOOL, &self.tools.pmd, &paths)?)?;

        let mut out = AnalyzerOutput::default();
        out.set(keys::LOC, report.overall("loc")?);
        out.set(keys::COMMENT_RATIO, report.overall("comment_ratio")?);
        out.set_count(keys::STYLE_ERRORS, violations.violations);

        out.set_triple(keys::MI, report.maintainability_triple()?);
        out.set_triple(keys::CC, report.stat(multimetric::CYCLOMATIC)?);
        out.set_triple(keys::HALSTEAD_VOLUME, report.stat(multimetric::HALSTEAD_VOLUME)?);
        out.set_triple(
            keys::HALSTEAD_DIFFICULTY,
            report.stat(multimetric::HALSTEAD_DIFFICULTY)?,
        );
        out.set_triple(keys::HALSTEAD_TIME, report.stat(multimetric::HALSTEAD_TIME)?);
        out.set_triple(keys::HALSTEAD_EFFORT, report.stat(multimetric::HALSTEAD_EFFORT)?);
        out.set_series(keys::COGNITIVE_SCORES, violations.cognitive);

        Ok(out)
    }
}
