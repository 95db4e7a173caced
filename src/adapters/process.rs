//! Out-of-process tool invocation.
//!
//! Each call gets its own manifest file (when the command asks for one)
//! and its own timeout. A timed-out child is killed when its future is
//! dropped.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tempfile::NamedTempFile;
use tokio::process::Command;

use crate::config::{ToolCommand, FILES_PLACEHOLDER, MANIFEST_PLACEHOLDER};
use crate::error::ToolError;

/// Captured result of a tool run whose exit code was accepted.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    pub code: Option<i32>,
}

/// Longest stderr excerpt kept in an error.
const STDERR_EXCERPT: usize = 2000;

/// Run `command` over `files` and capture its output.
pub fn run_tool(
    tool: &str,
    command: &ToolCommand,
    files: &[PathBuf],
    timeout: Duration,
) -> Result<ToolOutput, ToolError> {
    let io_err = |source: std::io::Error| ToolError::Io {
        tool: tool.to_string(),
        source,
    };

    let manifest = if command.uses_manifest() {
        Some(write_manifest(files).map_err(io_err)?)
    } else {
        None
    };
    let args = expand_args(&command.args, manifest.as_ref().map(|m| m.path()), files);

    tracing::debug!(tool, program = command.program.as_str(), files = files.len(), "running tool");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(io_err)?;

    let output = runtime.block_on(async {
        let child = Command::new(&command.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ToolError::Spawn {
                tool: tool.to_string(),
                program: command.program.clone(),
                source,
            })?;

        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(io_err),
            Err(_) => Err(ToolError::Timeout {
                tool: tool.to_string(),
                timeout,
            }),
        }
    })?;

    // The manifest lives until the child has exited.
    drop(manifest);

    let code = output.status.code();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    let accepted = code.is_some_and(|c| command.ok_exit_codes.contains(&c));
    if !accepted {
        return Err(ToolError::Exit {
            tool: tool.to_string(),
            code,
            stderr: excerpt(&stderr),
        });
    }

    Ok(ToolOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr,
        code,
    })
}

/// One absolute path per line.
fn write_manifest(files: &[PathBuf]) -> std::io::Result<NamedTempFile> {
    let mut manifest = tempfile::Builder::new()
        .prefix("cohortscan-manifest-")
        .suffix(".txt")
        .tempfile()?;
    for file in files {
        writeln!(manifest, "{}", absolute(file).display())?;
    }
    manifest.flush()?;
    Ok(manifest)
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

/// Expand `{files}` to one argument per file and `{manifest}` to the
/// manifest path.
fn expand_args(args: &[String], manifest: Option<&Path>, files: &[PathBuf]) -> Vec<String> {
    let mut expanded = Vec::with_capacity(args.len() + files.len());
    for arg in args {
        if arg == FILES_PLACEHOLDER {
            expanded.extend(files.iter().map(|f| absolute(f).display().to_string()));
        } else if let (Some(path), true) = (manifest, arg.contains(MANIFEST_PLACEHOLDER)) {
            expanded.push(arg.replace(MANIFEST_PLACEHOLDER, &path.display().to_string()));
        } else {
            expanded.push(arg.clone());
        }
    }
    expanded
}

fn excerpt(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(STDERR_EXCERPT) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
