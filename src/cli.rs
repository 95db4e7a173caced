//! Command-line interface for cohortscan.

use clap::{ArgAction, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::batch::{Batch, BatchError};
use crate::config::{self, CohortConfig, Config};
use crate::locate::Locator;
use crate::report;
use crate::table;

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

const DEFAULT_CONFIG: &str = "cohortscan.yaml";
const TEMPLATE: &str = include_str!("templates/cohortscan.yaml");

/// Code metrics for every participant of a study cohort.
///
/// Cohortscan resolves each completed survey response to the participant's
/// submitted source tree, runs the language's analyzers over it, and writes
/// one fixed-order metrics row per participant and project.
#[derive(Parser)]
#[command(name = "cohortscan")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug; RUST_LOG overrides)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze every cohort in a configuration file
    Run(RunArgs),
    /// Resolve one participant to a source directory without analyzing it
    Locate(LocateArgs),
    /// Write a configuration template
    Init(InitArgs),
}

/// Arguments for the run command.
#[derive(Parser)]
pub struct RunArgs {
    /// Path to the configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,

    /// Only run the named cohort (repeatable)
    #[arg(long = "cohort")]
    pub cohorts: Vec<String>,

    /// Records analyzed concurrently (overrides the config)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Write per-record diagnostics as JSON to this file
    #[arg(short, long)]
    pub diagnostics: Option<PathBuf>,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

/// Arguments for the locate command.
#[derive(Parser)]
pub struct LocateArgs {
    /// Path to the configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,

    /// Cohort whose layout to use
    #[arg(long)]
    pub cohort: String,

    /// Identity field as it appears in the survey (email, username, or full name)
    pub identity: String,

    /// Project number
    pub project_id: i64,

    /// Project name, for layouts that use it
    #[arg(default_value = "")]
    pub project_name: String,
}

/// Arguments for the init command.
#[derive(Parser)]
pub struct InitArgs {
    /// Output file path
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub output: PathBuf,

    /// Overwrite an existing file
    #[arg(short, long)]
    pub force: bool,
}

fn load_config(path: &Path) -> Option<Config> {
    let config = match Config::parse_file(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error parsing config {}: {:#}", path.display(), e);
            return None;
        }
    };
    if let Err(e) = config::validate(&config) {
        eprintln!("Error: invalid config: {}", e);
        return None;
    }
    Some(config)
}

/// Set `cancel` when the process receives Ctrl-C.
fn watch_interrupt(cancel: Arc<AtomicBool>) {
    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(rt) => rt,
            Err(e) => {
                tracing::warn!("cannot install interrupt handler: {}", e);
                return;
            }
        };
        runtime.block_on(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, finishing records already in flight");
                cancel.store(true, Ordering::Relaxed);
            }
        });
    });
}

/// Run the run command.
pub fn run_cohorts(args: &RunArgs) -> anyhow::Result<i32> {
    let Some(config) = load_config(&args.config) else {
        return Ok(EXIT_ERROR);
    };

    let selected: Vec<&CohortConfig> = if args.cohorts.is_empty() {
        config.cohorts.iter().collect()
    } else {
        let mut selected = Vec::new();
        for name in &args.cohorts {
            match config.cohort(name) {
                Some(c) => selected.push(c),
                None => {
                    eprintln!("Error: no cohort named {:?} in {}", name, args.config.display());
                    return Ok(EXIT_ERROR);
                }
            }
        }
        selected
    };

    let cancel = Arc::new(AtomicBool::new(false));
    watch_interrupt(Arc::clone(&cancel));

    report::write_header();
    let mut reports = Vec::new();
    let mut failed = false;

    for cohort in selected {
        let records = table::load_participants(&config.resolve(&cohort.survey), cohort)?;
        let batch = Batch::new(&config, cohort, Arc::clone(&cancel))?
            .with_jobs(args.jobs)
            .with_progress(!args.no_progress);

        let report = match batch.run(records) {
            Ok(r) => r,
            Err(BatchError::Schema(violation)) => {
                eprintln!("Error: cohort {} aborted: {}", cohort.name, violation);
                failed = true;
                break;
            }
            Err(e) => return Err(e.into()),
        };

        let output = config.resolve(&cohort.output);
        if !report.cancelled {
            table::write_results(&output, cohort, &report.rows)?;
        }
        report::write_pretty(&report, Some(output.as_path()));

        let cancelled = report.cancelled;
        reports.push(report);
        if cancelled {
            failed = true;
            break;
        }
    }

    if let Some(path) = &args.diagnostics {
        report::write_diagnostics(path, &reports)?;
    }

    if failed {
        Ok(EXIT_FAILED)
    } else {
        Ok(EXIT_SUCCESS)
    }
}

/// Run the locate command.
pub fn run_locate(args: &LocateArgs) -> anyhow::Result<i32> {
    let Some(config) = load_config(&args.config) else {
        return Ok(EXIT_ERROR);
    };
    let Some(cohort) = config.cohort(&args.cohort) else {
        eprintln!("Error: no cohort named {:?} in {}", args.cohort, args.config.display());
        return Ok(EXIT_ERROR);
    };

    let locator = Locator::new(&config, cohort);
    match locator.locate_identity(&args.identity, args.project_id, &args.project_name) {
        Ok(tree) => {
            report::write_located(&args.identity, &tree);
            Ok(EXIT_SUCCESS)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            Ok(EXIT_FAILED)
        }
    }
}

/// Run the init command.
pub fn run_init(args: &InitArgs) -> anyhow::Result<i32> {
    if args.output.exists() && !args.force {
        eprintln!("Error: file already exists: {}", args.output.display());
        eprintln!("Use --force to overwrite it or --output to choose another path");
        return Ok(EXIT_ERROR);
    }

    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() && parent != Path::new(".") {
            if let Err(e) = std::fs::create_dir_all(parent) {
                eprintln!("Error: failed to create directory: {}", e);
                return Ok(EXIT_ERROR);
            }
        }
    }

    if let Err(e) = std::fs::write(&args.output, TEMPLATE) {
        eprintln!("Error: failed to write config: {}", e);
        return Ok(EXIT_ERROR);
    }

    println!("Created {}", args.output.display());
    println!();
    println!("Next steps:");
    println!("  1. Point each cohort at its survey and source tree");
    println!("  2. Check a participant: cohortscan locate --config {} --cohort <name> <identity> <project>", args.output.display());
    println!("  3. Run: cohortscan run --config {}", args.output.display());

    Ok(EXIT_SUCCESS)
}
