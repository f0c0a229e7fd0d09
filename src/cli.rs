//! Command-line interface for scene-renamer.
//!
//! Parses arguments with `clap`, layers configuration, runs the pipeline and
//! reports the ledger either as colored terminal output or as the JSON run
//! payload.

use crate::catalog::JsonCatalog;
use crate::config::{RawSettings, RenamerConfig};
use crate::conflict::PathComparison;
use crate::error::RenameResult;
use crate::executor::{ExecutionMode, Executor};
use crate::filesystem::StdFileSystem;
use crate::ledger::{Ledger, LedgerError};
use crate::output::OutputFormatter;
use crate::pipeline::{RunOptions, plan_run};
use crate::planner::OperationStatus;
use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// Rename scene files from catalog metadata.
///
/// Runs as a dry run unless `--commit` or `--select` is given.
#[derive(Debug, Parser)]
#[command(name = "scene-renamer", version)]
pub struct Cli {
    /// JSON catalog export to read scenes from
    #[arg(short, long, value_name = "FILE")]
    pub catalog: PathBuf,

    /// Configuration file (default: .scene-renamer.toml, then ~/.config/scene-renamer/config.toml)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// JSON host settings overriding the configuration file
    #[arg(long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Apply every planned rename
    #[arg(long)]
    pub commit: bool,

    /// Apply only the renames of these scene ids (comma-separated); implies --commit
    #[arg(long, value_name = "IDS", value_delimiter = ',')]
    pub select: Vec<String>,

    /// Destination directories worked on in parallel
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Catalog page size
    #[arg(long)]
    pub per_page: Option<usize>,

    /// Print the run payload as JSON instead of the report
    #[arg(long)]
    pub json: bool,

    /// Also write the ledger to this file
    #[arg(long, value_name = "FILE")]
    pub ledger: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn mode(&self) -> ExecutionMode {
        if self.select.iter().any(|id| !id.trim().is_empty()) {
            ExecutionMode::CommitSelected(self.select.iter().collect())
        } else if self.commit {
            ExecutionMode::CommitAll
        } else {
            ExecutionMode::DryRun
        }
    }

    pub fn into_command(self) -> RenameCommand {
        RenameCommand {
            mode: self.mode(),
            catalog: self.catalog,
            config: self.config,
            settings: self.settings,
            jobs: self.jobs,
            per_page: self.per_page,
            json: self.json,
            ledger: self.ledger,
            verbose: self.verbose > 0,
        }
    }
}

/// Everything one invocation needs, independent of how it was parsed.
#[derive(Debug, Clone)]
pub struct RenameCommand {
    pub catalog: PathBuf,
    pub config: Option<PathBuf>,
    pub settings: Option<PathBuf>,
    pub mode: ExecutionMode,
    pub jobs: Option<usize>,
    pub per_page: Option<usize>,
    pub json: bool,
    pub ledger: Option<PathBuf>,
    pub verbose: bool,
}

impl RenameCommand {
    /// A dry run over `catalog` with default settings.
    pub fn new(catalog: impl Into<PathBuf>) -> Self {
        Self {
            catalog: catalog.into(),
            config: None,
            settings: None,
            mode: ExecutionMode::DryRun,
            jobs: None,
            per_page: None,
            json: false,
            ledger: None,
            verbose: false,
        }
    }
}

/// Runs one invocation and returns its ledger.
///
/// # Examples
///
/// ```no_run
/// use scene_renamer::cli::{RenameCommand, run_cli};
/// use scene_renamer::executor::ExecutionMode;
///
/// let mut command = RenameCommand::new("catalog.json");
/// command.mode = ExecutionMode::CommitAll;
/// match run_cli(&command) {
///     Ok(ledger) => println!("{} operations", ledger.len()),
///     Err(e) => eprintln!("Error: {}", e),
/// }
/// ```
pub fn run_cli(command: &RenameCommand) -> RenameResult<Ledger> {
    let overrides = match &command.settings {
        Some(path) => RawSettings::load_json(path)?,
        None => RawSettings::default(),
    };
    let config = RenamerConfig::load(command.config.as_deref())?.with_overrides(overrides);

    let options = RunOptions {
        per_page: command.per_page.unwrap_or(config.catalog.per_page),
        jobs: command.jobs.unwrap_or(config.execution.jobs),
        comparison: PathComparison::native(),
    };
    let settings = config.settings.into_run_settings()?;
    let catalog = JsonCatalog::load(&command.catalog)?;
    let fs = StdFileSystem;

    let operations = plan_run(&catalog, &fs, &settings, &options)?;
    let executor = Executor::new(&fs)
        .jobs(options.jobs)
        .comparison(options.comparison);

    let ledger = if command.json {
        executor.execute(operations, &command.mode)
    } else {
        if command.mode.is_dry_run() {
            OutputFormatter::dry_run_notice("No files will be moved. Pass --commit to apply.");
        }
        let attempts = Executor::<StdFileSystem>::attempt_count(&operations, &command.mode);
        let pb = OutputFormatter::create_progress_bar(attempts as u64);
        let tick = pb.clone();
        let ledger = executor
            .on_progress(move |_, _| tick.inc(1))
            .execute(operations, &command.mode);
        pb.finish_and_clear();
        ledger
    };

    if let Some(path) = &command.ledger {
        ledger.save(path)?;
    }

    if command.json {
        let payload = serde_json::to_string_pretty(&ledger.payload()).map_err(LedgerError::from)?;
        println!("{payload}");
    } else {
        report(&ledger, command);
    }

    Ok(ledger)
}

fn report(ledger: &Ledger, command: &RenameCommand) {
    OutputFormatter::operations(ledger.operations(), command.verbose);
    OutputFormatter::summary_table(&ledger.summary(), ledger.len());

    if !ledger.is_clean() {
        OutputFormatter::warning("Some scenes could not be renamed. Please review errors above.");
    }
    if let Some(path) = &command.ledger {
        OutputFormatter::info(&format!("Ledger saved to {}", path.display()));
    }
    if command.mode.is_dry_run() {
        OutputFormatter::success("Dry run complete. No files were modified.");
    } else {
        OutputFormatter::success(&format!(
            "Renamed {} of {} scenes.",
            ledger.count(OperationStatus::Success),
            ledger.len()
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mode_is_dry_run() {
        let cli = Cli::parse_from(["scene-renamer", "--catalog", "c.json"]);
        assert_eq!(cli.mode(), ExecutionMode::DryRun);
    }

    #[test]
    fn test_select_implies_commit() {
        let cli = Cli::parse_from(["scene-renamer", "-c", "c.json", "--select", "5, 7"]);
        match cli.mode() {
            ExecutionMode::CommitSelected(ids) => {
                assert!(ids.contains("5"));
                assert!(ids.contains("7"));
                assert_eq!(ids.len(), 2);
            }
            other => panic!("unexpected mode {other:?}"),
        }
    }

    #[test]
    fn test_commit_flag() {
        let command = Cli::parse_from(["scene-renamer", "-c", "c.json", "--commit", "-j", "4", "-vv"])
            .into_command();
        assert_eq!(command.mode, ExecutionMode::CommitAll);
        assert_eq!(command.jobs, Some(4));
        assert!(command.verbose);
    }
}
