//! Command-line interface module for tidydown.
//!
//! This module handles all CLI-related functionality including:
//! - Command parsing (`clap` derive)
//! - Resolving flags against configuration settings
//! - Organization and duplicate-cleaning orchestration
//! - Undo and log inspection

use crate::config::OrganizerConfig;
use crate::duplicate_cleaner::{DuplicateCleaner, KeepStrategy};
use crate::error::Result;
use crate::file_organizer::FileOrganizer;
use crate::operation_log::OperationLog;
use crate::output::OutputFormatter;
use crate::undo::{UndoManager, UndoOutcome};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

/// Organize a downloads folder and clean up duplicate files.
#[derive(Debug, Parser)]
#[command(name = "tidydown", version, about)]
pub struct Cli {
    /// Show detailed progress and per-set duplicate details
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Move files into category folders
    Organize(OrganizeArgs),
    /// Find and remove duplicate files
    CleanDuplicates(CleanArgs),
    /// Write the default configuration to a file
    CreateConfig {
        /// Where to write the configuration
        output_path: PathBuf,
    },
    /// List the sessions stored in the operation log
    ShowLog(LogArgs),
    /// Revert the moves of the most recent session
    Undo(LogArgs),
    /// Organize, then optionally clean duplicates, in one session
    Full(FullArgs),
}

/// Arguments shared by commands that operate on a directory.
#[derive(Debug, Clone, Args)]
pub struct TargetArgs {
    /// Directory to operate on
    #[arg(short, long, default_value_os_t = default_directory())]
    pub directory: PathBuf,

    /// Configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Operation log file, overriding the configured one
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct LogArgs {
    /// Configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Operation log file, overriding the configured one
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct OrganizeArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Nest category folders under YYYY-MM folders
    #[arg(long)]
    pub date_folders: bool,

    /// Show what would happen without moving anything
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Args)]
pub struct CleanArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Only scan the top level of the directory
    #[arg(long)]
    pub no_recursive: bool,

    /// Which copy of each duplicate set to keep
    #[arg(long, value_enum, default_value_t = KeepStrategy::Newest)]
    pub keep: KeepStrategy,

    /// Show what would happen without deleting anything
    #[arg(long)]
    pub dry_run: bool,

    /// Print a duplicate report and exit
    #[arg(long)]
    pub report_only: bool,

    /// Print the report as JSON (with --report-only)
    #[arg(long, requires = "report_only")]
    pub json: bool,
}

#[derive(Debug, Clone, Args)]
pub struct FullArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Nest category folders under YYYY-MM folders
    #[arg(long)]
    pub date_folders: bool,

    /// Remove duplicates after organizing
    #[arg(long)]
    pub clean_duplicates: bool,

    /// Which copy of each duplicate set to keep
    #[arg(long, value_enum, default_value_t = KeepStrategy::Newest)]
    pub keep: KeepStrategy,

    /// Show what would happen without changing anything
    #[arg(long)]
    pub dry_run: bool,
}

/// `$HOME/Downloads`, or `./Downloads` when `HOME` is unset.
fn default_directory() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Downloads")
}

/// Runs the parsed command line.
///
/// # Examples
///
/// ```no_run
/// use clap::Parser;
/// use tidydown::cli::{Cli, run_cli};
///
/// let cli = Cli::parse_from(["tidydown", "organize", "--dry-run"]);
/// if let Err(e) = run_cli(cli) {
///     eprintln!("Error: {}", e);
/// }
/// ```
pub fn run_cli(cli: Cli) -> Result<()> {
    let verbose = cli.verbose;
    match cli.command {
        Commands::Organize(args) => organize(&args),
        Commands::CleanDuplicates(args) => clean_duplicates(&args, verbose),
        Commands::CreateConfig { output_path } => create_config(&output_path),
        Commands::ShowLog(args) => show_log(&args),
        Commands::Undo(args) => undo(&args),
        Commands::Full(args) => full(&args),
    }
}

/// `--log-file` if given, else the configured log file.
fn resolve_log_file(explicit: Option<&Path>, config: &OrganizerConfig) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.log_file())
}

fn organize(args: &OrganizeArgs) -> Result<()> {
    let config = OrganizerConfig::load(args.target.config.as_deref())?;
    let dry_run = args.dry_run || config.dry_run();
    let date_folders = args.date_folders || config.create_date_folders();
    let log_file = resolve_log_file(args.target.log_file.as_deref(), &config);

    let organizer = FileOrganizer::new(&args.target.directory, config, dry_run)?;
    if organizer.is_dry_run() {
        OutputFormatter::dry_run_notice("No files will be moved.");
    }
    OutputFormatter::info(&format!(
        "Organizing files in: {}",
        organizer.source_dir().display()
    ));

    let mut log = OperationLog::new(log_file);
    let report = organizer.organize(&mut log, date_folders)?;

    OutputFormatter::summary_table(&report.by_category, report.moved);
    if report.failed > 0 {
        OutputFormatter::warning(&format!(
            "{} files could not be organized. Run with --verbose for details.",
            report.failed
        ));
    }
    log.print_summary();
    Ok(())
}

fn clean_duplicates(args: &CleanArgs, verbose: bool) -> Result<()> {
    let config = OrganizerConfig::load(args.target.config.as_deref())?;
    let dry_run = args.dry_run || config.dry_run();
    let recursive = !args.no_recursive;

    let cleaner = DuplicateCleaner::new(&args.target.directory, dry_run)?
        .with_filters(config.compile_filters()?)
        .with_progress(!args.json);

    if args.report_only {
        let report = cleaner.report(recursive)?;
        if args.json {
            OutputFormatter::plain(&serde_json::to_string_pretty(&report)?);
        } else {
            OutputFormatter::duplicate_report(&report, verbose);
        }
        return Ok(());
    }

    OutputFormatter::info(&format!(
        "Scanning for duplicates in: {}",
        cleaner.directory().display()
    ));
    if cleaner.is_dry_run() {
        OutputFormatter::dry_run_notice("No files will be deleted.");
    }
    let mut log = OperationLog::new(resolve_log_file(args.target.log_file.as_deref(), &config));
    let removed = cleaner.clean(&mut log, recursive, args.keep)?;

    if removed == 0 {
        OutputFormatter::success("No duplicates found!");
    } else if cleaner.is_dry_run() {
        OutputFormatter::dry_run_notice(&format!("Would remove {} duplicate files", removed));
    } else {
        OutputFormatter::success(&format!("Removed {} duplicate files", removed));
    }
    log.print_summary();
    Ok(())
}

fn create_config(output_path: &Path) -> Result<()> {
    OrganizerConfig::write_default(output_path)?;
    OutputFormatter::success(&format!(
        "Default configuration written to {}",
        output_path.display()
    ));
    Ok(())
}

fn show_log(args: &LogArgs) -> Result<()> {
    let config = OrganizerConfig::load(args.config.as_deref())?;
    let log_file = resolve_log_file(args.log_file.as_deref(), &config);

    match OperationLog::load_sessions(&log_file)? {
        Some(sessions) => OutputFormatter::session_list(&sessions),
        None => OutputFormatter::info("No logs found."),
    }
    Ok(())
}

fn undo(args: &LogArgs) -> Result<()> {
    let config = OrganizerConfig::load(args.config.as_deref())?;
    let log_file = resolve_log_file(args.log_file.as_deref(), &config);

    OutputFormatter::info("Undoing last organization session...");
    match UndoManager::undo_last_session(&log_file)? {
        UndoOutcome::NoLogFile => {
            OutputFormatter::info(&format!("No log file found at {}", log_file.display()))
        }
        UndoOutcome::NoSessions => OutputFormatter::info("No sessions to undo."),
        UndoOutcome::Completed(report) => OutputFormatter::undo_report(&report),
    }
    Ok(())
}

fn full(args: &FullArgs) -> Result<()> {
    let config = OrganizerConfig::load(args.target.config.as_deref())?;
    let dry_run = args.dry_run || config.dry_run();
    let date_folders = args.date_folders || config.create_date_folders();
    let filters = config.compile_filters()?;
    let mut log = OperationLog::new(resolve_log_file(args.target.log_file.as_deref(), &config));

    if dry_run {
        OutputFormatter::dry_run_notice("Nothing will be changed.");
    }

    OutputFormatter::header("Step 1: Organizing files");
    let organizer = FileOrganizer::new(&args.target.directory, config, dry_run)?;
    let report = organizer.organize(&mut log, date_folders)?;
    OutputFormatter::summary_table(&report.by_category, report.moved);

    if args.clean_duplicates {
        OutputFormatter::header("Step 2: Cleaning duplicates");
        let removed = DuplicateCleaner::new(organizer.source_dir(), dry_run)?
            .with_filters(filters)
            .with_progress(true)
            .clean(&mut log, true, args.keep)?;
        OutputFormatter::success(&format!("Removed {} duplicate files", removed));
    }

    log.save()?;
    log.print_summary();
    Ok(())
}
