//! Output formatting and styling module.
//!
//! Provides a centralized interface for all CLI output, including colored output,
//! progress tracking, and formatted tables. Nothing here touches the filesystem
//! or the operation log; every function only renders what it is given.

use crate::duplicate_cleaner::DuplicateReport;
use crate::operation_log::Session;
use crate::undo::UndoReport;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;

const RULE_WIDTH: usize = 50;

/// Manages all CLI output with consistent styling and formatting.
///
/// This struct provides methods for:
/// - Success messages (green with ✓)
/// - Error messages (red with ✗)
/// - Warning messages (yellow with ⚠)
/// - Info messages (cyan)
/// - Progress bars for hashing
/// - Summary tables for sessions, categories and duplicate reports
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use tidydown::output::OutputFormatter;
    /// OutputFormatter::success("Organization complete!");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    /// Prints a regular message without styling.
    pub fn plain(message: &str) {
        println!("{}", message);
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Prints a dry-run notice message.
    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }

    /// Creates and returns a progress bar for file operations.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use tidydown::output::OutputFormatter;
    /// let pb = OutputFormatter::create_progress_bar(100);
    /// pb.inc(1);
    /// pb.finish_with_message("Completed!");
    /// ```
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        pb.set_style(style);
        pb
    }

    /// Prints a summary table with file statistics by category.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use tidydown::output::OutputFormatter;
    /// use std::collections::HashMap;
    ///
    /// let mut counts = HashMap::new();
    /// counts.insert("Documents".to_string(), 15);
    /// counts.insert("Images".to_string(), 8);
    /// OutputFormatter::summary_table(&counts, 23);
    /// ```
    pub fn summary_table(category_counts: &HashMap<String, usize>, total_files: usize) {
        Self::header("SUMMARY");

        let mut categories: Vec<_> = category_counts.iter().collect();
        categories.sort_by_key(|&(name, _)| name);

        let max_category_len = categories
            .iter()
            .map(|(name, _)| name.len())
            .max()
            .unwrap_or(0)
            .max(8); // "Category"

        println!(
            "{:<width$} | {}",
            "Category".bold(),
            "Files".bold(),
            width = max_category_len
        );
        println!("{}", "-".repeat(max_category_len + 10));

        for (category, count) in &categories {
            println!(
                "{:<width$} | {} {}",
                category,
                count.to_string().green(),
                plural(**count, "file", "files"),
                width = max_category_len
            );
        }

        println!("{}", "-".repeat(max_category_len + 10));
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total_files.to_string().green().bold(),
            plural(total_files, "file", "files"),
            width = max_category_len
        );
    }

    /// Prints one session's counters.
    pub fn session_summary(session: &Session) {
        println!("\n{}", "=".repeat(RULE_WIDTH));
        println!("{}", "ORGANIZATION SUMMARY".bold());
        println!("{}", "=".repeat(RULE_WIDTH));
        Self::session_counters(session);
        println!("{}\n", "=".repeat(RULE_WIDTH));
    }

    /// Prints every persisted session, oldest first.
    pub fn session_list(sessions: &[Session]) {
        if sessions.is_empty() {
            Self::info("No logs found.");
            return;
        }

        for (i, session) in sessions.iter().enumerate() {
            println!("\n{}", "=".repeat(RULE_WIDTH));
            println!("{}", format!("Session {}", i + 1).bold());
            println!("{}", "=".repeat(RULE_WIDTH));
            Self::session_counters(session);
        }
    }

    fn session_counters(session: &Session) {
        println!(
            "Session: {} - {}",
            session.session_start, session.session_end
        );
        println!("Total operations: {}", session.total_operations);

        if !session.by_type.is_empty() {
            println!("\nOperations by type:");
            for (kind, count) in &session.by_type {
                println!("  {}: {}", kind, count);
            }
        }

        if !session.by_status.is_empty() {
            println!("\nOperations by status:");
            for (status, count) in &session.by_status {
                let count = count.to_string();
                let count = match status.as_str() {
                    "success" => count.green(),
                    "error" => count.red(),
                    "dry_run" | "skipped" => count.yellow(),
                    _ => count.normal(),
                };
                println!("  {}: {}", status, count);
            }
        }
    }

    /// Prints a duplicate report, with per-set detail when `verbose`.
    pub fn duplicate_report(report: &DuplicateReport, verbose: bool) {
        println!("\n{}", "=".repeat(RULE_WIDTH));
        println!("{}", "DUPLICATE FILES REPORT".bold());
        println!("{}", "=".repeat(RULE_WIDTH));
        println!("Duplicate sets: {}", report.duplicate_sets);
        println!("Total files involved: {}", report.total_files_involved);
        println!("Total duplicates: {}", report.total_duplicates);
        println!(
            "Wasted space: {}",
            format!("{} MB", report.wasted_space_mb).yellow()
        );

        if verbose {
            for detail in &report.details {
                println!(
                    "\n{} ({} copies, {} MB each)",
                    detail.hash.bold(),
                    detail.count,
                    detail.size_mb
                );
                for file in &detail.files {
                    println!("  - {}", file);
                }
            }
        }
        println!("{}", "=".repeat(RULE_WIDTH));
    }

    /// Prints the result of an undo run.
    pub fn undo_report(report: &UndoReport) {
        Self::success(&format!(
            "Restored {} {}",
            report.restored_files,
            plural(report.restored_files, "file", "files")
        ));

        if !report.skipped_files.is_empty() {
            Self::warning(&format!("Skipped: {}", report.skipped_files.len()));
            for (path, reason) in &report.skipped_files {
                println!("    - {}: {}", path.display(), reason);
            }
        }

        if !report.failed_restores.is_empty() {
            Self::error(&format!("Failed: {}", report.failed_restores.len()));
            for (path, reason) in &report.failed_restores {
                eprintln!("    - {}: {}", path.display(), reason);
            }
        }
    }
}

fn plural<'a>(count: usize, one: &'a str, many: &'a str) -> &'a str {
    if count == 1 { one } else { many }
}
