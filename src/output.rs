//! Terminal output for the binary.
//!
//! Everything the command line prints goes through [`OutputFormatter`]:
//! status-colored operation lines, the execution progress bar and the
//! per-status summary table. The library core never prints.

use crate::planner::{OperationStatus, PlannedOperation};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;

/// Rows of the summary table, in display order.
const STATUS_ORDER: [OperationStatus; 4] = [
    OperationStatus::Success,
    OperationStatus::Pending,
    OperationStatus::Duplicate,
    OperationStatus::Error,
];

/// Manages all CLI output with consistent styling.
///
/// - Success messages (green with ✓)
/// - Error messages (red with ✗, on stderr)
/// - Warning messages (yellow with ⚠)
/// - Info messages (cyan)
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// ```no_run
    /// use scene_renamer::output::OutputFormatter;
    /// OutputFormatter::success("Renamed 12 scenes");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn plain(message: &str) {
        println!("{}", message);
    }

    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Creates the progress bar shown while operations are committed.
    ///
    /// ```no_run
    /// use scene_renamer::output::OutputFormatter;
    /// let pb = OutputFormatter::create_progress_bar(100);
    /// pb.inc(1);
    /// pb.finish_with_message("done");
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

    /// One line per operation: marker, old name, arrow, new path, and the
    /// reason for anything that did not go through.
    pub fn operation_line(op: &PlannedOperation) -> String {
        let marker = match op.status {
            OperationStatus::Success => "✓".green(),
            OperationStatus::Pending => "•".cyan(),
            OperationStatus::Duplicate => "⚠".yellow(),
            OperationStatus::Error => "✗".red(),
        };
        let source = if op.old_filename.is_empty() {
            format!("scene {}", op.scene_id)
        } else {
            op.old_filename.clone()
        };
        let mut line = format!("{} {} -> {}", marker, source, op.new_path.display());
        if let Some(error) = &op.error {
            line.push_str(&format!(" ({})", error.dimmed()));
        }
        line
    }

    /// Prints every operation that would change something or went wrong.
    /// Unchanged files are left out unless `verbose`.
    pub fn operations(operations: &[PlannedOperation], verbose: bool) {
        Self::header("OPERATIONS");
        let mut shown = 0;
        for op in operations {
            let unchanged = !op.is_rename() && op.error.is_none();
            if unchanged && !verbose {
                continue;
            }
            println!("{}", Self::operation_line(op));
            shown += 1;
        }
        if shown == 0 {
            Self::plain("Nothing to rename.");
        }
    }

    /// Prints a summary table with operation counts by status.
    ///
    /// ```no_run
    /// use scene_renamer::output::OutputFormatter;
    /// use std::collections::HashMap;
    ///
    /// let mut counts = HashMap::new();
    /// counts.insert("success".to_string(), 15);
    /// counts.insert("duplicate".to_string(), 2);
    /// OutputFormatter::summary_table(&counts, 17);
    /// ```
    pub fn summary_table(status_counts: &HashMap<String, usize>, total: usize) {
        Self::header("SUMMARY");

        let width = STATUS_ORDER
            .iter()
            .map(|status| status.as_str().len())
            .max()
            .unwrap_or(0)
            .max(6);

        println!("{:<width$} | {}", "Status".bold(), "Scenes".bold(), width = width);
        println!("{}", "-".repeat(width + 12));

        for status in STATUS_ORDER {
            let count = status_counts.get(status.as_str()).copied().unwrap_or(0);
            if count == 0 {
                continue;
            }
            let shown = match status {
                OperationStatus::Success => count.to_string().green(),
                OperationStatus::Pending => count.to_string().cyan(),
                OperationStatus::Duplicate => count.to_string().yellow(),
                OperationStatus::Error => count.to_string().red(),
            };
            println!(
                "{:<width$} | {} {}",
                status.as_str(),
                shown,
                scene_word(count),
                width = width
            );
        }

        println!("{}", "-".repeat(width + 12));
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total.to_string().bold(),
            scene_word(total),
            width = width
        );
    }

    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }
}

fn scene_word(count: usize) -> &'static str {
    if count == 1 { "scene" } else { "scenes" }
}
