//! Progress reporting for plan and apply
//!
//! Everything goes to stderr so stdout stays usable for rendered manifests.

use std::io::{self, Write};
use std::time::{Duration, Instant};

use console::{StyledObject, style};

use crate::plan::{Action, Plan, PlannedChange};
use crate::report::{ApplyReport, Outcome, ReportEntry};

impl Action {
    fn symbol(&self) -> &'static str {
        match self {
            Action::Unchanged => "=",
            Action::Create => "+",
            Action::Update => "~",
            Action::Delete => "-",
        }
    }

    fn styled_symbol(&self) -> StyledObject<&'static str> {
        match self {
            Action::Unchanged => style(self.symbol()).dim(),
            Action::Create => style(self.symbol()).green(),
            Action::Update => style(self.symbol()).yellow(),
            Action::Delete => style(self.symbol()).red(),
        }
    }
}

impl Outcome {
    fn styled_symbol(&self) -> StyledObject<&'static str> {
        match self {
            Outcome::Unchanged => style("●").dim(),
            Outcome::Created | Outcome::Updated | Outcome::Deleted => style("✓").green(),
            Outcome::Failed(_) => style("✗").red(),
            Outcome::SkippedDueToDependencyFailure { .. } => style("⊘").yellow(),
            Outcome::Cancelled => style("⊘").dim(),
        }
    }
}

/// Progress reporter for apply operations
pub struct ProgressReporter {
    start_time: Instant,
    /// Print unified diffs of updates
    show_diffs: bool,
    /// Also list unchanged documents
    verbose: bool,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            show_diffs: true,
            verbose: false,
        }
    }

    /// List unchanged documents too
    pub fn verbose(mut self) -> Self {
        self.verbose = true;
        self
    }

    /// Do not print diffs of updates
    pub fn without_diffs(mut self) -> Self {
        self.show_diffs = false;
        self
    }

    /// Print the planned changes
    pub fn print_plan(&self, plan: &Plan) {
        let mut err = io::stderr();
        let _ = writeln!(err, "{}", style("Planned changes:").bold());

        for change in plan.iter() {
            if let Some(error) = &change.error {
                let _ = writeln!(err, "  {} {} - {}", style("✗").red(), change.resource, style(error).red());
                continue;
            }
            if change.action == Action::Unchanged && !self.verbose {
                continue;
            }
            let _ = writeln!(err, "  {} {} {}", change.action.styled_symbol(), change.action, change.resource);
            self.print_diff(change);
        }

        let _ = writeln!(err, "\n{} {}", style("Plan:").bold(), plan.summary());
    }

    fn print_diff(&self, change: &PlannedChange) {
        let Some(diff) = change.diff.as_ref().filter(|_| self.show_diffs) else {
            return;
        };
        let mut err = io::stderr();
        for line in diff.to_unified_diff().lines() {
            let styled = match line.chars().next() {
                Some('+') => style(line).green(),
                Some('-') => style(line).red(),
                _ => style(line).dim(),
            };
            let _ = writeln!(err, "      {}", styled);
        }
    }

    /// Print the outcome of one document
    pub fn outcome(&self, entry: &ReportEntry) {
        if entry.outcome == Outcome::Unchanged && !self.verbose {
            return;
        }

        let message = match &entry.outcome {
            Outcome::Failed(_) | Outcome::SkippedDueToDependencyFailure { .. } => {
                format!(" - {}", style(&entry.outcome).red())
            }
            other => format!(" - {}", style(other).dim()),
        };
        let _ = writeln!(
            io::stderr(),
            "  {} {}{}",
            entry.outcome.styled_symbol(),
            entry.resource,
            message
        );
    }

    /// Print overall summary
    pub fn print_summary(&self, report: &ApplyReport) {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        let _ = writeln!(io::stderr());

        if report.cancelled {
            let _ = writeln!(
                io::stderr(),
                "{} Apply cancelled: {} ({:.1}s)",
                style("⊘").yellow().bold(),
                report.summary(),
                elapsed
            );
        } else if report.is_success() {
            let _ = writeln!(
                io::stderr(),
                "{} Apply complete: {} ({:.1}s)",
                style("✓").green().bold(),
                report.summary(),
                elapsed
            );
        } else {
            let _ = writeln!(
                io::stderr(),
                "{} Apply finished with failures: {} ({:.1}s)",
                style("✗").red().bold(),
                report.summary(),
                elapsed
            );
        }
    }

    /// Print an info message
    pub fn info(&self, msg: &str) {
        let _ = writeln!(io::stderr(), "  {} {}", style("ℹ").blue(), msg);
    }

    /// Print a warning message
    pub fn warn(&self, msg: &str) {
        let _ = writeln!(io::stderr(), "  {} {}", style("⚠").yellow(), msg);
    }

    /// Get elapsed time
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}
