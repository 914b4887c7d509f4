//! Terminal UI: spinners, stage lines and the final summary.
//!
//! # Design goals
//!
//! - **Clean by default.** While a stage is running the user sees only a spinner and a short label.
//!   When it finishes the spinner is replaced by a single ✓ / ! / ✗ / – line.
//! - **Informative on failure.** A failed or warning stage prints its error and whatever the dump
//!   utility wrote to stderr, so the operator can diagnose the problem without re-running manually.
//! - **Swappable.** The workflow talks to a [`Reporter`], never to the terminal directly.
//!   [`TerminalReporter`] draws spinners, [`QuietReporter`] only prints problems, and tests plug in
//!   a recorder.

use std::{cell::RefCell, time::Duration};

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

// ─── Icons ───────────────────────────────────────────────────────────────────

/// Braille spinner frames, same style as indicatif's default.
static SPINNER_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

fn icon_ok() -> console::StyledObject<&'static str> {
    style("✓").green().bold()
}
fn icon_warn() -> console::StyledObject<&'static str> {
    style("!").yellow().bold()
}
fn icon_err() -> console::StyledObject<&'static str> {
    style("✗").red().bold()
}
fn icon_skip() -> console::StyledObject<&'static str> {
    style("–").dim()
}
/// Cyan ✓ printed next to the final success summary.
fn icon_done() -> console::StyledObject<&'static str> {
    style("✓").cyan().bold()
}

// ─── Stage result ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    Ok,
    /// The stage failed but the run carries on (upload, cleanup).
    Warn,
    /// The stage failed and the run stops.
    Failed,
    Skipped,
}

/// The outcome of a single workflow stage.
#[derive(Debug, Clone)]
pub struct StageOutcome {
    /// Human-readable stage label, e.g. `"Dump"`.
    pub label: String,
    pub status: StageStatus,
    /// Short trailing note on the stage line, e.g. the artifact name.
    pub detail: Option<String>,
    /// What the external process wrote to stderr, replayed on failure.
    pub stderr: String,
    /// The error message, if any.
    pub error: Option<String>,
}

impl StageOutcome {
    pub fn ok(label: &str, detail: impl Into<String>) -> Self {
        Self {
            label: label.to_string(),
            status: StageStatus::Ok,
            detail: Some(detail.into()),
            stderr: String::new(),
            error: None,
        }
    }

    pub fn warn(label: &str, error: impl Into<String>) -> Self {
        Self {
            label: label.to_string(),
            status: StageStatus::Warn,
            detail: None,
            stderr: String::new(),
            error: Some(error.into()),
        }
    }

    pub fn failed(label: &str, error: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            label: label.to_string(),
            status: StageStatus::Failed,
            detail: None,
            stderr: stderr.into(),
            error: Some(error.into()),
        }
    }

    /// Synthetic outcome for a stage that was switched off (`--no-upload`, …)
    /// so the summary still lists it.
    pub fn skipped(label: &str, reason: impl Into<String>) -> Self {
        Self {
            label: label.to_string(),
            status: StageStatus::Skipped,
            detail: Some(reason.into()),
            stderr: String::new(),
            error: None,
        }
    }

    /// Returns `true` if the stage stopped the run.
    pub fn is_failed(&self) -> bool {
        self.status == StageStatus::Failed
    }

    /// Returns `true` for anything the operator should look at.
    pub fn needs_attention(&self) -> bool {
        matches!(self.status, StageStatus::Warn | StageStatus::Failed)
    }

    /// Print the one-line summary (icon + label + detail).
    ///
    /// On warning or failure, also prints the error message and any captured
    /// stderr.
    pub fn print(&self) {
        let icon = match self.status {
            StageStatus::Ok => icon_ok(),
            StageStatus::Warn => icon_warn(),
            StageStatus::Failed => icon_err(),
            StageStatus::Skipped => icon_skip(),
        };
        match &self.detail {
            Some(detail) => println!(
                "  {}  {}  {}",
                icon,
                style(&self.label).bold(),
                style(detail).dim()
            ),
            None => println!("  {}  {}", icon, style(&self.label).bold()),
        }

        if !self.needs_attention() {
            return;
        }

        if let Some(ref msg) = self.error {
            let heading = if self.is_failed() {
                style("Error:").red().bold()
            } else {
                style("Warning:").yellow().bold()
            };
            eprintln!("     {heading} {msg}");
        }

        if !self.stderr.is_empty() {
            eprintln!("     {} stderr:", style("►").dim());
            for line in self.stderr.lines() {
                eprintln!("       {line}");
            }
        }
    }
}

// ─── Reporter ─────────────────────────────────────────────────────────────────

/// Where the workflow announces stages.
pub trait Reporter {
    /// A stage is about to start.
    fn begin(&self, label: &str);
    /// The stage that last called [`Reporter::begin`] has finished.
    fn end(&self, outcome: &StageOutcome);
}

/// Spinner while a stage runs, one status line when it ends.
#[derive(Default)]
pub struct TerminalReporter {
    spinner: RefCell<Option<ProgressBar>>,
}

impl Reporter for TerminalReporter {
    fn begin(&self, label: &str) {
        *self.spinner.borrow_mut() = Some(make_spinner(label));
    }

    fn end(&self, outcome: &StageOutcome) {
        if let Some(pb) = self.spinner.borrow_mut().take() {
            pb.finish_and_clear();
        }
        outcome.print();
    }
}

/// No spinner; prints only stages that warned or failed.
#[derive(Default)]
pub struct QuietReporter;

impl Reporter for QuietReporter {
    fn begin(&self, _label: &str) {}

    fn end(&self, outcome: &StageOutcome) {
        if outcome.needs_attention() {
            outcome.print();
        }
    }
}

// ─── Spinner ──────────────────────────────────────────────────────────────────

/// Create and start an indeterminate spinner for `label`.
///
/// The spinner ticks at ~80 ms.  indicatif hides it automatically when stdout
/// is not a terminal (cron, CI).
fn make_spinner(label: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let template = ProgressStyle::with_template("  {spinner:.cyan}  {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(template.tick_chars(SPINNER_CHARS));
    pb.set_message(format!("{}", style(label).dim()));
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

// ─── Summary banner ───────────────────────────────────────────────────────────

/// Print the final summary after the workflow has finished.
///
/// Warnings do not turn the banner red: a run with a failed upload still has
/// a good local backup.
pub fn print_summary(outcomes: &[StageOutcome]) {
    let failed: Vec<&StageOutcome> = outcomes.iter().filter(|o| o.is_failed()).collect();
    let warned = outcomes
        .iter()
        .filter(|o| o.status == StageStatus::Warn)
        .count();
    println!();
    if failed.is_empty() {
        let msg = if warned == 0 {
            "Backup completed successfully.".to_string()
        } else {
            format!("Backup completed with {warned} warning(s); local copy is intact.")
        };
        println!("  {} {}", icon_done(), style(msg).cyan().bold());
    } else {
        eprintln!("  {}  {}", icon_err(), style("Backup failed.").red().bold());
        for o in &failed {
            eprintln!("    {} {}", icon_err(), style(&o.label).red());
        }
    }
    println!();
}

// ─── Tests ────────────────────────────────────────────────────────────────────
