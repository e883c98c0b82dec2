//! Terminal rendering: state progress, download bars and report summaries.

use ephemera_core::{
    DownloadProgress, InvocationReport, LifecycleObserver, LifecycleState, SkipReason,
    SweepOutcome, SweepReport,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt::Write as _;
use std::io::{self, BufRead, Write};

use crate::catalog::{Architecture, CatalogEntry};

// ============================================================================
// Download Progress
// ============================================================================

/// Creates the download progress bar, hidden in quiet mode.
pub fn download_bar(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let style = ProgressStyle::with_template(
        "  {spinner} [{bar:30}] {bytes}/{total_bytes} ({bytes_per_sec})",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("=> ");

    let bar = ProgressBar::new(0);
    bar.set_style(style);
    bar
}

/// Feeds one progress update into `bar`. A zero-byte update starts a new
/// download.
pub fn render_progress(bar: &ProgressBar, progress: &DownloadProgress) {
    if progress.bytes_downloaded == 0 {
        bar.reset();
        bar.set_length(progress.total_bytes.unwrap_or(0));
    }
    bar.set_position(progress.bytes_downloaded);
}

// ============================================================================
// Console Observer
// ============================================================================

/// Prints lifecycle transitions and, when asked to, waits for Enter before
/// launching a tool and before deleting its workspace.
pub struct ConsoleObserver {
    quiet: bool,
    pause: bool,
    bar: ProgressBar,
}

impl ConsoleObserver {
    pub fn new(quiet: bool, pause: bool, bar: ProgressBar) -> Self {
        Self { quiet, pause, bar }
    }

    fn wait_for_enter(&self, prompt: &str) {
        print!("{} ", prompt);
        let _ = io::stdout().flush();
        let mut line = String::new();
        let _ = io::stdin().lock().read_line(&mut line);
    }
}

impl LifecycleObserver for ConsoleObserver {
    fn on_transition(&self, tool: &str, from: Option<LifecycleState>, to: LifecycleState) {
        if from == Some(LifecycleState::Acquiring) {
            self.bar.finish_and_clear();
        }

        if !self.quiet {
            if let Some(line) = transition_line(tool, to) {
                println!("{}", line);
            }
        }

        if self.pause {
            match to {
                LifecycleState::Running => self.wait_for_enter("Press Enter to launch..."),
                LifecycleState::Reclaiming => {
                    self.wait_for_enter("Press Enter to delete the workspace...")
                }
                _ => {}
            }
        }
    }
}

fn transition_line(tool: &str, to: LifecycleState) -> Option<String> {
    let text = match to {
        LifecycleState::Allocating => format!("==> {}", tool),
        LifecycleState::Acquiring => "  downloading...".to_string(),
        LifecycleState::Locating => "  locating executable...".to_string(),
        LifecycleState::Running => "  running (close the tool to continue)".to_string(),
        LifecycleState::Reclaiming => "  cleaning up...".to_string(),
        LifecycleState::Done => return None,
    };
    Some(text)
}

// ============================================================================
// Report Formatting
// ============================================================================

/// Summarizes one invocation, naming the failing step and any residual path.
pub fn format_invocation(report: &InvocationReport) -> String {
    let mut out = String::new();

    match &report.failure {
        None => {
            let code = report
                .exit_code
                .map_or_else(|| "no exit code".to_string(), |c| format!("exit code {}", c));
            let _ = writeln!(out, "{}: finished ({})", report.tool_name, code);
        }
        Some(err) => {
            let _ = writeln!(
                out,
                "{}: failed while {}: {}",
                report.tool_name,
                err.step(),
                err
            );
            if let ephemera_core::LifecycleError::NotFound { available, .. } = err {
                if available.is_empty() {
                    let _ = writeln!(out, "  (nothing was extracted)");
                } else {
                    let _ = writeln!(out, "  extracted entries:");
                    for entry in available {
                        let _ = writeln!(out, "    {}", entry);
                    }
                }
            }
        }
    }

    for warning in report.warnings() {
        let _ = writeln!(out, "  warning: {}", warning);
    }

    out
}

/// One-line tally followed by the detail for every candidate that was not
/// cleaned.
pub fn format_sweep(report: &SweepReport) -> String {
    let mut out = format!(
        "Sweep: {} cleaned, {} skipped, {} failed\n",
        report.cleaned, report.skipped, report.failed
    );

    for entry in &report.entries {
        let detail = match &entry.outcome {
            SweepOutcome::Cleaned => continue,
            SweepOutcome::Skipped(SkipReason::Protected { file }) => {
                format!("skipped (protected file {})", file.display())
            }
            SweepOutcome::Skipped(SkipReason::InUse { file }) => {
                format!("skipped ({} is in use)", file.display())
            }
            SweepOutcome::Failed { error } => format!("failed: {}", error),
        };
        let _ = writeln!(out, "  {}: {}", entry.path.display(), detail);
    }

    out
}

pub fn format_catalog(entries: &[CatalogEntry], arch: Architecture) -> String {
    let mut out = format!("Tools ({}):\n", arch);
    for (i, entry) in entries.iter().enumerate() {
        let _ = writeln!(
            out,
            "  {:>2}. {:<10} {:<18} {}",
            i + 1,
            entry.id,
            entry.display_name,
            entry.description
        );
    }
    out
}
