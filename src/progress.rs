//! Terminal progress UI (spinner + bar) and end-of-run summaries.

use std::fmt::Write as _;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use wayback_core::{DownloadOptions, MirrorObserver, ProgressStats, RewriteStats};

/// Observer that drives a snapshot spinner and a file progress bar.
pub struct CliObserver {
    spinner: ProgressBar,
    bar: ProgressBar,
    visible: bool,
}

impl CliObserver {
    /// `visible = false` keeps every bar hidden (quiet mode, tests).
    pub fn new(visible: bool, colors: bool) -> Self {
        let spinner = if visible {
            ProgressBar::new_spinner()
        } else {
            ProgressBar::hidden()
        };
        let spinner_template = if colors {
            "  {spinner:.cyan} {prefix:.cyan} {msg}"
        } else {
            "  {spinner} {prefix} {msg}"
        };
        spinner.set_style(
            ProgressStyle::with_template(spinner_template)
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_prefix("Fetching snapshots");
        if visible {
            spinner.enable_steady_tick(Duration::from_millis(100));
        }

        let bar_template = if colors {
            "  {bar:40.cyan/dim} | {percent}% | {pos}/{len} files | {msg}"
        } else {
            "  {bar:40} | {percent}% | {pos}/{len} files | {msg}"
        };
        let bar = ProgressBar::hidden();
        bar.set_style(
            ProgressStyle::with_template(bar_template)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█░"),
        );

        Self {
            spinner,
            bar,
            visible,
        }
    }

    /// Stops every bar, leaving the file bar's final state on screen.
    pub fn finish(&self) {
        self.spinner.finish_and_clear();
        if !self.bar.is_finished() {
            self.bar.finish();
        }
    }
}

impl MirrorObserver for CliObserver {
    fn on_snapshot_page(&self, page: u32, count: usize) {
        self.spinner
            .set_message(format!("... page {} ({count} snapshots)", page + 1));
    }

    fn on_file_list_ready(&self, count: usize) {
        self.spinner.finish_and_clear();
        if count == 0 {
            return;
        }
        if self.visible {
            println!("{count} files to download.");
            println!();
            self.bar.set_draw_target(ProgressDrawTarget::stderr());
        }
        self.bar.set_length(to_u64(count));
        self.bar.set_message(progress_message(&ProgressStats::default()));
    }

    fn on_progress(&self, stats: &ProgressStats) {
        self.bar.set_position(to_u64(stats.completed()));
        self.bar.set_message(progress_message(stats));
    }

    fn on_rewrite_links(&self) {
        self.bar.finish();
        if self.visible {
            println!("Rewriting links...");
        }
    }
}

fn to_u64(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

fn progress_message(stats: &ProgressStats) -> String {
    format!(
        "✓ {} ○ {} ✗ {}",
        stats.downloaded, stats.skipped, stats.errors
    )
}

/// End-of-run summary; zero skipped/error lines are omitted.
pub fn format_summary(stats: &ProgressStats, rewrite: Option<RewriteStats>) -> String {
    #[allow(clippy::cast_precision_loss)]
    let seconds = stats.duration_ms as f64 / 1000.0;
    let mut out = String::new();
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{}",
        if stats.interrupted {
            "Download interrupted"
        } else {
            "Download complete"
        }
    );
    let _ = writeln!(out, "  Duration: {seconds:.2}s");
    let _ = writeln!(out, "  Downloaded: {}", stats.downloaded);
    if stats.skipped > 0 {
        let _ = writeln!(out, "  Skipped (already exist): {}", stats.skipped);
    }
    if stats.errors > 0 {
        let _ = writeln!(out, "  Errors: {}", stats.errors);
    }
    if stats.interrupted {
        let _ = writeln!(
            out,
            "  Not started: {}",
            stats.total.saturating_sub(stats.completed())
        );
    }
    if let Some(rewrite) = rewrite {
        let _ = writeln!(
            out,
            "  Links rewritten: {} in {} files",
            rewrite.links, rewrite.rewritten
        );
    }
    out
}

/// Likely causes of an empty result, an incomplete index listing first.
pub fn empty_result_reasons(options: &DownloadOptions, index_truncated: bool) -> Vec<String> {
    let mut reasons = options.empty_result_reasons();
    if index_truncated {
        reasons.insert(
            0,
            "The archive index could not be read completely; try again later.".to_string(),
        );
    }
    reasons
}

/// Message for a run that found nothing to download.
pub fn format_empty_result(reasons: &[String]) -> String {
    let mut out = String::from("No files to download.\nPossible reasons:\n");
    for reason in reasons {
        let _ = writeln!(out, "  • {reason}");
    }
    out
}
