//! User-facing progress reporting, kept deliberately separate from
//! `tracing` diagnostics (§2 ambient stack: "user-facing progress uses a
//! dedicated progress-reporting module, diagnostics use `tracing`").

use indicatif::{ProgressBar, ProgressStyle};
use once_cell::sync::Lazy;
use owo_colors::OwoColorize;

pub static PROGRESS_BAR: Lazy<ProgressBar> = Lazy::new(|| {
    let pb = ProgressBar::new(0).with_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {wide_msg}")
            .unwrap()
            .progress_chars("#>-")
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    pb.enable_steady_tick(std::time::Duration::from_millis(200));
    pb
});

/// Reports routine progress (cache hit, download started, extraction done)
/// to the user-visible progress bar.
pub fn log_progress(message: &str) {
    PROGRESS_BAR.set_message(message.to_string());
    tracing::debug!("{message}");
}

/// Reports a non-fatal problem (a failed license download, a retried
/// request) to the user, separate from the bar's running status line.
pub fn log_warning(message: &str) {
    PROGRESS_BAR.println(format!("{} {message}", "warning:".yellow().bold()));
    tracing::warn!("{message}");
}
