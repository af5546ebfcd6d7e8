// Download progress: events reported by the downloader and the fixed-width
// text bar drawn for them.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

pub const BAR_LENGTH: usize = 40;

/// Progress update from a running download.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ProgressEvent {
    Downloading {
        downloaded_bytes: u64,
        /// Exact size, or the platform's estimate when the exact size is unknown
        total_bytes: Option<u64>,
    },
    Finished,
}

/// Percentage in `[0, 100]`, or `None` when the total is unknown.
pub fn percentage(downloaded_bytes: u64, total_bytes: Option<u64>) -> Option<f64> {
    match total_bytes {
        Some(total) if total > 0 => {
            Some((downloaded_bytes as f64 / total as f64 * 100.0).clamp(0.0, 100.0))
        }
        _ => None,
    }
}

/// `floor(bar_length * percentage / 100)`, capped to the bar.
pub fn filled_segments(percentage: f64, bar_length: usize) -> usize {
    let filled = (bar_length as f64 * percentage / 100.0).floor();
    (filled.max(0.0) as usize).min(bar_length)
}

/// `[####------] 42.00%`
pub fn render_bar(percentage: f64, bar_length: usize) -> String {
    let filled = filled_segments(percentage, bar_length);
    format!(
        "[{}{}] {:.2}%",
        "#".repeat(filled),
        "-".repeat(bar_length - filled),
        percentage
    )
}

/// Terminal line showing the bar for the current download.
pub struct DownloadProgress {
    bar: ProgressBar,
}

impl DownloadProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        Self { bar }
    }

    pub fn update(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Downloading {
                downloaded_bytes,
                total_bytes,
            } => {
                // Unknown totals leave the last drawn bar alone.
                if let Some(pct) = percentage(downloaded_bytes, total_bytes) {
                    self.bar.set_message(render_bar(pct, BAR_LENGTH));
                }
            }
            ProgressEvent::Finished => self.bar.set_message(render_bar(100.0, BAR_LENGTH)),
        }
    }

    /// Leave the last bar on screen and move to the next line.
    pub fn finish(self) {
        self.bar.finish();
    }

    /// Remove the bar, e.g. before printing an error.
    pub fn abandon(self) {
        self.bar.finish_and_clear();
    }
}

impl Default for DownloadProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Spinner animated on indicatif's ticker thread while the caller blocks.
pub fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("|/-\\ "),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}
