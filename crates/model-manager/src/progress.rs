//! Download progress reporting

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use parking_lot::Mutex;

/// Width of the terminal bar in cells
pub const BAR_WIDTH: usize = 50;

/// Progress of a single download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    /// Bytes written to disk so far
    pub downloaded_bytes: u64,
    /// Announced size, when the server reports one
    pub total_bytes: Option<u64>,
}

impl DownloadProgress {
    /// Creates progress for a download of `total_bytes`, nothing written yet
    pub fn new(total_bytes: Option<u64>) -> Self {
        Self {
            downloaded_bytes: 0,
            total_bytes,
        }
    }

    /// Completed fraction in `[0, 1]`, if the total is known
    pub fn fraction(&self) -> Option<f64> {
        match self.total_bytes {
            Some(0) => Some(1.0),
            Some(total) => Some((self.downloaded_bytes as f64 / total as f64).min(1.0)),
            None => None,
        }
    }

    /// Number of filled cells in a bar `width` cells wide
    pub fn filled_cells(&self, width: usize) -> usize {
        self.fraction()
            .map(|f| (f * width as f64) as usize)
            .unwrap_or(0)
    }

    /// Draws a bar `width` cells wide, `█` for done and `.` for pending
    pub fn render(&self, width: usize) -> String {
        let filled = self.filled_cells(width).min(width);
        format!("{}{}", "█".repeat(filled), ".".repeat(width - filled))
    }
}

/// Receives progress updates while a file is written
pub trait ProgressSink: Send + Sync {
    fn start(&self, progress: &DownloadProgress);

    /// Called once for every chunk written
    fn update(&self, progress: &DownloadProgress);

    fn finish(&self, progress: &DownloadProgress);
}

/// Discards all updates
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn start(&self, _progress: &DownloadProgress) {}
    fn update(&self, _progress: &DownloadProgress) {}
    fn finish(&self, _progress: &DownloadProgress) {}
}

/// Fixed-width bar redrawn in place
#[derive(Default)]
pub struct TerminalProgress {
    bar: Mutex<Option<ProgressBar>>,
}

impl TerminalProgress {
    /// Creates a progress reporter drawing to stdout
    pub fn new() -> Self {
        Self::default()
    }

    fn style() -> ProgressStyle {
        ProgressStyle::with_template("[{msg}] {bytes}/{total_bytes} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
    }
}

impl ProgressSink for TerminalProgress {
    fn start(&self, progress: &DownloadProgress) {
        let bar = ProgressBar::with_draw_target(progress.total_bytes, ProgressDrawTarget::stdout())
            .with_style(Self::style());
        bar.set_message(progress.render(BAR_WIDTH));
        *self.bar.lock() = Some(bar);
    }

    fn update(&self, progress: &DownloadProgress) {
        if let Some(bar) = self.bar.lock().as_ref() {
            bar.set_message(progress.render(BAR_WIDTH));
            bar.set_position(progress.downloaded_bytes);
        }
    }

    fn finish(&self, progress: &DownloadProgress) {
        if let Some(bar) = self.bar.lock().take() {
            bar.set_message(progress.render(BAR_WIDTH));
            bar.set_position(progress.downloaded_bytes);
            bar.finish();
        }
    }
}
