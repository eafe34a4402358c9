/*!
 * Transfer progress reporting
 */

use indicatif::{ProgressBar, ProgressStyle};

/// Observer notified as a transfer advances
///
/// All methods have empty defaults so observers implement only what they
/// care about. Notifications may arrive from any worker task.
pub trait TransferObserver: Send + Sync {
    /// Called once after planning, before any chunk moves
    fn transfer_started(&self, _total_bytes: u64, _chunks: usize) {}

    /// Called after each chunk is durably uploaded
    fn chunk_completed(&self, _index: u32, _bytes: u64) {}

    /// Called once after the destination is committed
    fn transfer_completed(&self) {}
}

/// Observer that reports nothing
pub struct NoopObserver;

impl TransferObserver for NoopObserver {}

/// Terminal progress bar tracking bytes moved
pub struct ProgressBarObserver {
    bar: ProgressBar,
}

impl ProgressBarObserver {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] \
                 {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
        );
        Self { bar }
    }
}

impl Default for ProgressBarObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferObserver for ProgressBarObserver {
    fn transfer_started(&self, total_bytes: u64, _chunks: usize) {
        self.bar.set_length(total_bytes);
    }

    fn chunk_completed(&self, _index: u32, bytes: u64) {
        self.bar.inc(bytes);
    }

    fn transfer_completed(&self) {
        self.bar.finish_with_message("done");
    }
}
