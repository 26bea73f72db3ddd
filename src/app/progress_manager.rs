//! Progress bar for audio download runs.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use yoyo_export::{DownloadOutcome, DownloadTask};

/// Download progress shown on stderr; a no-op when disabled.
pub(crate) struct DownloadProgress {
    bar: Option<ProgressBar>,
    failed: usize,
}

impl DownloadProgress {
    pub(crate) fn new(enabled: bool, total: usize) -> Self {
        let bar = enabled.then(|| {
            let bar = ProgressBar::new(total as u64);
            bar.set_style(
                ProgressStyle::with_template("{spinner} [{pos}/{len}] {wide_bar} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            bar.enable_steady_tick(Duration::from_millis(100));
            bar.set_message("Downloading audio...");
            bar
        });
        Self { bar, failed: 0 }
    }

    /// Records one finished task.
    pub(crate) fn record(&mut self, task: &DownloadTask, outcome: &DownloadOutcome) {
        if matches!(outcome, DownloadOutcome::Failed { .. }) {
            self.failed += 1;
        }
        let Some(bar) = &self.bar else {
            return;
        };
        bar.inc(1);
        if self.failed > 0 {
            bar.set_message(format!("{} failed", self.failed));
        } else if let Some(name) = task.destination.file_name() {
            bar.set_message(name.to_string_lossy().into_owned());
        }
    }

    pub(crate) fn finish(self) {
        if let Some(bar) = self.bar {
            bar.finish_and_clear();
        }
    }
}
