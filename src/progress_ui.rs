//! Terminal progress bar for a single model transfer.

use comfyfetch_core::DownloadProgress;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

const BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes:>10}/{total_bytes:<10} {msg}";

/// Byte progress bar fed by the engine's progress callback.
#[derive(Debug, Clone)]
pub(crate) struct TransferBar {
    bar: ProgressBar,
}

impl TransferBar {
    /// Creates a bar labelled with `file_name`; hidden when `quiet`.
    pub(crate) fn new(file_name: &str, quiet: bool) -> Self {
        let bar = ProgressBar::new(0);
        if quiet {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }
        bar.set_style(
            ProgressStyle::with_template(BAR_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar.set_message(file_name.to_string());
        Self { bar }
    }

    /// Applies one progress snapshot.
    pub(crate) fn update(&self, progress: &DownloadProgress) {
        if self.bar.length() != Some(progress.total) {
            self.bar.set_length(progress.total);
        }
        self.bar.set_position(progress.downloaded);
        self.bar.set_message(progress.speed_label());
    }

    /// Removes the bar from the terminal.
    pub(crate) fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
