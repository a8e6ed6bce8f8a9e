//! Terminal progress bars.
//!
//! Every transfer gets its own bar and its own callback, nothing is shared between downloads.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

const TRANSFER_TEMPLATE: &str =
    "{prefix:>8} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";
const SPINNER_TEMPLATE: &str = "{prefix:>8} {spinner} {bytes} ({bytes_per_sec})";
const VIDEOS_TEMPLATE: &str = "{prefix:>8} [{bar:40.green}] {pos}/{len} {wide_msg}";

/// The set of bars drawn for one run.
#[derive(Debug, Clone)]
pub struct Progress {
    multi: MultiProgress,
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}

impl Progress {
    /// Bars drawn on stderr.
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
        }
    }

    /// Bars that are never drawn.
    pub fn hidden() -> Self {
        Self {
            multi: MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
        }
    }

    /// The underlying multi-bar, used to route log lines around the bars.
    pub fn multi(&self) -> &MultiProgress {
        &self.multi
    }

    /// Adds a bar for one transfer. An unknown size (`0`) shows a spinner instead.
    pub fn transfer(&self, label: &str, total_bytes: u64) -> TransferBar {
        let bar = if total_bytes > 0 {
            ProgressBar::new(total_bytes).with_style(style(TRANSFER_TEMPLATE).progress_chars("#>-"))
        } else {
            ProgressBar::new_spinner().with_style(style(SPINNER_TEMPLATE))
        };

        TransferBar {
            bar: self.multi.add(bar.with_prefix(label.to_string())),
        }
    }

    /// Adds the outer bar of a playlist run.
    pub fn videos(&self, total: u64) -> ProgressBar {
        let bar = ProgressBar::new(total)
            .with_style(style(VIDEOS_TEMPLATE).progress_chars("=>-"))
            .with_prefix("videos");
        self.multi.add(bar)
    }
}

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_bar())
}

/// The bar of one transfer.
#[derive(Debug, Clone)]
pub struct TransferBar {
    bar: ProgressBar,
}

impl TransferBar {
    /// A fresh callback that adds each received chunk size to this bar.
    pub fn callback(&self) -> impl FnMut(u64) + Send + 'static {
        let bar = self.bar.clone();
        move |delta| bar.inc(delta)
    }

    /// Bytes counted so far.
    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    /// Removes the bar from the terminal.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_callbacks_are_independent() {
        let progress = Progress::hidden();
        let video = progress.transfer("video", 100);
        let audio = progress.transfer("audio", 0);

        let mut on_video = video.callback();
        let mut on_audio = audio.callback();
        on_video(40);
        on_audio(7);
        on_video(60);

        assert_eq!(video.position(), 100);
        assert_eq!(audio.position(), 7);
    }
}
