use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::info;
use std::time::Instant;

/// Terminal progress for a pass over a known number of files
#[derive(Clone)]
pub struct ProgressTracker {
    bar: ProgressBar,
    label: String,
    start_time: Instant,
}

impl ProgressTracker {
    /// Create a tracker for `total` files, drawn only when `visible`
    pub fn new(total: usize, label: &str, visible: bool) -> Self {
        let bar = ProgressBar::new(total as u64);
        if visible {
            let style = ProgressStyle::default_bar()
                .template("{prefix} {wide_bar} {pos}/{len} ({percent}%) | {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓▒░ ");
            bar.set_style(style);
            bar.set_prefix(label.to_string());
        } else {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }

        Self {
            bar,
            label: label.to_string(),
            start_time: Instant::now(),
        }
    }

    /// Count one file as finished
    pub fn advance(&self) {
        self.bar.inc(1);

        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            let rate = self.bar.position() as f64 / elapsed;
            self.bar.set_message(format!("{:.1} files/s", rate));
        }
    }

    /// Close the bar and log the throughput
    pub fn finish(&self, status: &str) {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        let done = self.bar.position();
        let throughput = if elapsed > 0.0 {
            done as f64 / elapsed
        } else {
            0.0
        };

        self.bar.finish_with_message(format!(
            "{} | {:.1}s elapsed | {:.1} files/s",
            status, elapsed, throughput
        ));
        info!(
            "{} finished: {} files in {:.1}s ({})",
            self.label, done, elapsed, status
        );
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_tracker_counts() {
        let tracker = ProgressTracker::new(3, "test", false);
        tracker.advance();
        tracker.clone().advance();
        assert_eq!(tracker.position(), 2);
        tracker.finish("done");
    }
}
