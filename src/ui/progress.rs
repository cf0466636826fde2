// Tue Jan 13 2026 - Alex

use crate::crawler::{CrawlState, CrawlStats};
use crate::validation::CrawlProgress;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

const SPINNER_TEMPLATE: &str = "{spinner:.cyan} [{elapsed_precise}] {msg}";

/// Spinner shown while the crawler works through the bundle.
#[derive(Clone)]
pub struct CrawlSpinner {
    bar: ProgressBar,
}

impl CrawlSpinner {
    pub fn new(enabled: bool) -> Self {
        let bar = if enabled {
            let bar = ProgressBar::new_spinner();
            let style = ProgressStyle::default_spinner()
                .template(SPINNER_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ");
            bar.set_style(style);
            bar.enable_steady_tick(Duration::from_millis(80));
            bar
        } else {
            let bar = ProgressBar::new_spinner();
            bar.set_draw_target(ProgressDrawTarget::hidden());
            bar
        };
        bar.set_message("Booting bundle...");
        Self { bar }
    }

    pub fn message(state: CrawlState, stats: &CrawlStats) -> String {
        format!(
            "{} | {} modules, {} chunks ok, {} invalid",
            state.name(),
            stats.modules_scanned,
            stats.valid_chunks,
            stats.invalid_chunks
        )
    }

    pub fn update(&self, state: CrawlState, stats: &CrawlStats) {
        self.bar.set_message(Self::message(state, stats));
    }

    /// Progress callback for the verification runner.
    pub fn callback(&self) -> CrawlProgress {
        let spinner = self.clone();
        Box::new(move |state, stats| spinner.update(state, stats))
    }

    /// Prints above the spinner without tearing it.
    pub fn println(&self, line: &str) {
        if self.bar.is_hidden() {
            println!("{}", line);
        } else {
            self.bar.println(line);
        }
    }

    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    pub fn clear(&self) {
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_summarises_stats() {
        let stats = CrawlStats {
            modules_scanned: 12,
            valid_chunks: 3,
            invalid_chunks: 1,
            ..CrawlStats::default()
        };
        assert_eq!(
            CrawlSpinner::message(CrawlState::Loading, &stats),
            "loading | 12 modules, 3 chunks ok, 1 invalid"
        );
    }

    #[test]
    fn test_hidden_spinner_accepts_updates() {
        let spinner = CrawlSpinner::new(false);
        let callback = spinner.callback();
        callback(CrawlState::Done, &CrawlStats::default());
        spinner.clear();
    }
}
