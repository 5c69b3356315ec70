// src/utils/progress_bars/progress_config.rs

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::env;
use std::time::Duration;

/// Configuration for progress display during a run
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    /// Whether to show progress bars at all
    pub enabled: bool,
    /// Whether to show one spinner per source under the main bar
    pub detailed: bool,
    /// Spinner tick interval in milliseconds
    pub refresh_rate_ms: u64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            detailed: true,
            refresh_rate_ms: 100,
        }
    }
}

impl ProgressConfig {
    /// Create progress configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            enabled: env::var("PROGRESS_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            detailed: env::var("PROGRESS_DETAILED")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            refresh_rate_ms: env::var("PROGRESS_REFRESH_RATE_MS")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .unwrap_or(100),
        }
    }

    /// Create a MultiProgress instance if progress is enabled, None otherwise
    pub fn create_multi_progress(&self) -> Option<MultiProgress> {
        if self.enabled {
            Some(MultiProgress::new())
        } else {
            None
        }
    }

    pub fn should_show_detailed(&self) -> bool {
        self.enabled && self.detailed
    }

    /// Main bar counting pipeline phases.
    pub fn phase_bar(&self, mp: Option<&MultiProgress>, phases: u64) -> Option<ProgressBar> {
        let mp = mp?;
        let pb = mp.add(ProgressBar::new(phases));
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        Some(pb)
    }

    /// Spinner for one source fetch. `None` when detailed progress is off.
    pub fn source_spinner(&self, mp: Option<&MultiProgress>, label: &str) -> Option<ProgressBar> {
        if !self.should_show_detailed() {
            return None;
        }
        let pb = mp?.add(ProgressBar::new_spinner());
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("  {spinner:.blue} [{elapsed_precise}] {prefix:.bold} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_prefix(label.to_string());
        pb.enable_steady_tick(Duration::from_millis(self.refresh_rate_ms.max(10)));
        Some(pb)
    }
}
