// src/utils/progress_bars/logging.rs - Logging helpers shared by the source adapters
use log::{debug, info, warn};
use std::time::Instant;

use crate::models::record::Source;

#[derive(Clone)]
pub struct SourceLogger {
    source_name: &'static str,
    source_emoji: &'static str,
    start_time: Instant,
}

impl SourceLogger {
    pub fn new(source: Source) -> Self {
        let source_emoji = match source {
            Source::Hip => "🏥",
            Source::Nssd => "📋",
            Source::Arcgis => "🛰️",
            Source::HdxOsm => "🗺️",
        };

        Self {
            source_name: source.as_str(),
            source_emoji,
            start_time: Instant::now(),
        }
    }

    pub fn log_start(&self, url: &str) {
        info!(
            "[{}] {} 🚀 Fetching from {}",
            self.source_name, self.source_emoji, url
        );
    }

    pub fn log_phase(&self, phase: &str, details: Option<&str>) {
        let elapsed = self.start_time.elapsed();
        let msg = if let Some(details) = details {
            format!(
                "[{}] {} 🔄 Phase: {} - {} [+{:.1}s]",
                self.source_name, self.source_emoji, phase, details, elapsed.as_secs_f32()
            )
        } else {
            format!(
                "[{}] {} 🔄 Phase: {} [+{:.1}s]",
                self.source_name, self.source_emoji, phase, elapsed.as_secs_f32()
            )
        };
        info!("{}", msg);
    }

    pub fn log_extracted(&self, count: usize, item_type: &str) {
        info!(
            "[{}] {} 📊 Extracted {} raw {} items",
            self.source_name, self.source_emoji, count, item_type
        );
    }

    pub fn log_page(&self, page: usize, rows: usize, total: usize) {
        debug!(
            "[{}] {} 📦 Page {}: {} rows ({} so far)",
            self.source_name, self.source_emoji, page, rows, total
        );
    }

    pub fn log_normalized(&self, raw_count: usize, record_count: usize) {
        let dropped = raw_count.saturating_sub(record_count);
        info!(
            "[{}] {} ✅ Normalization complete: {} raw items → {} records ({} dropped)",
            self.source_name, self.source_emoji, raw_count, record_count, dropped
        );
    }

    pub fn log_completion(&self, records: usize) {
        info!(
            "[{}] {} 🎉 COMPLETED: {} records in {:.2?}",
            self.source_name,
            self.source_emoji,
            records,
            self.start_time.elapsed()
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!("[{}] {} ⚠️  {}", self.source_name, self.source_emoji, message);
    }

    pub fn log_debug(&self, message: &str) {
        debug!("[{}] {} {}", self.source_name, self.source_emoji, message);
    }
}
