// src/models/stats_models.rs
use chrono::NaiveDateTime;
use serde::Serialize;

use super::record::{FacilityRecord, Source};

#[derive(Debug, Clone, Serialize)]
pub struct SourceStats {
    pub source: Source,
    /// Normalized records the source produced before reconciliation
    pub records: usize,
    /// Records of this source that survived into each output
    pub in_hospitals: usize,
    pub in_all_facilities: usize,
    pub fetch_time: f64,
    pub failed: bool,
    pub failure_reason: Option<String>,
}

impl SourceStats {
    pub fn new(source: Source, records: usize, fetch_time: f64) -> Self {
        Self {
            source,
            records,
            in_hospitals: 0,
            in_all_facilities: 0,
            fetch_time,
            failed: false,
            failure_reason: None,
        }
    }

    pub fn count_contributions(&mut self, hospitals: &[FacilityRecord], all: &[FacilityRecord]) {
        self.in_hospitals = hospitals.iter().filter(|r| r.source == self.source).count();
        self.in_all_facilities = all.iter().filter(|r| r.source == self.source).count();
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineStats {
    pub run_id: String,
    pub run_timestamp: NaiveDateTime,
    pub description: Option<String>,
    pub boundaries_loaded: usize,
    pub source_stats: Vec<SourceStats>,
    pub hospitals_count: usize,
    pub all_facilities_count: usize,
    pub fetch_time: f64,
    pub reconcile_time: f64,
    pub export_time: f64,
    pub total_processing_time: f64,
}

impl PipelineStats {
    pub fn new(run_id: &str, run_timestamp: NaiveDateTime, description: Option<&str>) -> Self {
        Self {
            run_id: run_id.to_string(),
            run_timestamp,
            description: description.map(|s| s.to_string()),
            boundaries_loaded: 0,
            source_stats: Vec::new(),
            hospitals_count: 0,
            all_facilities_count: 0,
            fetch_time: 0.0,
            reconcile_time: 0.0,
            export_time: 0.0,
            total_processing_time: 0.0,
        }
    }

    pub fn failed_sources(&self) -> Vec<Source> {
        self.source_stats
            .iter()
            .filter(|s| s.failed)
            .map(|s| s.source)
            .collect()
    }
}
