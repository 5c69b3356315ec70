// src/reconcile.rs
//! Cross-source merge. One record survives per normalized name; the source
//! with the best priority wins, and equal priority keeps the first seen.

use log::debug;
use std::collections::HashMap;

use crate::models::record::{ArcgisRecord, FacilityRecord};
use crate::utils::text::collapse_whitespace;

/// Keys shorter than this are noise, not facility names.
const MIN_KEY_CHARS: usize = 4;

/// Case-folded, whitespace-collapsed name.
pub fn dedup_key(name: &str) -> String {
    collapse_whitespace(&name.to_lowercase())
}

#[derive(Default)]
struct MergeTable {
    records: Vec<FacilityRecord>,
    slots: HashMap<String, usize>,
    replaced: usize,
    rejected: usize,
    discarded: usize,
}

impl MergeTable {
    fn offer(&mut self, record: &FacilityRecord) {
        let key = dedup_key(&record.name);
        if key.chars().count() < MIN_KEY_CHARS {
            self.discarded += 1;
            return;
        }
        match self.slots.get(&key) {
            Some(&slot) => {
                let existing = &self.records[slot];
                if record.source.priority() < existing.source.priority() {
                    self.records[slot] = record.clone();
                    self.replaced += 1;
                } else {
                    self.rejected += 1;
                }
            }
            None => {
                self.slots.insert(key, self.records.len());
                self.records.push(record.clone());
            }
        }
    }
}

/// Merges HIP, NSSD, HDX/OSM and then ArcGIS, in that order. ArcGIS rows below
/// hospital level only take part when `include_low_tier` is set.
///
/// Output keeps the order in which keys were first claimed.
pub fn reconcile(
    hip: &[FacilityRecord],
    arcgis: &[ArcgisRecord],
    nssd: &[FacilityRecord],
    hdx: &[FacilityRecord],
    include_low_tier: bool,
) -> Vec<FacilityRecord> {
    let mut table = MergeTable::default();

    for record in hip.iter().chain(nssd).chain(hdx) {
        table.offer(record);
    }
    for row in arcgis {
        if include_low_tier || row.is_hospital_level {
            table.offer(&row.record);
        }
    }

    debug!(
        "Reconciled {} records (low tier {}): {} replaced, {} duplicates rejected, {} short names discarded",
        table.records.len(),
        if include_low_tier { "included" } else { "excluded" },
        table.replaced,
        table.rejected,
        table.discarded
    );
    table.records
}
