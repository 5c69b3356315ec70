// src/export.rs
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::models::record::{FacilityRecord, SlimRecord};
use crate::models::stats_models::PipelineStats;

pub const HOSPITALS_JSON: &str = "nepal_hospitals.json";
pub const ALL_FACILITIES_JSON: &str = "nepal_all_health_facilities.json";
pub const HOSPITALS_CSV: &str = "nepal_hospitals.csv";
pub const CLEAN_JSON: &str = "nepal_health_facilities_clean.json";
pub const RUN_SUMMARY_JSON: &str = "run_summary.json";

/// Column order of the CSV export, identical to the record's field order.
pub const CSV_HEADERS: [&str; 9] = [
    "name",
    "province",
    "district",
    "address",
    "hospital_type",
    "image_url",
    "latitude",
    "longitude",
    "source",
];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

fn create(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

/// Pretty-printed UTF-8 JSON with two-space indentation.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut writer = create(path)?;
    serde_json::to_writer_pretty(&mut writer, value)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("Failed to flush {}", path.display()))
}

/// Spreadsheet-friendly CSV: UTF-8 with a byte order mark, header row always
/// present.
pub fn write_csv(path: &Path, records: &[FacilityRecord]) -> Result<()> {
    let mut writer = create(path)?;
    writer
        .write_all(UTF8_BOM)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv_writer
        .write_record(CSV_HEADERS)
        .context("CSV header write error")?;
    for record in records {
        csv_writer
            .serialize(record)
            .with_context(|| format!("CSV write error for {:?}", record.name))?;
    }
    csv_writer
        .flush()
        .with_context(|| format!("Failed to flush {}", path.display()))
}

/// Five-field projection of every record.
pub fn write_slim_json(path: &Path, records: &[FacilityRecord]) -> Result<usize> {
    let slim: Vec<SlimRecord> = records.iter().map(SlimRecord::from).collect();
    write_json(path, &slim)?;
    Ok(slim.len())
}

pub fn read_records(path: &Path) -> Result<Vec<FacilityRecord>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("{} is not a list of facility records", path.display()))
}

pub fn write_run_summary(path: &Path, stats: &PipelineStats) -> Result<()> {
    write_json(path, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::{Province, Source};
    use chrono::Utc;
    use tempfile::tempdir;

    fn sample() -> Vec<FacilityRecord> {
        vec![
            FacilityRecord {
                province: Some(Province::Bagmati),
                district: Some("Kathmandu".to_string()),
                address: "Mahaboudha, Kathmandu".to_string(),
                image_url: Some("https://www.hip.sbkmtrust.org.np/bir.jpg".to_string()),
                ..FacilityRecord::new("Bir Hospital", Source::Hip)
            },
            FacilityRecord {
                hospital_type: Some("clinic".to_string()),
                latitude: Some(27.7),
                longitude: Some(85.3),
                address: "Ward 4, \"Old\" Road".to_string(),
                ..FacilityRecord::new("Sunrise Clinic", Source::HdxOsm)
            },
        ]
    }

    #[test]
    fn test_csv_has_bom_header_and_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(HOSPITALS_CSV);
        write_csv(&path, &sample()).unwrap();

        let bytes = fs::read(&path).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        let text = String::from_utf8(bytes[UTF8_BOM.len()..].to_vec()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "name,province,district,address,hospital_type,image_url,latitude,longitude,source");
        assert_eq!(
            lines[1],
            "Bir Hospital,Bagmati,Kathmandu,\"Mahaboudha, Kathmandu\",,https://www.hip.sbkmtrust.org.np/bir.jpg,,,HIP"
        );
        assert_eq!(lines[2], "Sunrise Clinic,,,\"Ward 4, \"\"Old\"\" Road\",clinic,,27.7,85.3,HDX_OSM");
    }

    #[test]
    fn test_csv_with_no_records_still_has_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join(HOSPITALS_CSV);
        write_csv(&path, &[]).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.trim_start_matches('\u{feff}').lines().count(), 1);
    }

    #[test]
    fn test_json_round_trip_and_slim_projection() {
        let dir = tempdir().unwrap();
        let full = dir.path().join(ALL_FACILITIES_JSON);
        write_json(&full, &sample()).unwrap();

        let text = fs::read_to_string(&full).unwrap();
        assert!(text.starts_with("[\n  {\n    \"name\": \"Bir Hospital\""));
        assert!(text.contains("\"province\": \"\""));

        let records = read_records(&full).unwrap();
        assert_eq!(records, sample());

        let clean = dir.path().join(CLEAN_JSON);
        assert_eq!(write_slim_json(&clean, &records).unwrap(), 2);
        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&clean).unwrap()).unwrap();
        let first = value[0].as_object().unwrap();
        assert_eq!(first.len(), 5);
        assert!(first.get("source").is_none());
        assert_eq!(value[1]["hospital_type"], "clinic");
    }

    #[test]
    fn test_read_records_rejects_other_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("other.json");
        fs::write(&path, r#"{"name": "not a list"}"#).unwrap();
        assert!(read_records(&path).is_err());
        assert!(read_records(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_run_summary() {
        let dir = tempdir().unwrap();
        let mut stats = PipelineStats::new("run-1", Utc::now().naive_utc(), Some("test run"));
        stats.hospitals_count = 2;
        let path = dir.path().join(RUN_SUMMARY_JSON);
        write_run_summary(&path, &stats).unwrap();
        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["run_id"], "run-1");
        assert_eq!(value["hospitals_count"], 2);
    }
}
