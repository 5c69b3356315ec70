// src/sources/hdx.rs
//! HDX export of OpenStreetMap health facility points (HOT), shipped as a
//! zipped GeoJSON FeatureCollection.

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::future::Future;
use std::io::{Cursor, Read};
use std::path::Path;

use crate::geography::{district_for_point, DistrictBoundary, GeographyReference};
use crate::models::record::{round_coordinate, FacilityRecord, Source};
use crate::utils::progress_bars::logging::SourceLogger;

pub const HDX_URLS: [&str; 2] = [
    "https://data.humdata.org/dataset/a1c166f4-803e-4578-a6c5-3f3efb8e2444/resource/f80102cf-de5e-4be9-9a0d-fae3ab4387fe/download/hotosm_npl_health_facilities_points_geojson.zip",
    "https://s3.dualstack.us-east-1.amazonaws.com/production-raw-data-api/ISO3/NPL/health_facilities/points/hotosm_npl_health_facilities_points_geojson.zip",
];
pub const RAW_GEOJSON_FILE: &str = "hotosm_npl_health_facilities.json";

const NAME_KEYS: [&str; 3] = ["name", "name:en", "name_ne"];
const CATEGORY_KEYS: [&str; 2] = ["healthcare", "amenity"];
const EXCLUDED_CATEGORIES: [&str; 2] = ["pharmacy", "pharmacist"];
/// OSM address sub-fields, in output order. Exports use either separator.
const ADDRESS_FIELDS: [&str; 6] = ["full", "street", "city", "place", "village", "municipality"];

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HdxFeature {
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub geometry: Option<Value>,
}

impl HdxFeature {
    fn prop(&self, key: &str) -> Option<&str> {
        self.properties
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    fn first_prop(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|k| self.prop(k))
    }

    /// `Some` only for Point geometry. The inner option is `None` when the
    /// coordinates are missing or not numeric.
    fn point(&self) -> Option<Option<(f64, f64)>> {
        let geometry = self.geometry.as_ref()?;
        if geometry.get("type").and_then(Value::as_str) != Some("Point") {
            return None;
        }
        let coords = geometry.get("coordinates").and_then(Value::as_array);
        let lon = coords.and_then(|c| c.first()).and_then(Value::as_f64);
        let lat = coords.and_then(|c| c.get(1)).and_then(Value::as_f64);
        Some(lon.zip(lat))
    }
}

pub fn is_excluded_category(category: &str) -> bool {
    EXCLUDED_CATEGORIES.contains(&category)
}

fn osm_address(feature: &HdxFeature) -> String {
    ADDRESS_FIELDS
        .iter()
        .filter_map(|field| {
            feature
                .prop(&format!("addr:{}", field))
                .or_else(|| feature.prop(&format!("addr_{}", field)))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Features of a FeatureCollection; anything else yields no features.
pub fn features_from_geojson(data: &Value) -> Vec<HdxFeature> {
    data.get("features")
        .and_then(Value::as_array)
        .map(|features| {
            features
                .iter()
                .filter_map(|f| HdxFeature::deserialize(f).ok())
                .collect()
        })
        .unwrap_or_default()
}

/// Point features with a usable name and a non-pharmacy category. Geography
/// comes from the boundaries first, then from address and name text.
pub fn normalize_hdx(
    features: &[HdxFeature],
    boundaries: &[DistrictBoundary],
    geo: &GeographyReference,
) -> Vec<FacilityRecord> {
    let mut records = Vec::new();

    for feature in features {
        let Some(coordinates) = feature.point() else {
            continue;
        };
        let Some(name) = feature.first_prop(&NAME_KEYS) else {
            continue;
        };
        if name.chars().count() < 3 {
            continue;
        }
        let Some(category) = feature.first_prop(&CATEGORY_KEYS).map(str::to_lowercase) else {
            continue;
        };
        if is_excluded_category(&category) {
            continue;
        }

        let address = osm_address(feature);

        let (mut district, mut province) = match coordinates {
            Some((lon, lat)) if !boundaries.is_empty() => {
                district_for_point(lon, lat, boundaries, geo)
            }
            _ => (None, None),
        };
        if district.is_none() || province.is_none() {
            let text = format!("{} {}", address, name);
            if let Some(m) = geo.find_district_in_text(&text, None) {
                district = Some(m.district.to_string());
                province = Some(m.province);
            }
        }

        records.push(FacilityRecord {
            province,
            district,
            address,
            hospital_type: Some(category),
            latitude: coordinates.map(|(_, lat)| round_coordinate(lat)),
            longitude: coordinates.map(|(lon, _)| round_coordinate(lon)),
            ..FacilityRecord::new(name, Source::HdxOsm)
        });
    }
    records
}

/// First `.geojson` (or `.json`) entry of the archive, parsed.
pub fn geojson_from_archive(bytes: &[u8]) -> Result<Value> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).context("HDX download is not a zip archive")?;

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .with_context(|| format!("Failed to read archive entry {}", index))?;
        let name = entry.name().to_string();
        if !(name.ends_with(".geojson") || name.ends_with(".json")) {
            continue;
        }
        let mut content = String::new();
        entry
            .read_to_string(&mut content)
            .with_context(|| format!("Failed to decompress {}", name))?;
        return serde_json::from_str(&content)
            .with_context(|| format!("{} is not valid GeoJSON", name));
    }
    bail!("HDX archive contains no GeoJSON file")
}

async fn download_from(client: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Request to {} failed", url))?
        .error_for_status()
        .with_context(|| format!("{} returned an error status", url))?;
    let bytes = response
        .bytes()
        .await
        .with_context(|| format!("Failed to read archive from {}", url))?;
    Ok(bytes.to_vec())
}

/// Tries each URL in order and returns the first successful download. When
/// every URL fails the last error is returned.
pub async fn download_with_fallback<F, Fut>(
    urls: &[&'static str],
    logger: &SourceLogger,
    mut download: F,
) -> Result<Vec<u8>>
where
    F: FnMut(&'static str) -> Fut,
    Fut: Future<Output = Result<Vec<u8>>>,
{
    let mut last_error = None;
    for &url in urls {
        logger.log_start(url);
        match download(url).await {
            Ok(bytes) => return Ok(bytes),
            Err(e) => {
                logger.log_warning(&format!("{:#}", e));
                last_error = Some(e);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| anyhow!("No HDX download URL configured")))
}

/// Downloads the archive from the primary URL or its mirror and returns the
/// parsed GeoJSON, optionally saving a pretty-printed copy.
pub async fn fetch_hdx(
    client: &reqwest::Client,
    raw_output_dir: Option<&Path>,
    logger: &SourceLogger,
) -> Result<Value> {
    let bytes = download_with_fallback(&HDX_URLS, logger, |url| download_from(client, url)).await?;
    logger.log_phase("Extracting", Some(format!("{} byte archive", bytes.len()).as_str()));
    let data = geojson_from_archive(&bytes)?;

    if let Some(dir) = raw_output_dir {
        let path = dir.join(RAW_GEOJSON_FILE);
        let saved = serde_json::to_string_pretty(&data)
            .context("Failed to serialize raw GeoJSON")
            .and_then(|json| {
                fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))
            });
        match saved {
            Ok(()) => logger.log_debug(&format!("Saved raw data to {}", path.display())),
            Err(e) => logger.log_warning(&format!("{:#}", e)),
        }
    }
    Ok(data)
}

pub async fn collect_hdx(
    client: &reqwest::Client,
    boundaries: &[DistrictBoundary],
    geo: &GeographyReference,
    raw_output_dir: Option<&Path>,
) -> Result<Vec<FacilityRecord>> {
    let logger = SourceLogger::new(Source::HdxOsm);
    let data = fetch_hdx(client, raw_output_dir, &logger).await?;

    let features = features_from_geojson(&data);
    logger.log_extracted(features.len(), "feature");
    if boundaries.is_empty() {
        logger.log_warning("No district boundaries; resolving geography from text only");
    }

    let records = normalize_hdx(&features, boundaries, geo);
    logger.log_normalized(features.len(), records.len());
    logger.log_completion(records.len());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::Province;
    use serde_json::json;
    use std::io::Write;

    fn feature(properties: Value, geometry: Value) -> HdxFeature {
        HdxFeature {
            properties: properties.as_object().cloned().unwrap_or_default(),
            geometry: (!geometry.is_null()).then_some(geometry),
        }
    }

    fn point(lon: f64, lat: f64) -> Value {
        json!({"type": "Point", "coordinates": [lon, lat]})
    }

    fn kathmandu_square() -> Vec<DistrictBoundary> {
        vec![DistrictBoundary {
            district: "Kathmandu".to_string(),
            ring: vec![[85.2, 27.6], [85.5, 27.6], [85.5, 27.8], [85.2, 27.8]],
        }]
    }

    #[test]
    fn test_filters_names_and_categories() {
        let geo = GeographyReference::new();
        let features = vec![
            feature(json!({"name": "Om Hospital", "healthcare": "Hospital"}), point(85.34, 27.71)),
            feature(json!({"name": "Om Pharmacy", "healthcare": "pharmacy"}), point(85.34, 27.71)),
            feature(json!({"name": "Drug Store", "amenity": "PHARMACIST"}), point(85.34, 27.71)),
            feature(json!({"name": "HP", "healthcare": "clinic"}), point(85.34, 27.71)),
            feature(json!({"healthcare": "clinic"}), point(85.34, 27.71)),
            feature(json!({"name": "Untagged Place"}), point(85.34, 27.71)),
            feature(
                json!({"name": "Area Hospital", "healthcare": "hospital"}),
                json!({"type": "Polygon", "coordinates": []}),
            ),
            feature(json!({"name": "", "name:en": "Sunrise Clinic", "amenity": "clinic"}), point(85.34, 27.71)),
        ];
        let records = normalize_hdx(&features, &kathmandu_square(), &geo);
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Om Hospital", "Sunrise Clinic"]);
        assert_eq!(records[0].hospital_type.as_deref(), Some("hospital"));
        assert_eq!(records[0].source, Source::HdxOsm);
    }

    #[test]
    fn test_boundary_then_text_fallback() {
        let geo = GeographyReference::new();
        let features = vec![
            feature(
                json!({"name": "Teku Hospital", "healthcare": "hospital", "addr:street": "Teku Road"}),
                point(85.3012345678, 27.6954321),
            ),
            feature(
                json!({"name": "Dharan Clinic", "healthcare": "clinic", "addr_city": "Dharan"}),
                point(87.28, 26.81),
            ),
            feature(
                json!({"name": "Pokhara Health Centre", "healthcare": "centre"}),
                json!({"type": "Point", "coordinates": []}),
            ),
        ];
        let records = normalize_hdx(&features, &kathmandu_square(), &geo);
        assert_eq!(records.len(), 3);

        assert_eq!(records[0].district.as_deref(), Some("Kathmandu"));
        assert_eq!(records[0].province, Some(Province::Bagmati));
        assert_eq!(records[0].latitude, Some(27.695432));
        assert_eq!(records[0].longitude, Some(85.301235));
        assert_eq!(records[0].address, "Teku Road");

        // Outside every ring: the address names the city.
        assert_eq!(records[1].district.as_deref(), Some("Sunsari"));
        assert_eq!(records[1].province, Some(Province::Koshi));

        // No coordinates: the name still resolves, coordinates stay empty.
        assert_eq!(records[2].district.as_deref(), Some("Kaski"));
        assert_eq!(records[2].latitude, None);
        assert_eq!(records[2].longitude, None);
    }

    #[test]
    fn test_empty_boundaries_still_resolve_from_text() {
        let geo = GeographyReference::new();
        let features = vec![feature(
            json!({"name": "Seti Provincial Hospital", "healthcare": "hospital", "addr:city": "Dhangadhi"}),
            point(80.58, 28.69),
        )];
        let records = normalize_hdx(&features, &[], &geo);
        assert_eq!(records[0].district.as_deref(), Some("Kailali"));
        assert_eq!(records[0].province, Some(Province::Sudurpashchim));
    }

    #[test]
    fn test_unknown_boundary_name_never_reaches_records() {
        let geo = GeographyReference::new();
        // A stale cache entry whose name is not in the reference table.
        let boundaries = vec![DistrictBoundary {
            district: "Kabhrepalanchok".to_string(),
            ring: vec![[85.4, 27.5], [85.7, 27.5], [85.7, 27.7], [85.4, 27.7]],
        }];
        let features = vec![
            feature(json!({"name": "Ward Clinic", "healthcare": "clinic"}), point(85.55, 27.6)),
            feature(json!({"name": "Dhulikhel Hospital", "healthcare": "hospital"}), point(85.55, 27.6)),
        ];
        let records = normalize_hdx(&features, &boundaries, &geo);
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].district, None);
        assert_eq!(records[0].province, None);

        let district = records[1].district.as_deref().unwrap();
        assert_eq!(geo.canonical_district(district), Some(district));
        assert_eq!(records[1].province, Some(Province::Bagmati));
    }

    #[test]
    fn test_address_joins_present_fields_in_order() {
        let geo = GeographyReference::new();
        let features = vec![feature(
            json!({
                "name": "Ward Clinic",
                "healthcare": "clinic",
                "addr:municipality": "Lalitpur",
                "addr_street": "Jawalakhel",
                "addr:city": "   ",
                "addr:place": "Ward 4"
            }),
            point(0.0, 0.0),
        )];
        let records = normalize_hdx(&features, &[], &geo);
        assert_eq!(records[0].address, "Jawalakhel, Ward 4, Lalitpur");
    }

    #[test]
    fn test_features_from_archive() {
        let collection = json!({
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {"name": "Om Hospital", "healthcare": "hospital"}, "geometry": {"type": "Point", "coordinates": [85.34, 27.71]}},
                {"type": "Feature", "properties": null, "geometry": null}
            ]
        });

        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        writer.start_file("README.txt", options.clone()).unwrap();
        writer.write_all(b"not data").unwrap();
        writer.start_file("hotosm_npl_health_facilities_points.geojson", options).unwrap();
        writer.write_all(collection.to_string().as_bytes()).unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let data = geojson_from_archive(&bytes).unwrap();
        let features = features_from_geojson(&data);
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].prop("name"), Some("Om Hospital"));

        assert!(geojson_from_archive(b"plain text").is_err());
    }

    #[tokio::test]
    async fn test_download_falls_back_to_mirror() {
        let logger = SourceLogger::new(Source::HdxOsm);
        let mut attempts = Vec::new();
        let bytes = download_with_fallback(&HDX_URLS, &logger, |url| {
            attempts.push(url);
            let primary = url == HDX_URLS[0];
            async move {
                if primary {
                    bail!("{} returned an error status", url);
                }
                Ok::<_, anyhow::Error>(b"archive".to_vec())
            }
        })
        .await
        .unwrap();
        assert_eq!(bytes, b"archive".to_vec());
        assert_eq!(attempts, HDX_URLS.to_vec());
    }

    #[tokio::test]
    async fn test_download_stops_at_first_success() {
        let logger = SourceLogger::new(Source::HdxOsm);
        let mut attempts = Vec::new();
        let bytes = download_with_fallback(&HDX_URLS, &logger, |url| {
            attempts.push(url);
            std::future::ready(Ok::<_, anyhow::Error>(url.as_bytes().to_vec()))
        })
        .await
        .unwrap();
        assert_eq!(bytes, HDX_URLS[0].as_bytes().to_vec());
        assert_eq!(attempts, vec![HDX_URLS[0]]);
    }

    #[tokio::test]
    async fn test_download_reports_last_error_when_all_fail() {
        let logger = SourceLogger::new(Source::HdxOsm);
        let err = download_with_fallback(&HDX_URLS, &logger, |url| {
            std::future::ready(Err::<Vec<u8>, _>(anyhow!("{} unreachable", url)))
        })
        .await
        .unwrap_err();
        assert!(err.to_string().contains(HDX_URLS[1]));

        let err = download_with_fallback(&[], &logger, |_| std::future::ready(Ok::<_, anyhow::Error>(Vec::new())))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No HDX download URL"));
    }
}
