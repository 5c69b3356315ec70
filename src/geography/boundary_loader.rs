// src/geography/boundary_loader.rs
//! District boundary acquisition: local cache first, then the public GeoJSON.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde_json::Value;
use std::fs;
use std::path::Path;

use super::boundary::DistrictBoundary;
use super::reference::GeographyReference;

pub const NEPAL_DISTRICTS_GEOJSON_URL: &str =
    "https://raw.githubusercontent.com/mesaugat/geoJSON-Nepal/master/nepal-districts.geojson";

/// Loads boundaries once per run. Any failure degrades to an empty list, in
/// which case district resolution falls back to text matching.
pub async fn load_district_boundaries(
    client: &reqwest::Client,
    url: &str,
    cache_path: &Path,
    geo: &GeographyReference,
) -> Vec<DistrictBoundary> {
    if cache_path.exists() {
        match read_cache(cache_path) {
            Ok(boundaries) if !boundaries.is_empty() => {
                info!(
                    "[Geo] 🗺️  Loaded {} district boundaries from cache {}",
                    boundaries.len(),
                    cache_path.display()
                );
                return boundaries;
            }
            Ok(_) => debug!("[Geo] Boundary cache {} is empty, refetching", cache_path.display()),
            Err(e) => warn!("[Geo] ⚠️  Ignoring unreadable boundary cache: {:#}", e),
        }
    }

    let boundaries = match download_boundaries(client, url, geo).await {
        Ok(b) => b,
        Err(e) => {
            warn!("[Geo] ⚠️  Could not load districts: {:#}", e);
            return Vec::new();
        }
    };
    info!("[Geo] 🗺️  Downloaded {} district boundaries", boundaries.len());

    if !boundaries.is_empty() {
        if let Err(e) = write_cache(cache_path, &boundaries) {
            warn!("[Geo] ⚠️  Could not write boundary cache: {:#}", e);
        }
    }
    boundaries
}

async fn download_boundaries(
    client: &reqwest::Client,
    url: &str,
    geo: &GeographyReference,
) -> Result<Vec<DistrictBoundary>> {
    let data: Value = client
        .get(url)
        .send()
        .await
        .context("Failed to request district boundaries")?
        .error_for_status()
        .context("District boundary request returned an error status")?
        .json()
        .await
        .context("Failed to decode district boundary GeoJSON")?;
    Ok(parse_boundary_geojson(&data, geo))
}

/// Extracts one exterior ring per district feature. `MultiPolygon` features
/// contribute the exterior ring of their first polygon. Features whose name
/// does not resolve to a canonical district are dropped.
pub fn parse_boundary_geojson(data: &Value, geo: &GeographyReference) -> Vec<DistrictBoundary> {
    let Some(features) = data.get("features").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut result = Vec::with_capacity(features.len());
    let mut unknown: Vec<&str> = Vec::new();
    for feature in features {
        let props = feature.get("properties");
        let raw_name = props
            .and_then(|p| p.get("DISTRICT").or_else(|| p.get("district")))
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim();
        if raw_name.is_empty() {
            continue;
        }

        let Some(geometry) = feature.get("geometry") else {
            continue;
        };
        let coords = geometry.get("coordinates");
        let ring_value = match geometry.get("type").and_then(Value::as_str) {
            Some("Polygon") => coords.and_then(|c| c.get(0)),
            Some("MultiPolygon") => coords.and_then(|c| c.get(0)).and_then(|p| p.get(0)),
            _ => None,
        };
        let Some(ring) = ring_value.map(parse_ring).filter(|r| !r.is_empty()) else {
            continue;
        };

        let Some(district) = geo.canonical_district(raw_name) else {
            unknown.push(raw_name);
            continue;
        };
        result.push(DistrictBoundary {
            district: district.to_string(),
            ring,
        });
    }

    if !unknown.is_empty() {
        warn!(
            "[Geo] ⚠️  Dropped {} boundaries with unknown district names: {}",
            unknown.len(),
            unknown.join(", ")
        );
    }
    result
}

fn parse_ring(value: &Value) -> Vec<[f64; 2]> {
    value
        .as_array()
        .map(|vertices| {
            vertices
                .iter()
                .filter_map(|v| {
                    let lon = v.get(0)?.as_f64()?;
                    let lat = v.get(1)?.as_f64()?;
                    Some([lon, lat])
                })
                .collect()
        })
        .unwrap_or_default()
}

pub fn read_cache(path: &Path) -> Result<Vec<DistrictBoundary>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read boundary cache {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse boundary cache {}", path.display()))
}

pub fn write_cache(path: &Path, boundaries: &[DistrictBoundary]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create cache directory {}", parent.display()))?;
    }
    let json = serde_json::to_string(boundaries).context("Failed to serialize boundaries")?;
    fs::write(path, json)
        .with_context(|| format!("Failed to write boundary cache {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_geojson() -> Value {
        json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "properties": { "DISTRICT": "KAVREPALANCHOK" },
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[85.0, 27.0], [86.0, 27.0], [86.0, 28.0], [85.0, 28.0], [85.0, 27.0]]]
                    }
                },
                {
                    "properties": { "district": "kaski" },
                    "geometry": {
                        "type": "MultiPolygon",
                        "coordinates": [
                            [[[83.0, 28.0], [84.0, 28.0], [84.0, 29.0, 1200.0]]],
                            [[[90.0, 90.0], [91.0, 90.0], [91.0, 91.0]]]
                        ]
                    }
                },
                {
                    "properties": { "DISTRICT": "NEW TOWN" },
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]]]
                    }
                },
                { "properties": {}, "geometry": { "type": "Polygon", "coordinates": [[[0.0, 0.0]]] } },
                { "properties": { "DISTRICT": "Jumla" }, "geometry": { "type": "Point", "coordinates": [82.0, 29.0] } }
            ]
        })
    }

    #[test]
    fn test_parse_boundary_geojson() {
        let geo = GeographyReference::new();
        let boundaries = parse_boundary_geojson(&sample_geojson(), &geo);
        assert_eq!(boundaries.len(), 2);
        assert_eq!(boundaries[0].district, "Kavrepalanchowk");
        assert_eq!(boundaries[0].ring.len(), 5);
        assert_eq!(boundaries[1].district, "Kaski");
        assert_eq!(boundaries[1].ring, vec![[83.0, 28.0], [84.0, 28.0], [84.0, 29.0]]);
    }

    #[test]
    fn test_unknown_district_names_are_dropped() {
        let geo = GeographyReference::new();
        let data = json!({
            "features": [
                {
                    "properties": { "DISTRICT": "NEW TOWN" },
                    "geometry": { "type": "Polygon", "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]]] }
                },
                {
                    "properties": { "DISTRICT": "JUMLA" },
                    "geometry": { "type": "Polygon", "coordinates": [[[82.0, 29.0], [83.0, 29.0], [83.0, 30.0]]] }
                }
            ]
        });
        let boundaries = parse_boundary_geojson(&data, &geo);
        assert_eq!(boundaries.len(), 1);
        assert_eq!(boundaries[0].district, "Jumla");
        for b in &boundaries {
            assert_eq!(geo.canonical_district(&b.district), Some(b.district.as_str()));
        }
    }

    #[test]
    fn test_parse_without_features_is_empty() {
        let geo = GeographyReference::new();
        assert!(parse_boundary_geojson(&json!({"type": "Feature"}), &geo).is_empty());
    }

    #[test]
    fn test_cache_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("nepal_districts_cache.json");
        let boundaries = vec![DistrictBoundary {
            district: "Kathmandu".to_string(),
            ring: vec![[85.2, 27.6], [85.5, 27.6], [85.5, 27.8]],
        }];
        write_cache(&path, &boundaries).unwrap();
        assert_eq!(read_cache(&path).unwrap(), boundaries);
    }

    fn offline_client() -> reqwest::Client {
        reqwest::Client::builder()
            .no_proxy()
            .timeout(std::time::Duration::from_secs(5))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_load_prefers_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let boundaries = vec![DistrictBoundary {
            district: "Kaski".to_string(),
            ring: vec![[83.0, 28.0], [84.0, 28.0], [84.0, 29.0]],
        }];
        write_cache(&path, &boundaries).unwrap();

        let client = offline_client();
        let geo = GeographyReference::new();
        // The URL is never contacted when the cache is usable.
        let loaded =
            load_district_boundaries(&client, "http://127.0.0.1:9/unused", &path, &geo).await;
        assert_eq!(loaded, boundaries);
    }

    #[tokio::test]
    async fn test_load_failure_yields_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let client = offline_client();
        let geo = GeographyReference::new();
        let loaded =
            load_district_boundaries(&client, "http://127.0.0.1:9/unreachable", &path, &geo).await;
        assert!(loaded.is_empty());
        assert!(!path.exists());
    }
}
