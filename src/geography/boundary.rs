// src/geography/boundary.rs
use serde::{Deserialize, Serialize};

use super::reference::GeographyReference;
use crate::models::record::Province;

/// Exterior ring of one district, vertices as `[longitude, latitude]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistrictBoundary {
    pub district: String,
    pub ring: Vec<[f64; 2]>,
}

/// Crossing-number test. The ring may be closed or left implicitly closed;
/// points exactly on an edge have no defined classification.
pub fn point_in_ring(lon: f64, lat: f64, ring: &[[f64; 2]]) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let [xi, yi] = ring[i];
        let [xj, yj] = ring[j];
        if (yi > lat) != (yj > lat) && lon < (xj - xi) * (lat - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// First boundary, in table order, whose ring contains the point, reported
/// under its canonical name.
///
/// Boundaries the reference table does not know (an old cache, say) never
/// match. No match yields `(None, None)`.
pub fn district_for_point(
    lon: f64,
    lat: f64,
    boundaries: &[DistrictBoundary],
    geo: &GeographyReference,
) -> (Option<String>, Option<Province>) {
    boundaries
        .iter()
        .filter(|b| point_in_ring(lon, lat, &b.ring))
        .find_map(|b| {
            let district = geo.canonical_district(&b.district)?;
            Some((Some(district.to_string()), geo.province_for_district(district)))
        })
        .unwrap_or((None, None))
}
