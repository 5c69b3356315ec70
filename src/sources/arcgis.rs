// src/sources/arcgis.rs
//! Government ArcGIS FeatureServer layer of health facilities. Rows carry
//! only a facility type and place names, so display names are synthesized.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use crate::geography::GeographyReference;
use crate::models::record::{ArcgisRecord, FacilityRecord, Source};
use crate::utils::progress_bars::logging::SourceLogger;

pub const ARCGIS_QUERY_URL: &str = "https://services7.arcgis.com/arZnhQhtvIXpgVPD/ArcGIS/rest/services/Access_to_Health_Facilities_in_Nepal_WFL1/FeatureServer/2/query";

/// Substrings of `HF_TYPE` that mark a hospital-level facility.
pub const HOSPITAL_LEVEL_KEYWORDS: [&str; 10] = [
    "Hospital",
    "Zonal",
    "District",
    "Regional",
    "Sub Regional",
    "Provincial",
    "Central",
    "Teaching",
    "DPHO",
    "Primary Health",
];

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ArcgisAttributes {
    #[serde(rename = "HF_TYPE", default)]
    pub hf_type: Option<String>,
    #[serde(rename = "DIST_NAME", default)]
    pub dist_name: Option<String>,
    #[serde(rename = "VDC_NAME1", default)]
    pub vdc_name: Option<String>,
    /// Arrives as an integer, a float or a numeric string depending on the layer.
    #[serde(rename = "ProvNum", default)]
    pub prov_num: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    features: Vec<QueryFeature>,
    #[serde(rename = "exceededTransferLimit", default)]
    exceeded_transfer_limit: bool,
    #[serde(default)]
    error: Option<QueryError>,
}

/// One decoded query page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPage {
    pub rows: Vec<ArcgisAttributes>,
    /// Set by the server when it capped the page below the requested count.
    pub exceeded_transfer_limit: bool,
}

#[derive(Debug, Deserialize)]
struct QueryFeature {
    #[serde(default)]
    attributes: ArcgisAttributes,
}

#[derive(Debug, Deserialize)]
struct QueryError {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

pub fn is_hospital_level(hf_type: &str) -> bool {
    HOSPITAL_LEVEL_KEYWORDS.iter().any(|k| hf_type.contains(k))
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn province_number_text(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

fn synthesize_address(vdc: Option<&str>, dist: Option<&str>) -> String {
    match (vdc, dist) {
        (Some(v), Some(d)) => format!("{}, {}, Nepal", v, d),
        (Some(v), None) => format!("{}, Nepal", v),
        (None, Some(d)) => format!("{}, Nepal", d),
        (None, None) => String::new(),
    }
}

fn synthesize_name(hf_type: &str, vdc: Option<&str>, dist: Option<&str>) -> String {
    match (vdc, dist) {
        (Some(v), Some(d)) => format!("{} - {}, {}", hf_type, v, d),
        (None, Some(d)) => format!("{} - {}", hf_type, d),
        (Some(v), None) => format!("{} - {}", hf_type, v),
        (None, None) => hf_type.to_string(),
    }
}

/// Rows without a facility type are dropped. Identical
/// (district, address, type) triples repeat across pages; the first is kept.
pub fn normalize_arcgis(rows: &[ArcgisAttributes], geo: &GeographyReference) -> Vec<ArcgisRecord> {
    let mut seen: HashSet<(Option<String>, String, String)> = HashSet::new();
    let mut records = Vec::new();

    for row in rows {
        let Some(hf_type) = non_empty(&row.hf_type) else {
            continue;
        };
        let dist = non_empty(&row.dist_name);
        let vdc = non_empty(&row.vdc_name);

        let district = dist.and_then(|d| geo.canonical_district(d)).map(String::from);
        let province = row
            .prov_num
            .as_ref()
            .and_then(province_number_text)
            .and_then(|n| geo.province_for_number(&n))
            .or_else(|| dist.and_then(|d| geo.province_for_district(d)));
        let address = synthesize_address(vdc, dist);

        if !seen.insert((district.clone(), address.clone(), hf_type.to_string())) {
            continue;
        }

        records.push(ArcgisRecord {
            record: FacilityRecord {
                province,
                district,
                address,
                hospital_type: Some(hf_type.to_string()),
                ..FacilityRecord::new(synthesize_name(hf_type, vdc, dist), Source::Arcgis)
            },
            is_hospital_level: is_hospital_level(hf_type),
        });
    }
    records
}

/// Decodes one query response body, turning an in-band error payload into
/// an `Err`.
pub fn parse_query_page(body: &str) -> Result<QueryPage> {
    let response: QueryResponse =
        serde_json::from_str(body).context("ArcGIS response is not valid JSON")?;
    if let Some(error) = response.error {
        bail!(
            "ArcGIS query error {}: {}",
            error.code.unwrap_or_default(),
            error.message.unwrap_or_else(|| "no message".to_string())
        );
    }
    Ok(QueryPage {
        rows: response.features.into_iter().map(|f| f.attributes).collect(),
        exceeded_transfer_limit: response.exceeded_transfer_limit,
    })
}

async fn fetch_page(client: &reqwest::Client, offset: usize, page_size: usize) -> Result<QueryPage> {
    let offset = offset.to_string();
    let count = page_size.to_string();
    let body = client
        .get(ARCGIS_QUERY_URL)
        .query(&[
            ("where", "1=1"),
            ("outFields", "HF_TYPE,DIST_NAME,VDC_NAME1,ProvNum"),
            ("returnGeometry", "false"),
            ("resultOffset", offset.as_str()),
            ("resultRecordCount", count.as_str()),
            ("f", "json"),
        ])
        .send()
        .await
        .with_context(|| format!("ArcGIS request at offset {} failed", offset))?
        .error_for_status()
        .context("ArcGIS returned an error status")?
        .text()
        .await
        .context("Failed to read ArcGIS response body")?;
    parse_query_page(&body)
}

/// Pages through the whole layer.
pub async fn fetch_arcgis(
    client: &reqwest::Client,
    page_size: usize,
    page_delay: Duration,
    logger: &SourceLogger,
) -> Result<Vec<ArcgisAttributes>> {
    paginate(page_size, page_delay, logger, |offset, count| {
        fetch_page(client, offset, count)
    })
    .await
}

/// Drives `fetch(offset, count)` until a page comes back empty, or short
/// without the server's transfer-limit flag. A failing first page is an
/// error; a later failure keeps the rows read so far.
pub async fn paginate<F, Fut>(
    page_size: usize,
    page_delay: Duration,
    logger: &SourceLogger,
    mut fetch: F,
) -> Result<Vec<ArcgisAttributes>>
where
    F: FnMut(usize, usize) -> Fut,
    Fut: Future<Output = Result<QueryPage>>,
{
    let page_size = page_size.max(1);
    let mut rows = Vec::new();
    let mut page = 0usize;

    loop {
        let batch = match fetch(rows.len(), page_size).await {
            Ok(batch) => batch,
            Err(e) if page == 0 => return Err(e),
            Err(e) => {
                logger.log_warning(&format!(
                    "Stopping pagination after {} rows: {:#}",
                    rows.len(),
                    e
                ));
                break;
            }
        };
        page += 1;
        let batch_len = batch.rows.len();
        rows.extend(batch.rows);
        logger.log_page(page, batch_len, rows.len());

        if batch_len == 0 || (batch_len < page_size && !batch.exceeded_transfer_limit) {
            break;
        }
        tokio::time::sleep(page_delay).await;
    }
    Ok(rows)
}

pub async fn collect_arcgis(
    client: &reqwest::Client,
    geo: &GeographyReference,
    page_size: usize,
    page_delay: Duration,
) -> Result<Vec<ArcgisRecord>> {
    let logger = SourceLogger::new(Source::Arcgis);
    logger.log_start(ARCGIS_QUERY_URL);

    let rows = fetch_arcgis(client, page_size, page_delay, &logger).await?;
    logger.log_extracted(rows.len(), "attribute row");

    let records = normalize_arcgis(&rows, geo);
    let hospital_level = records.iter().filter(|r| r.is_hospital_level).count();
    logger.log_debug(&format!(
        "{} hospital-level, {} lower tier",
        hospital_level,
        records.len() - hospital_level
    ));
    logger.log_normalized(rows.len(), records.len());
    logger.log_completion(records.len());
    Ok(records)
}
