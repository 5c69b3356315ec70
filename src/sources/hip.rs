// src/sources/hip.rs
//! Health Information Portal directory: named hospitals grouped under
//! province section headings, each card carrying an image and address text.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use url::Url;

use super::html::{attribute, inner_text, strip_non_content, text_fragments};
use crate::geography::GeographyReference;
use crate::models::record::{FacilityRecord, Province, Source};
use crate::utils::http::fetch_text;
use crate::utils::progress_bars::logging::SourceLogger;

pub const HIP_URL: &str = "https://www.hip.sbkmtrust.org.np/?page_id=78";

/// Either a section heading (`h2`/`h3`, group 1) or a whole anchor element
/// (attributes in group 2, body in group 3).
static ELEMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(?:h2|h3)\b([^>]*)>|<a\b([^>]*)>(.*?)</a\s*>").unwrap());
static IMG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<img\b([^>]*)>").unwrap());
static NAME_RES: Lazy<[Regex; 3]> = Lazy::new(|| {
    [
        Regex::new(r"(?is)<h4\b[^>]*>(.*?)</h4\s*>").unwrap(),
        Regex::new(r"(?is)<h3\b[^>]*>(.*?)</h3\s*>").unwrap(),
        Regex::new(r"(?is)<h2\b[^>]*>(.*?)</h2\s*>").unwrap(),
    ]
});

/// One directory card as extracted from the page.
#[derive(Debug, Clone, PartialEq)]
pub struct HipEntry {
    pub name: String,
    pub address: String,
    /// Province of the section the card appeared under, if any.
    pub section: Option<Province>,
    pub image_url: Option<String>,
}

/// Walks the page in document order, tracking the active province section.
pub fn extract_hip_entries(html: &str, base_url: &Url) -> Vec<HipEntry> {
    let html = strip_non_content(html);
    let mut entries = Vec::new();
    let mut current_section: Option<Province> = None;

    for caps in ELEMENT_RE.captures_iter(&html) {
        if let Some(heading_attrs) = caps.get(1) {
            if let Some(province) = attribute(heading_attrs.as_str(), "id")
                .as_deref()
                .and_then(Province::from_section_anchor)
            {
                current_section = Some(province);
            }
            continue;
        }

        let anchor_attrs = caps.get(2).map_or("", |m| m.as_str());
        let is_directory_card = attribute(anchor_attrs, "href")
            .map_or(false, |href| href.contains("directory="));
        if !is_directory_card {
            continue;
        }
        let body = caps.get(3).map_or("", |m| m.as_str());

        let Some(name_match) = NAME_RES.iter().find_map(|re| re.find(body)) else {
            continue;
        };
        let name = inner_text(name_match.as_str()).replace('\u{a0}', " ");
        if name.is_empty() {
            continue;
        }

        let image_url = IMG_RE
            .captures(body)
            .and_then(|c| attribute(&c[1], "src"))
            .and_then(|src| base_url.join(src.trim()).ok())
            .map(String::from);

        let rest = format!("{}{}", &body[..name_match.start()], &body[name_match.end()..]);
        let address = text_fragments(&rest)
            .into_iter()
            .map(|t| t.replace('\u{a0}', " "))
            .filter(|t| *t != name && !t.starts_with("http"))
            .collect::<Vec<_>>()
            .join(" ");

        entries.push(HipEntry {
            name,
            address,
            section: current_section,
            image_url,
        });
    }
    entries
}

/// Repeated names are dropped, first card wins. The district comes from the
/// address text, preferring districts of the active section; a match outside
/// that section also corrects the province.
pub fn normalize_hip(entries: &[HipEntry], geo: &GeographyReference) -> Vec<FacilityRecord> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut records = Vec::with_capacity(entries.len());

    for entry in entries {
        let name = entry.name.replace('\u{a0}', " ").trim().to_string();
        if name.is_empty() || !seen.insert(name.clone()) {
            continue;
        }
        let address = entry.address.trim().to_string();

        let mut province = entry.section;
        let mut district = None;
        if let Some(m) = geo.find_district_in_text(&address, entry.section) {
            district = Some(m.district.to_string());
            province = Some(m.province);
        }

        records.push(FacilityRecord {
            province,
            district,
            address,
            image_url: entry.image_url.clone(),
            ..FacilityRecord::new(name, Source::Hip)
        });
    }
    records
}

pub async fn collect_hip(
    client: &reqwest::Client,
    geo: &GeographyReference,
) -> Result<Vec<FacilityRecord>> {
    let logger = SourceLogger::new(Source::Hip);
    logger.log_start(HIP_URL);

    let html = fetch_text(client, HIP_URL).await?;
    let base = Url::parse(HIP_URL).context("Invalid HIP base URL")?;

    logger.log_phase("Extracting", Some("scanning directory cards"));
    let entries = extract_hip_entries(&html, &base);
    logger.log_extracted(entries.len(), "directory card");
    if entries.is_empty() {
        logger.log_warning("No directory cards found; page layout may have changed");
    }

    let records = normalize_hip(&entries, geo);
    logger.log_normalized(entries.len(), records.len());
    logger.log_completion(records.len());
    Ok(records)
}
