// src/sources/nssd.rs
//! NSSD province-wise hospital list. The page is a flat run of headings,
//! paragraphs and list items; the province is whatever heading came last.

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;

use super::html::{inner_text, strip_non_content};
use crate::models::record::{FacilityRecord, Province, Source};
use crate::utils::http::fetch_text;
use crate::utils::progress_bars::logging::SourceLogger;
use crate::utils::text::collapse_whitespace;

pub const NSSD_URL: &str = "https://nssd.dohs.gov.np/province.html";

/// Elements scanned on the page, with whether each counts as a heading.
const SCANNED_TAGS: [(&str, bool); 6] = [
    ("strong", true),
    ("h2", true),
    ("h3", true),
    ("h4", true),
    ("p", false),
    ("li", false),
];

static TAG_RES: Lazy<Vec<(Regex, bool)>> = Lazy::new(|| {
    SCANNED_TAGS
        .iter()
        .map(|&(tag, is_heading)| {
            let re = Regex::new(&format!(r"(?is)<{tag}\b[^>]*>(.*?)</{tag}\s*>")).unwrap();
            (re, is_heading)
        })
        .collect()
});
static NUMBERING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\d.]+\s*").unwrap());

#[derive(Debug, Clone, PartialEq)]
pub struct NssdItem {
    pub text: String,
    pub is_heading: bool,
}

impl NssdItem {
    pub fn new(text: impl Into<String>, is_heading: bool) -> Self {
        Self {
            text: text.into(),
            is_heading,
        }
    }
}

/// Text of every scanned element in document order. Nested elements each
/// produce an item, so `<li><strong>X</strong></li>` yields `X` twice.
pub fn extract_nssd_items(html: &str) -> Vec<NssdItem> {
    let html = strip_non_content(html);
    let mut positioned: Vec<(usize, NssdItem)> = Vec::new();
    for (re, is_heading) in TAG_RES.iter() {
        for caps in re.captures_iter(&html) {
            let (Some(whole), Some(body)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let text = collapse_whitespace(&inner_text(body.as_str()).replace('\u{a0}', " "));
            if !text.is_empty() {
                positioned.push((whole.start(), NssdItem::new(text, *is_heading)));
            }
        }
    }
    positioned.sort_by_key(|(start, _)| *start);
    positioned.into_iter().map(|(_, item)| item).collect()
}

/// Drops a leading list number such as `"3. "` or `"12.4 "`.
pub fn strip_numbering(text: &str) -> &str {
    match NUMBERING_RE.find(text) {
        Some(m) => &text[m.end()..],
        None => text,
    }
}

pub fn is_nssd_hospital_name(text: &str) -> bool {
    let text = text.trim();
    if text.chars().count() <= 3 || Province::is_heading_keyword(text) {
        return false;
    }
    let name = strip_numbering(text);
    let len = name.chars().count();
    len > 5 && len < 150 && name.to_uppercase().contains("HOSPITAL")
}

pub fn normalize_nssd(items: &[NssdItem]) -> Vec<FacilityRecord> {
    let mut current: Option<Province> = None;
    let mut records = Vec::new();

    for item in items {
        let text = item.text.trim();
        if let Some(province) = Province::from_heading(text) {
            current = Some(province);
            if item.is_heading {
                continue;
            }
        }
        let Some(province) = current else {
            continue;
        };
        if !is_nssd_hospital_name(text) {
            continue;
        }
        records.push(FacilityRecord {
            province: Some(province),
            ..FacilityRecord::new(strip_numbering(text).trim(), Source::Nssd)
        });
    }
    records
}

pub async fn collect_nssd(client: &reqwest::Client) -> Result<Vec<FacilityRecord>> {
    let logger = SourceLogger::new(Source::Nssd);
    logger.log_start(NSSD_URL);

    let html = fetch_text(client, NSSD_URL).await?;
    let items = extract_nssd_items(&html);
    let headings = items.iter().filter(|i| i.is_heading).count();
    logger.log_extracted(items.len(), "text");
    logger.log_debug(&format!("{} of them heading elements", headings));

    let records = normalize_nssd(&items);
    if records.is_empty() {
        logger.log_warning("No hospital names recognised under any province heading");
    }
    logger.log_normalized(items.len(), records.len());
    logger.log_completion(records.len());
    Ok(records)
}
