// src/models/record.rs
use serde::{Deserialize, Serialize};
use std::fmt;

use super::serde_helpers::{province_or_empty, string_or_empty};

/// The seven provinces of Nepal, numbered as in the federal constitution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Province {
    Koshi,
    Madhesh,
    Bagmati,
    Gandaki,
    Lumbini,
    Karnali,
    Sudurpashchim,
}

/// Upper-case keywords that mark a province heading on the NSSD listing.
const HEADING_KEYWORDS: [(&str, Province); 9] = [
    ("PROVINCE 1", Province::Koshi),
    ("MADHES", Province::Madhesh),
    ("MADHESH", Province::Madhesh),
    ("BAGMATI", Province::Bagmati),
    ("GANDAKI", Province::Gandaki),
    ("LUMBINI", Province::Lumbini),
    ("KARNALI", Province::Karnali),
    ("SUDURPASCHIM", Province::Sudurpashchim),
    ("SUDURPASHCHIM", Province::Sudurpashchim),
];

impl Province {
    pub const ALL: [Province; 7] = [
        Province::Koshi,
        Province::Madhesh,
        Province::Bagmati,
        Province::Gandaki,
        Province::Lumbini,
        Province::Karnali,
        Province::Sudurpashchim,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Province::Koshi => "Koshi",
            Province::Madhesh => "Madhesh",
            Province::Bagmati => "Bagmati",
            Province::Gandaki => "Gandaki",
            Province::Lumbini => "Lumbini",
            Province::Karnali => "Karnali",
            Province::Sudurpashchim => "Sudurpashchim",
        }
    }

    pub fn number(self) -> u8 {
        match self {
            Province::Koshi => 1,
            Province::Madhesh => 2,
            Province::Bagmati => 3,
            Province::Gandaki => 4,
            Province::Lumbini => 5,
            Province::Karnali => 6,
            Province::Sudurpashchim => 7,
        }
    }

    pub fn from_number(number: i64) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| i64::from(p.number()) == number)
    }

    /// Case-insensitive match against the canonical province names.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_str().eq_ignore_ascii_case(name))
    }

    /// Section anchors on the HIP directory page look like `bagmati-en`.
    pub fn from_section_anchor(anchor_id: &str) -> Option<Self> {
        let anchor = anchor_id.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|p| anchor == format!("{}-en", p.as_str().to_lowercase()))
    }

    /// Returns the province whose keyword appears in `text`, provided the text
    /// is short enough to be a heading rather than body copy.
    pub fn from_heading(text: &str) -> Option<Self> {
        let upper = text.trim().to_uppercase();
        if upper.chars().count() >= 50 {
            return None;
        }
        HEADING_KEYWORDS
            .iter()
            .find(|(keyword, _)| upper.contains(keyword))
            .map(|(_, province)| *province)
    }

    /// True when `text` is exactly one of the heading keywords.
    pub fn is_heading_keyword(text: &str) -> bool {
        let upper = text.trim().to_uppercase();
        HEADING_KEYWORDS.iter().any(|(keyword, _)| *keyword == upper)
    }
}

impl fmt::Display for Province {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provenance tag. Lower `priority()` wins when two sources share a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    #[serde(rename = "HIP")]
    Hip,
    #[serde(rename = "NSSD")]
    Nssd,
    #[serde(rename = "ArcGIS")]
    Arcgis,
    #[serde(rename = "HDX_OSM")]
    HdxOsm,
}

impl Source {
    pub const ALL: [Source; 4] = [Source::Hip, Source::Nssd, Source::Arcgis, Source::HdxOsm];

    pub fn priority(self) -> u8 {
        match self {
            Source::Hip => 0,
            Source::Nssd => 1,
            Source::Arcgis => 2,
            Source::HdxOsm => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Source::Hip => "HIP",
            Source::Nssd => "NSSD",
            Source::Arcgis => "ArcGIS",
            Source::HdxOsm => "HDX_OSM",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common schema every source is normalized into. Field order is the
/// serialization order of the JSON and CSV exports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityRecord {
    pub name: String,
    #[serde(default, with = "province_or_empty")]
    pub province: Option<Province>,
    #[serde(default, with = "string_or_empty")]
    pub district: Option<String>,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub hospital_type: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    pub source: Source,
}

impl FacilityRecord {
    pub fn new(name: impl Into<String>, source: Source) -> Self {
        Self {
            name: name.into(),
            province: None,
            district: None,
            address: String::new(),
            hospital_type: None,
            image_url: None,
            latitude: None,
            longitude: None,
            source,
        }
    }
}

/// ArcGIS rows keep their tier classification next to the record; the flag
/// never reaches the exported schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ArcgisRecord {
    pub record: FacilityRecord,
    pub is_hospital_level: bool,
}

/// Reduced projection for lightweight consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlimRecord {
    pub name: String,
    #[serde(default, with = "province_or_empty")]
    pub province: Option<Province>,
    #[serde(default, with = "string_or_empty")]
    pub district: Option<String>,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub hospital_type: Option<String>,
}

impl From<&FacilityRecord> for SlimRecord {
    fn from(record: &FacilityRecord) -> Self {
        Self {
            name: record.name.clone(),
            province: record.province,
            district: record.district.clone(),
            address: record.address.clone(),
            hospital_type: record.hospital_type.clone(),
        }
    }
}

/// Six decimal places, roughly 10 cm at Nepal's latitude.
pub fn round_coordinate(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}
