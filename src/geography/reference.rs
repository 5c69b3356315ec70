// src/geography/reference.rs
//! Hand-curated district and province tables for Nepal.
//!
//! Every spelling the four sources use for a district resolves to one
//! canonical name. City names that some sources put in place of the district
//! resolve to the district containing the city.

use std::collections::HashMap;

use crate::models::record::Province;

const DISTRICTS: [(&str, Province); 76] = [
    ("Jhapa", Province::Koshi),
    ("Ilam", Province::Koshi),
    ("Panchthar", Province::Koshi),
    ("Taplejung", Province::Koshi),
    ("Tehrathum", Province::Koshi),
    ("Sankhuwasabha", Province::Koshi),
    ("Bhojpur", Province::Koshi),
    ("Dhankuta", Province::Koshi),
    ("Morang", Province::Koshi),
    ("Sunsari", Province::Koshi),
    ("Udayapur", Province::Koshi),
    ("Khotang", Province::Koshi),
    ("Solukhumbu", Province::Koshi),
    ("Okhaldhunga", Province::Koshi),
    ("Saptari", Province::Madhesh),
    ("Siraha", Province::Madhesh),
    ("Dhanusha", Province::Madhesh),
    ("Mahottari", Province::Madhesh),
    ("Sarlahi", Province::Madhesh),
    ("Rautahat", Province::Madhesh),
    ("Bara", Province::Madhesh),
    ("Parsa", Province::Madhesh),
    ("Sindhuli", Province::Bagmati),
    ("Ramechhap", Province::Bagmati),
    ("Dolakha", Province::Bagmati),
    ("Kavrepalanchowk", Province::Bagmati),
    ("Sindhupalchowk", Province::Bagmati),
    ("Bhaktapur", Province::Bagmati),
    ("Kathmandu", Province::Bagmati),
    ("Lalitpur", Province::Bagmati),
    ("Makwanpur", Province::Bagmati),
    ("Chitwan", Province::Bagmati),
    ("Dhading", Province::Bagmati),
    ("Nuwakot", Province::Bagmati),
    ("Rasuwa", Province::Bagmati),
    ("Gorkha", Province::Gandaki),
    ("Manang", Province::Gandaki),
    ("Mustang", Province::Gandaki),
    ("Lamjung", Province::Gandaki),
    ("Kaski", Province::Gandaki),
    ("Myagdi", Province::Gandaki),
    ("Syangja", Province::Gandaki),
    ("Tanahu", Province::Gandaki),
    ("Baglung", Province::Gandaki),
    ("Parbat", Province::Gandaki),
    ("Nawalpur", Province::Gandaki),
    ("Rupandehi", Province::Lumbini),
    ("Palpa", Province::Lumbini),
    ("Kapilbastu", Province::Lumbini),
    ("Arghakhachi", Province::Lumbini),
    ("Gulmi", Province::Lumbini),
    ("Pyuthan", Province::Lumbini),
    ("Dang", Province::Lumbini),
    ("Rolpa", Province::Lumbini),
    ("Banke", Province::Lumbini),
    ("Bardiya", Province::Lumbini),
    ("Nawalparasi", Province::Lumbini),
    ("Rukum", Province::Lumbini),
    ("Salyan", Province::Karnali),
    ("Dolpa", Province::Karnali),
    ("Jajarkot", Province::Karnali),
    ("Surkhet", Province::Karnali),
    ("Dailekh", Province::Karnali),
    ("Kalikot", Province::Karnali),
    ("Jumla", Province::Karnali),
    ("Mugu", Province::Karnali),
    ("Humla", Province::Karnali),
    ("Kailali", Province::Sudurpashchim),
    ("Kanchanpur", Province::Sudurpashchim),
    ("Doti", Province::Sudurpashchim),
    ("Achham", Province::Sudurpashchim),
    ("Bajura", Province::Sudurpashchim),
    ("Dadeldhura", Province::Sudurpashchim),
    ("Bajhang", Province::Sudurpashchim),
    ("Baitadi", Province::Sudurpashchim),
    ("Darchula", Province::Sudurpashchim),
];

/// Spelling variants seen in the sources and in the boundary dataset.
const DISTRICT_ALIASES: [(&str, &str); 13] = [
    ("Illam", "Ilam"),
    ("Udaypur", "Udayapur"),
    ("Terhathum", "Tehrathum"),
    ("Dhanusa", "Dhanusha"),
    ("Kavre", "Kavrepalanchowk"),
    ("Kavrepalanchok", "Kavrepalanchowk"),
    ("Sindhupalchok", "Sindhupalchowk"),
    ("Makawanpur", "Makwanpur"),
    ("Chitawan", "Chitwan"),
    ("Tanahun", "Tanahu"),
    ("Kapilvastu", "Kapilbastu"),
    ("Arghakhanchi", "Arghakhachi"),
    ("Bardia", "Bardiya"),
];

/// Cities and municipalities used in place of a district name.
const CITY_DISTRICTS: [(&str, &str); 19] = [
    ("Biratnagar", "Morang"),
    ("Bhadrapur", "Jhapa"),
    ("Dharan", "Sunsari"),
    ("Janakpur", "Dhanusha"),
    ("Janakpurdham", "Dhanusha"),
    ("Birgunj", "Parsa"),
    ("Hetauda", "Makwanpur"),
    ("Dhulikhel", "Kavrepalanchowk"),
    ("Pokhara", "Kaski"),
    ("Nepalgunj", "Banke"),
    ("Butwal", "Rupandehi"),
    ("Bhairahawa", "Rupandehi"),
    ("Siddharthanagar", "Rupandehi"),
    ("Tulsipur", "Dang"),
    ("Gulariya", "Bardiya"),
    ("Birendranagar", "Surkhet"),
    ("Dhangadhi", "Kailali"),
    ("Mahendranagar", "Kanchanpur"),
    ("Bhimdatta", "Kanchanpur"),
];

#[derive(Debug, Clone)]
struct NameEntry {
    name: &'static str,
    lowered: String,
    district: &'static str,
    province: Province,
}

/// A district found inside free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DistrictMatch {
    pub district: &'static str,
    pub province: Province,
    /// The spelling that actually occurred in the text.
    pub matched: &'static str,
}

/// Read-only lookup tables, built once by the orchestrator and shared.
#[derive(Debug, Clone)]
pub struct GeographyReference {
    entries: Vec<NameEntry>,
    by_lowered: HashMap<String, usize>,
}

impl Default for GeographyReference {
    fn default() -> Self {
        Self::new()
    }
}

impl GeographyReference {
    pub fn new() -> Self {
        let province_of = |district: &str| {
            DISTRICTS
                .iter()
                .find(|(d, _)| *d == district)
                .map(|(_, p)| *p)
        };

        let mut entries: Vec<NameEntry> = DISTRICTS
            .iter()
            .map(|&(name, province)| NameEntry {
                name,
                lowered: name.to_lowercase(),
                district: name,
                province,
            })
            .collect();

        for &(name, district) in DISTRICT_ALIASES.iter().chain(CITY_DISTRICTS.iter()) {
            // Both tables only reference districts listed above.
            if let Some(province) = province_of(district) {
                entries.push(NameEntry {
                    name,
                    lowered: name.to_lowercase(),
                    district,
                    province,
                });
            }
        }

        let by_lowered = entries
            .iter()
            .enumerate()
            .map(|(idx, e)| (e.lowered.clone(), idx))
            .collect();

        Self {
            entries,
            by_lowered,
        }
    }

    /// Canonical district for a district name, a spelling variant or a city.
    /// Matching is case-insensitive, so both verbatim and title-cased inputs
    /// such as the upper-case names in the boundary dataset resolve.
    pub fn canonical_district(&self, name: &str) -> Option<&'static str> {
        self.entry_for(name).map(|e| e.district)
    }

    pub fn province_for_district(&self, name: &str) -> Option<Province> {
        self.entry_for(name).map(|e| e.province)
    }

    /// Province for a number that may arrive as `"3"`, `"3.0"` or `3`.
    /// Out-of-range and non-numeric input yields `None`.
    pub fn province_for_number(&self, raw: &str) -> Option<Province> {
        let value = raw.trim().parse::<f64>().ok()?;
        if !value.is_finite() {
            return None;
        }
        Province::from_number(value.trunc() as i64)
    }

    /// Searches `text` for any known district, variant or city name.
    ///
    /// Matches whose province equals `prefer` rank first. Within a rank the
    /// longest matched spelling wins and ties keep table order.
    pub fn find_district_in_text(
        &self,
        text: &str,
        prefer: Option<Province>,
    ) -> Option<DistrictMatch> {
        let lowered = text.to_lowercase();
        if lowered.trim().is_empty() {
            return None;
        }

        let mut best: Option<(&NameEntry, bool)> = None;
        for entry in &self.entries {
            if !lowered.contains(&entry.lowered) {
                continue;
            }
            let preferred = prefer == Some(entry.province);
            let better = match best {
                None => true,
                Some((current, current_preferred)) => {
                    (preferred && !current_preferred)
                        || (preferred == current_preferred
                            && entry.lowered.len() > current.lowered.len())
                }
            };
            if better {
                best = Some((entry, preferred));
            }
        }

        best.map(|(e, _)| DistrictMatch {
            district: e.district,
            province: e.province,
            matched: e.name,
        })
    }

    fn entry_for(&self, name: &str) -> Option<&NameEntry> {
        let key = name.trim().to_lowercase();
        if key.is_empty() {
            return None;
        }
        self.by_lowered.get(&key).map(|&idx| &self.entries[idx])
    }
}
