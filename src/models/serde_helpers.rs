// src/models/serde_helpers.rs
//! Output files carry unknown geography as `""` rather than `null`; these
//! adapters keep `Option` on the Rust side.

use serde::{Deserialize, Deserializer, Serializer};

use super::record::Province;

pub mod province_or_empty {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Option<Province>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(value.map(Province::as_str).unwrap_or(""))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Province>, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        Ok(raw.as_deref().and_then(Province::from_name))
    }
}

pub mod string_or_empty {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(value.as_deref().unwrap_or(""))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        Ok(raw
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()))
    }
}
