pub mod export;
pub mod geography;
pub mod models;
pub mod reconcile;
pub mod sources;
pub mod utils;

pub use models::record::{ArcgisRecord, FacilityRecord, Province, SlimRecord, Source};
pub use reconcile::{dedup_key, reconcile};
