pub mod record;
pub mod serde_helpers;
pub mod stats_models;
