// src/utils/config.rs
use log::{debug, info, warn};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime settings for one aggregation run, read from the environment.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub output_dir: PathBuf,
    pub boundary_cache_file: PathBuf,
    /// Per-request timeout for every HTTP call
    pub http_timeout_secs: u64,
    /// Upper bound on one source's whole fetch, pagination included
    pub source_timeout_secs: u64,
    pub arcgis_page_size: usize,
    pub arcgis_page_delay_ms: u64,
    /// The NSSD certificate is known to lapse, so verification defaults off
    pub nssd_verify_ssl: bool,
    pub hdx_save_raw: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let output_dir = PathBuf::from("output");
        Self {
            boundary_cache_file: output_dir.join("nepal_districts_cache.json"),
            output_dir,
            http_timeout_secs: 60,
            source_timeout_secs: 300,
            arcgis_page_size: 2000,
            arcgis_page_delay_ms: 300,
            nssd_verify_ssl: false,
            hdx_save_raw: true,
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring unparseable {}={:?}, using default", key, raw);
            default
        }),
        Err(_) => default,
    }
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let output_dir = env::var("OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.output_dir);
        let boundary_cache_file = env::var("BOUNDARY_CACHE_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| output_dir.join("nepal_districts_cache.json"));

        let config = Self {
            output_dir,
            boundary_cache_file,
            http_timeout_secs: env_or("HTTP_TIMEOUT_SECS", defaults.http_timeout_secs),
            source_timeout_secs: env_or("SOURCE_TIMEOUT_SECS", defaults.source_timeout_secs),
            arcgis_page_size: env_or("ARCGIS_PAGE_SIZE", defaults.arcgis_page_size).max(1),
            arcgis_page_delay_ms: env_or("ARCGIS_PAGE_DELAY_MS", defaults.arcgis_page_delay_ms),
            nssd_verify_ssl: env_or("NSSD_VERIFY_SSL", defaults.nssd_verify_ssl),
            hdx_save_raw: env_or("HDX_SAVE_RAW", defaults.hdx_save_raw),
        };
        debug!("Pipeline config: {:?}", config);
        config
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs)
    }

    pub fn arcgis_page_delay(&self) -> Duration {
        Duration::from_millis(self.arcgis_page_delay_ms)
    }

    pub fn log_config(&self) {
        info!("⚙️  Output directory: {}", self.output_dir.display());
        info!("   Boundary cache: {}", self.boundary_cache_file.display());
        info!(
            "   Timeouts: {}s per request, {}s per source",
            self.http_timeout_secs, self.source_timeout_secs
        );
        info!(
            "   ArcGIS paging: {} rows per page, {} ms between pages",
            self.arcgis_page_size, self.arcgis_page_delay_ms
        );
        if !self.nssd_verify_ssl {
            info!("   NSSD TLS certificate verification DISABLED");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.output_dir, PathBuf::from("output"));
        assert_eq!(
            config.boundary_cache_file,
            PathBuf::from("output").join("nepal_districts_cache.json")
        );
        assert_eq!(config.arcgis_page_size, 2000);
        assert_eq!(config.arcgis_page_delay(), Duration::from_millis(300));
        assert_eq!(config.http_timeout(), Duration::from_secs(60));
        assert!(!config.nssd_verify_ssl);
        assert!(config.hdx_save_raw);
    }

    #[test]
    fn test_env_config() {
        env::set_var("OUTPUT_DIR", "/tmp/facilities");
        env::set_var("ARCGIS_PAGE_SIZE", "500");
        env::set_var("ARCGIS_PAGE_DELAY_MS", "not-a-number");
        env::set_var("NSSD_VERIFY_SSL", "true");
        env::set_var("SOURCE_TIMEOUT_SECS", "45");

        let config = PipelineConfig::from_env();
        assert_eq!(config.output_dir, PathBuf::from("/tmp/facilities"));
        assert_eq!(
            config.boundary_cache_file,
            PathBuf::from("/tmp/facilities/nepal_districts_cache.json")
        );
        assert_eq!(config.arcgis_page_size, 500);
        assert_eq!(config.arcgis_page_delay_ms, 300);
        assert!(config.nssd_verify_ssl);
        assert_eq!(config.source_timeout(), Duration::from_secs(45));

        // Clean up
        env::remove_var("OUTPUT_DIR");
        env::remove_var("ARCGIS_PAGE_SIZE");
        env::remove_var("ARCGIS_PAGE_DELAY_MS");
        env::remove_var("NSSD_VERIFY_SSL");
        env::remove_var("SOURCE_TIMEOUT_SECS");
    }
}
