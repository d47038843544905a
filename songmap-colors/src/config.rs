//! Service settings resolution for songmap-colors
//!
//! **Priority:** command line → environment → TOML → compiled default
//!
//! The first two tiers arrive together in [`CliOverrides`] (clap reads the
//! `SONGMAP_*` variables for any flag not given); this module layers them
//! over the TOML file and the defaults, then validates the result.

use crate::services::itunes_client::ITUNES_BASE_URL;
use crate::services::pipeline::PipelineConfig;
use crate::services::result_cache::DEFAULT_TTL_HOURS;
use songmap_common::config::TomlConfig;
use songmap_common::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 5731;

/// Longest accepted cache lifetime (one year)
pub const MAX_CACHE_TTL_HOURS: u64 = 24 * 366;

/// Module name used for the config file (`songmap-colors.toml`)
pub const MODULE_NAME: &str = "songmap-colors";

/// Values supplied on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub port: Option<u16>,
    pub log_level: Option<String>,
    pub permits: Option<usize>,
    pub batch_size: Option<usize>,
    pub song_limit: Option<usize>,
    pub fetch_timeout_ms: Option<u64>,
    pub cache_ttl_hours: Option<u64>,
    pub feed_base_url: Option<String>,
    pub countries_geojson: Option<PathBuf>,
}

/// Fully resolved service settings
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceSettings {
    pub port: u16,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
    pub pipeline: PipelineConfig,
    pub cache_ttl_hours: u64,
    pub feed_base_url: String,
    /// GeoJSON dataset; the built-in table is used when unset
    pub countries_geojson: Option<PathBuf>,
}

impl ServiceSettings {
    /// Layer CLI/env overrides over the TOML file and defaults
    pub fn resolve(overrides: &CliOverrides, toml_config: &TomlConfig) -> Result<Self> {
        let defaults = PipelineConfig::default();
        let section = &toml_config.pipeline;

        let fetch_timeout_ms = overrides
            .fetch_timeout_ms
            .or(section.fetch_timeout_ms)
            .unwrap_or(defaults.fetch_timeout.as_millis() as u64);

        let pipeline = PipelineConfig {
            permits: overrides.permits.or(section.permits).unwrap_or(defaults.permits),
            batch_size: overrides
                .batch_size
                .or(section.batch_size)
                .unwrap_or(defaults.batch_size),
            song_limit: overrides
                .song_limit
                .or(section.song_limit)
                .unwrap_or(defaults.song_limit),
            fetch_timeout: Duration::from_millis(fetch_timeout_ms),
        };
        pipeline.validate()?;

        let cache_ttl_hours = overrides
            .cache_ttl_hours
            .or(section.cache_ttl_hours)
            .unwrap_or(DEFAULT_TTL_HOURS);
        if cache_ttl_hours == 0 || cache_ttl_hours > MAX_CACHE_TTL_HOURS {
            return Err(Error::Config(format!(
                "cache_ttl_hours must be in 1..={}, got {}",
                MAX_CACHE_TTL_HOURS, cache_ttl_hours
            )));
        }

        let feed_base_url = overrides
            .feed_base_url
            .clone()
            .or_else(|| toml_config.sources.feed_base_url.clone())
            .unwrap_or_else(|| ITUNES_BASE_URL.to_string());
        if !(feed_base_url.starts_with("http://") || feed_base_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "feed_base_url must be an http(s) URL, got {:?}",
                feed_base_url
            )));
        }

        Ok(Self {
            port: overrides.port.or(toml_config.port).unwrap_or(DEFAULT_PORT),
            log_level: overrides
                .log_level
                .clone()
                .unwrap_or_else(|| toml_config.logging.level.clone()),
            log_file: toml_config.logging.file.clone(),
            pipeline,
            cache_ttl_hours,
            feed_base_url,
            countries_geojson: overrides
                .countries_geojson
                .clone()
                .or_else(|| toml_config.sources.countries_geojson.clone()),
        })
    }
}
