//! Shared data types for the color enrichment service

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// ISO code → `#RRGGBB` color, one entry per requested country
pub type ColorMap = BTreeMap<String, String>;

/// A country from the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryEntry {
    /// Display name (e.g. "Canada")
    pub name: String,
    /// Uppercase ISO 3166-1 alpha-2 code (e.g. "CA")
    pub iso_code: String,
}

impl CountryEntry {
    /// Build an entry, normalizing the ISO code to uppercase
    pub fn new(name: impl Into<String>, iso_code: impl AsRef<str>) -> Self {
        Self {
            name: name.into(),
            iso_code: iso_code.as_ref().trim().to_uppercase(),
        }
    }
}

/// One ranked chart entry from the song feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    pub title: String,
    pub artist: String,
    /// Artwork image URL (empty if the feed had none)
    pub artwork: String,
    /// Audio preview URL, if the feed offered one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
}

/// The cached result of the last full pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRecord {
    pub colors: ColorMap,
    /// When the colors were computed, milliseconds since the Unix epoch
    pub computed_at_epoch_millis: i64,
}
