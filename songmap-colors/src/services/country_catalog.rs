//! Country catalog sources
//!
//! A catalog yields the `(name, ISO code)` pairs the pipeline colors. Codes
//! are uppercased and entries without a usable code are dropped before they
//! reach the pipeline.

use crate::types::CountryEntry;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Catalog enumeration errors
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Catalog I/O error ({path}): {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Catalog parse error: {0}")]
    Parse(String),

    #[error("Catalog unavailable: {0}")]
    Unavailable(String),
}

/// Source of the countries to color
#[async_trait]
pub trait CountryCatalog: Send + Sync {
    async fn list_countries(&self) -> Result<Vec<CountryEntry>, CatalogError>;
}

/// Codes the geographic datasets use for "no ISO code assigned"
fn is_sentinel_code(code: &str) -> bool {
    matches!(code, "" | "-" | "-99")
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    properties: FeatureProperties,
}

#[derive(Debug, Deserialize)]
struct FeatureProperties {
    #[serde(rename = "ADMIN")]
    admin: Option<String>,
    #[serde(rename = "ISO_A2")]
    iso_a2: Option<String>,
}

/// Catalog read from a GeoJSON FeatureCollection
///
/// Country name comes from `properties.ADMIN`, code from
/// `properties.ISO_A2`. When two features share a name the later one wins.
#[derive(Debug, Clone)]
pub struct GeoJsonCatalog {
    path: PathBuf,
}

impl GeoJsonCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse catalog entries from GeoJSON text
    pub fn parse(geojson: &str) -> Result<Vec<CountryEntry>, CatalogError> {
        let collection: FeatureCollection =
            serde_json::from_str(geojson).map_err(|e| CatalogError::Parse(e.to_string()))?;

        let total_features = collection.features.len();
        let mut by_name: BTreeMap<String, String> = BTreeMap::new();

        for feature in collection.features {
            let FeatureProperties { admin, iso_a2 } = feature.properties;
            let (Some(name), Some(code)) = (admin, iso_a2) else {
                continue;
            };
            let code = code.trim();
            if is_sentinel_code(code) {
                continue;
            }
            by_name.insert(name, code.to_string());
        }

        debug!(
            features = total_features,
            countries = by_name.len(),
            "Parsed GeoJSON country catalog"
        );

        Ok(by_name
            .into_iter()
            .map(|(name, code)| CountryEntry::new(name, code))
            .collect())
    }
}

#[async_trait]
impl CountryCatalog for GeoJsonCatalog {
    async fn list_countries(&self) -> Result<Vec<CountryEntry>, CatalogError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| CatalogError::Io {
                path: self.path.clone(),
                source,
            })?;

        let entries = Self::parse(&content)?;
        info!(
            path = %self.path.display(),
            countries = entries.len(),
            "Loaded country catalog"
        );
        Ok(entries)
    }
}

/// Built-in country table, used when no GeoJSON dataset is configured
const BUILTIN_COUNTRIES: &[(&str, &str)] = &[
    ("Argentina", "AR"),
    ("Australia", "AU"),
    ("Austria", "AT"),
    ("Belgium", "BE"),
    ("Brazil", "BR"),
    ("Canada", "CA"),
    ("Chile", "CL"),
    ("Colombia", "CO"),
    ("Czechia", "CZ"),
    ("Denmark", "DK"),
    ("Egypt", "EG"),
    ("Finland", "FI"),
    ("France", "FR"),
    ("Germany", "DE"),
    ("Greece", "GR"),
    ("Hungary", "HU"),
    ("India", "IN"),
    ("Indonesia", "ID"),
    ("Ireland", "IE"),
    ("Israel", "IL"),
    ("Italy", "IT"),
    ("Japan", "JP"),
    ("Kenya", "KE"),
    ("Mexico", "MX"),
    ("Netherlands", "NL"),
    ("New Zealand", "NZ"),
    ("Nigeria", "NG"),
    ("Norway", "NO"),
    ("Peru", "PE"),
    ("Philippines", "PH"),
    ("Poland", "PL"),
    ("Portugal", "PT"),
    ("Romania", "RO"),
    ("Saudi Arabia", "SA"),
    ("South Africa", "ZA"),
    ("South Korea", "KR"),
    ("Spain", "ES"),
    ("Sweden", "SE"),
    ("Switzerland", "CH"),
    ("Thailand", "TH"),
    ("Turkey", "TR"),
    ("Ukraine", "UA"),
    ("United Kingdom", "GB"),
    ("United States", "US"),
    ("Vietnam", "VN"),
];

/// Catalog over a fixed list of entries
#[derive(Debug, Clone)]
pub struct StaticCatalog {
    entries: Vec<CountryEntry>,
}

impl StaticCatalog {
    /// The built-in country table
    pub fn builtin() -> Self {
        Self::from_pairs(BUILTIN_COUNTRIES.iter().copied())
    }

    /// Build from `(name, code)` pairs, applying the usual code filtering
    pub fn from_pairs<N, C>(pairs: impl IntoIterator<Item = (N, C)>) -> Self
    where
        N: Into<String>,
        C: AsRef<str>,
    {
        let entries = pairs
            .into_iter()
            .filter(|(_, code)| !is_sentinel_code(code.as_ref().trim()))
            .map(|(name, code)| CountryEntry::new(name, code))
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CountryCatalog for StaticCatalog {
    async fn list_countries(&self) -> Result<Vec<CountryEntry>, CatalogError> {
        Ok(self.entries.clone())
    }
}
