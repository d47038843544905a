//! TTL-bounded cache of the last computed color map
//!
//! A single record is kept under two string keys in an injected
//! [`CacheStore`]: the JSON-serialized map and its epoch-millisecond
//! timestamp. A record older than the TTL is a miss, never partially
//! honored.
//!
//! Caching is an optimization only. Store failures are logged and reported
//! to callers as a miss (on read) or silently dropped (on write).

use crate::services::color_hasher::is_hex_color;
use crate::services::itunes_client::is_valid_country_code;
use crate::types::{CacheRecord, ColorMap};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Key holding the serialized color map
pub const COLORS_KEY: &str = "country_colors";

/// Key holding the epoch-millisecond timestamp of the map
pub const TIMESTAMP_KEY: &str = "country_colors_timestamp";

/// Default record lifetime
pub const DEFAULT_TTL_HOURS: u64 = 24;

/// Cache storage errors
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache read failed: {0}")]
    Read(String),

    #[error("Cache write failed: {0}")]
    Write(String),

    #[error("Cache record corrupt: {0}")]
    Corrupt(String),
}

/// Minimal string key-value storage backing the cache
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError>;

    async fn remove(&self, key: &str) -> Result<(), CacheError>;

    /// Write several keys; stores with transactions override this to make
    /// the update all-or-nothing
    async fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), CacheError> {
        for (key, value) in entries {
            self.set(key, value).await?;
        }
        Ok(())
    }
}

/// Process-local store, used in tests and when running without a database
#[derive(Debug, Default, Clone)]
pub struct MemoryCacheStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), CacheError> {
        let mut guard = self.entries.write().await;
        for (key, value) in entries {
            guard.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }
}

/// Every key an uppercase ISO code, every value `#RRGGBB`
fn validate_colors(colors: &ColorMap) -> Result<(), CacheError> {
    for (iso_code, color) in colors {
        if !is_valid_country_code(iso_code) || iso_code.to_uppercase() != *iso_code {
            return Err(CacheError::Corrupt(format!("ISO code {:?}", iso_code)));
        }
        if !is_hex_color(color) {
            return Err(CacheError::Corrupt(format!(
                "color {:?} for {}",
                color, iso_code
            )));
        }
    }
    Ok(())
}

/// Single-slot color map cache with whole-record expiry
#[derive(Clone)]
pub struct ResultCache {
    store: Arc<dyn CacheStore>,
    ttl_millis: i64,
}

impl ResultCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self::with_ttl_hours(store, DEFAULT_TTL_HOURS)
    }

    pub fn with_ttl_hours(store: Arc<dyn CacheStore>, ttl_hours: u64) -> Self {
        Self {
            store,
            ttl_millis: songmap_common::time::hours_to_millis(ttl_hours),
        }
    }

    pub fn ttl_millis(&self) -> i64 {
        self.ttl_millis
    }

    /// Current record if present and younger than the TTL
    pub async fn get(&self) -> Option<CacheRecord> {
        match self.read_record(songmap_common::time::now_millis()).await {
            Ok(record) => record,
            Err(e) => {
                warn!("{}; treating as cache miss", e);
                None
            }
        }
    }

    /// Overwrite the stored record with `colors`, stamped now
    pub async fn put(&self, colors: &ColorMap) {
        if let Err(e) = self.write_record(colors).await {
            warn!("{}; result not cached", e);
        }
    }

    /// Drop the current record so the next run recomputes
    pub async fn invalidate(&self) {
        if let Err(e) = self.store.remove(TIMESTAMP_KEY).await {
            warn!("Cache invalidation failed: {}", e);
        }
    }

    async fn read_record(&self, now_millis: i64) -> Result<Option<CacheRecord>, CacheError> {
        let (Some(colors_json), Some(timestamp)) = (
            self.store.get(COLORS_KEY).await?,
            self.store.get(TIMESTAMP_KEY).await?,
        ) else {
            debug!("Color cache empty");
            return Ok(None);
        };

        let computed_at: i64 = timestamp
            .trim()
            .parse()
            .map_err(|e| CacheError::Corrupt(format!("timestamp {:?}: {}", timestamp, e)))?;

        let age_millis = now_millis.saturating_sub(computed_at);
        if age_millis >= self.ttl_millis {
            debug!(age_millis, ttl_millis = self.ttl_millis, "Color cache expired");
            return Ok(None);
        }

        let colors: ColorMap = serde_json::from_str(&colors_json)
            .map_err(|e| CacheError::Corrupt(format!("color map: {}", e)))?;
        validate_colors(&colors)?;

        Ok(Some(CacheRecord {
            colors,
            computed_at_epoch_millis: computed_at,
        }))
    }

    async fn write_record(&self, colors: &ColorMap) -> Result<(), CacheError> {
        let colors_json =
            serde_json::to_string(colors).map_err(|e| CacheError::Write(e.to_string()))?;
        let timestamp = songmap_common::time::now_millis().to_string();

        self.store
            .set_many(&[(COLORS_KEY, colors_json.as_str()), (TIMESTAMP_KEY, timestamp.as_str())])
            .await?;

        debug!(entries = colors.len(), "Color map cached");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Store whose every operation fails
    struct BrokenStore;

    #[async_trait]
    impl CacheStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Read("disk on fire".to_string()))
        }

        async fn set(&self, _key: &str, _value: &str) -> Result<(), CacheError> {
            Err(CacheError::Write("disk on fire".to_string()))
        }

        async fn remove(&self, _key: &str) -> Result<(), CacheError> {
            Err(CacheError::Write("disk on fire".to_string()))
        }
    }

    fn sample_colors() -> ColorMap {
        let mut colors = ColorMap::new();
        colors.insert("TL".to_string(), "#4A35FE".to_string());
        colors.insert("OL".to_string(), "#6B8620".to_string());
        colors
    }

    #[tokio::test]
    async fn test_put_then_get_round_trip() {
        let cache = ResultCache::new(Arc::new(MemoryCacheStore::new()));
        let colors = sample_colors();

        cache.put(&colors).await;
        let record = cache.get().await.expect("fresh record should hit");

        assert_eq!(record.colors, colors);
        let age = songmap_common::time::now_millis() - record.computed_at_epoch_millis;
        assert!((0..5_000).contains(&age));
    }

    #[tokio::test]
    async fn test_empty_store_is_miss() {
        let cache = ResultCache::new(Arc::new(MemoryCacheStore::new()));
        assert!(cache.get().await.is_none());
    }

    #[tokio::test]
    async fn test_expired_record_is_miss() {
        let store = Arc::new(MemoryCacheStore::new());
        let cache = ResultCache::new(store.clone());
        cache.put(&sample_colors()).await;

        let forged = songmap_common::time::now_millis() - 25 * 60 * 60 * 1000;
        store.set(TIMESTAMP_KEY, &forged.to_string()).await.unwrap();

        assert!(cache.get().await.is_none());
    }

    #[tokio::test]
    async fn test_ttl_boundary_is_miss() {
        let store = Arc::new(MemoryCacheStore::new());
        let cache = ResultCache::with_ttl_hours(store.clone(), 1);
        cache.put(&sample_colors()).await;

        let now = songmap_common::time::now_millis();
        store.set(TIMESTAMP_KEY, &now.to_string()).await.unwrap();

        // Exactly one TTL old: invalid
        let record = cache.read_record(now + cache.ttl_millis()).await.unwrap();
        assert!(record.is_none());

        // One millisecond younger: valid
        let record = cache.read_record(now + cache.ttl_millis() - 1).await.unwrap();
        assert!(record.is_some());
    }

    #[tokio::test]
    async fn test_huge_ttl_does_not_wrap() {
        let cache = ResultCache::with_ttl_hours(Arc::new(MemoryCacheStore::new()), u64::MAX);
        assert!(cache.ttl_millis() > 0);

        cache.put(&sample_colors()).await;
        assert!(cache.get().await.is_some());
    }

    #[tokio::test]
    async fn test_corrupt_json_is_miss() {
        let store = Arc::new(MemoryCacheStore::new());
        store.set(COLORS_KEY, "{not json").await.unwrap();
        store
            .set(TIMESTAMP_KEY, &songmap_common::time::now_millis().to_string())
            .await
            .unwrap();

        let cache = ResultCache::new(store);
        assert!(cache.get().await.is_none());
    }

    #[tokio::test]
    async fn test_invalid_entries_are_miss() {
        let now = songmap_common::time::now_millis().to_string();

        for colors_json in [
            r##"{"tl":"#4A35FE"}"##,
            r##"{"TL":"red"}"##,
            r##"{"OL":""}"##,
            r##"{"TLX":"#4A35FE"}"##,
            r##"{"TL":"#4A35FE","OL":"#6B862"}"##,
        ] {
            let store = Arc::new(MemoryCacheStore::new());
            store.set(COLORS_KEY, colors_json).await.unwrap();
            store.set(TIMESTAMP_KEY, &now).await.unwrap();

            let cache = ResultCache::new(store);
            assert!(cache.get().await.is_none(), "{} should be a miss", colors_json);
        }
    }

    #[tokio::test]
    async fn test_unparsable_timestamp_is_miss() {
        let store = Arc::new(MemoryCacheStore::new());
        store.set(COLORS_KEY, "{}").await.unwrap();
        store.set(TIMESTAMP_KEY, "yesterday").await.unwrap();

        let cache = ResultCache::new(store);
        assert!(cache.get().await.is_none());
    }

    #[tokio::test]
    async fn test_broken_store_never_raises() {
        let cache = ResultCache::new(Arc::new(BrokenStore));
        cache.put(&sample_colors()).await;
        assert!(cache.get().await.is_none());
        cache.invalidate().await;
    }

    #[tokio::test]
    async fn test_put_overwrites_previous_record() {
        let cache = ResultCache::new(Arc::new(MemoryCacheStore::new()));
        cache.put(&sample_colors()).await;

        let mut replacement = ColorMap::new();
        replacement.insert("CA".to_string(), "#102030".to_string());
        cache.put(&replacement).await;

        assert_eq!(cache.get().await.unwrap().colors, replacement);
    }

    #[tokio::test]
    async fn test_invalidate_forces_miss() {
        let cache = ResultCache::new(Arc::new(MemoryCacheStore::new()));
        cache.put(&sample_colors()).await;
        cache.invalidate().await;
        assert!(cache.get().await.is_none());
    }
}
