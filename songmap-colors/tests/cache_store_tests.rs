//! SQLite-backed color cache tests
//!
//! Uses a database file in a temp directory so the pool behaves as in
//! production.

use songmap_colors::db::{self, SqliteCacheStore};
use songmap_colors::services::result_cache::{COLORS_KEY, TIMESTAMP_KEY};
use songmap_colors::services::{CacheStore, ResultCache};
use songmap_colors::types::ColorMap;
use std::sync::Arc;
use tempfile::TempDir;

async fn sqlite_store(dir: &TempDir) -> SqliteCacheStore {
    let pool = db::init_database_pool(&dir.path().join("songmap.db"))
        .await
        .unwrap();
    SqliteCacheStore::new(pool)
}

fn sample_colors() -> ColorMap {
    let mut colors = ColorMap::new();
    colors.insert("TL".to_string(), "#4A35FE".to_string());
    colors.insert("OL".to_string(), "#6B8620".to_string());
    colors
}

#[tokio::test]
async fn test_result_cache_round_trip_through_sqlite() {
    let dir = TempDir::new().unwrap();
    let cache = ResultCache::new(Arc::new(sqlite_store(&dir).await));

    cache.put(&sample_colors()).await;
    let record = cache.get().await.expect("fresh record should hit");

    assert_eq!(record.colors, sample_colors());
}

#[tokio::test]
async fn test_record_survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let cache = ResultCache::new(Arc::new(sqlite_store(&dir).await));
        cache.put(&sample_colors()).await;
    }

    // Given: a new pool on the same file
    let cache = ResultCache::new(Arc::new(sqlite_store(&dir).await));

    assert_eq!(cache.get().await.unwrap().colors, sample_colors());
}

#[tokio::test]
async fn test_forged_old_timestamp_is_miss() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(sqlite_store(&dir).await);
    let cache = ResultCache::new(store.clone());
    cache.put(&sample_colors()).await;

    let forged = songmap_common::time::now_millis() - 25 * 60 * 60 * 1000;
    store.set(TIMESTAMP_KEY, &forged.to_string()).await.unwrap();

    assert!(cache.get().await.is_none());
}

#[tokio::test]
async fn test_keys_stored_as_plain_strings() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(sqlite_store(&dir).await);
    ResultCache::new(store.clone()).put(&sample_colors()).await;

    let colors_json = store.get(COLORS_KEY).await.unwrap().unwrap();
    let parsed: ColorMap = serde_json::from_str(&colors_json).unwrap();
    assert_eq!(parsed, sample_colors());

    let timestamp = store.get(TIMESTAMP_KEY).await.unwrap().unwrap();
    assert!(timestamp.parse::<i64>().is_ok());
}
