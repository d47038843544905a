//! SQLite-backed key-value store for the color cache
//!
//! Rows live in `kv_store(key, value)`; writes upsert.

use crate::services::result_cache::{CacheError, CacheStore};
use async_trait::async_trait;
use sqlx::SqlitePool;

#[derive(Debug, Clone)]
pub struct SqliteCacheStore {
    db: SqlitePool,
}

impl SqliteCacheStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

const UPSERT_SQL: &str = "INSERT INTO kv_store (key, value) VALUES (?, ?)
     ON CONFLICT(key) DO UPDATE SET value = excluded.value";

#[async_trait]
impl CacheStore for SqliteCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.db)
            .await
            .map_err(|e| CacheError::Read(e.to_string()))?;

        Ok(row.map(|(value,)| value))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        sqlx::query(UPSERT_SQL)
            .bind(key)
            .bind(value)
            .execute(&self.db)
            .await
            .map_err(|e| CacheError::Write(e.to_string()))?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.db)
            .await
            .map_err(|e| CacheError::Write(e.to_string()))?;

        Ok(())
    }

    /// All keys in one transaction, so readers never see a new map with an
    /// old timestamp
    async fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), CacheError> {
        let mut tx = self
            .db
            .begin()
            .await
            .map_err(|e| CacheError::Write(e.to_string()))?;

        for (key, value) in entries {
            sqlx::query(UPSERT_SQL)
                .bind(*key)
                .bind(*value)
                .execute(&mut *tx)
                .await
                .map_err(|e| CacheError::Write(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| CacheError::Write(e.to_string()))?;

        Ok(())
    }
}
