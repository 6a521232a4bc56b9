/*!
 * Repository layer for the persisted translation cache.
 *
 * The in-memory `TranslationCache` is the working copy; this repository
 * warms it at start-up and writes it back after synchronization.
 */

use anyhow::{Context, Result};
use chrono::Utc;
use log::{debug, info, warn};
use rusqlite::params;
use std::path::Path;

use super::connection::DatabaseConnection;
use crate::translation::{CacheKey, Fingerprint, TranslationCache};

/// Repository for database operations
#[derive(Debug, Clone)]
pub struct Repository {
    db: DatabaseConnection,
}

impl Repository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Open the cache database at `path`, or at the per-user default location
    pub fn open(path: Option<&Path>) -> Result<Self> {
        Ok(Self::new(DatabaseConnection::open(path)?))
    }

    /// Create a repository with an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        Ok(Self::new(DatabaseConnection::new_in_memory()?))
    }

    /// All stored entries, least recently written first
    pub async fn load_cache_entries(&self) -> Result<Vec<(CacheKey, String)>> {
        let rows: Vec<(String, String, String)> = self
            .db
            .execute_async(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT fingerprint, target_language, translated_text
                     FROM translation_cache
                     ORDER BY updated_at ASC, rowid ASC",
                )?;
                let rows = stmt
                    .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for (fingerprint, language, translation) in rows {
            match fingerprint.parse::<Fingerprint>() {
                Ok(fp) => entries.push((CacheKey::new(fp, &language), translation)),
                Err(e) => warn!("Skipping corrupt cache row: {}", e),
            }
        }
        Ok(entries)
    }

    /// Upsert entries. Later entries in `entries` end up more recent.
    pub async fn save_cache_entries(&self, entries: Vec<(CacheKey, String)>) -> Result<usize> {
        let now = Utc::now().to_rfc3339();

        self.db
            .transaction_async(move |tx| {
                let mut stmt = tx.prepare(
                    "INSERT OR REPLACE INTO translation_cache (fingerprint, target_language, translated_text, updated_at)
                     VALUES (?1, ?2, ?3, ?4)",
                )?;
                for (key, translation) in &entries {
                    stmt.execute(params![key.fingerprint.to_hex(), key.target_language, translation, now])?;
                }
                Ok(entries.len())
            })
            .await
            .context("Failed to save translation cache")
    }

    /// Number of stored entries
    pub async fn cache_count(&self) -> Result<i64> {
        self.db
            .execute_async(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM translation_cache", [], |row| row.get(0))?))
            .await
    }

    /// Delete every stored entry for one target language
    pub async fn delete_language(&self, language: &str) -> Result<usize> {
        let language = language.to_string();
        self.db
            .execute_async(move |conn| {
                Ok(conn.execute("DELETE FROM translation_cache WHERE target_language = ?1", [language])?)
            })
            .await
    }

    /// Clear the translation cache
    pub async fn clear_cache(&self) -> Result<usize> {
        self.db
            .execute_async(|conn| Ok(conn.execute("DELETE FROM translation_cache", [])?))
            .await
    }

    /// Fill `cache` with the stored entries
    pub async fn warm_cache(&self, cache: &TranslationCache) -> Result<usize> {
        let entries = self.load_cache_entries().await?;
        let count = entries.len();
        for (key, translation) in entries {
            cache.store(key.fingerprint, &key.target_language, &translation);
        }
        info!("Loaded {} cached translation(s) from {:?}", count, self.db.path());
        Ok(count)
    }

    /// Write the current contents of `cache`
    pub async fn persist_cache(&self, cache: &TranslationCache) -> Result<usize> {
        // entries() is most recent first; store oldest first so recency survives a reload
        let mut entries = cache.entries();
        entries.reverse();
        let saved = self.save_cache_entries(entries).await?;
        debug!("Persisted {} cached translation(s)", saved);
        Ok(saved)
    }
}
