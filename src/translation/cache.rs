/*!
 * Translation caching functionality.
 *
 * Translations are keyed by the fingerprint of the default-language text and
 * the target language, so identical texts anywhere in the story share one
 * entry. Storage is a bounded LRU; clones share the same storage.
 */

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::debug;
use lru::LruCache;
use parking_lot::Mutex;

use super::fingerprint::Fingerprint;

/// Default number of cached translations
pub const DEFAULT_CACHE_CAPACITY: usize = 4096;

/// Cache key combining source fingerprint and target language
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub fingerprint: Fingerprint,
    pub target_language: String,
}

impl CacheKey {
    pub fn new(fingerprint: Fingerprint, target_language: &str) -> Self {
        Self {
            fingerprint,
            target_language: target_language.to_string(),
        }
    }
}

/// Hit/miss counters and current size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub entries: usize,
    pub capacity: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total > 0 {
            self.hits as f64 / total as f64
        } else {
            0.0
        }
    }
}

/// Translation cache for storing and retrieving translations
pub struct TranslationCache {
    /// Internal cache storage
    cache: Arc<Mutex<LruCache<CacheKey, String>>>,

    /// Cache hit counter
    hits: Arc<AtomicUsize>,

    /// Cache miss counter
    misses: Arc<AtomicUsize>,

    capacity: usize,

    /// Whether caching is enabled
    enabled: bool,
}

impl TranslationCache {
    /// Create a new translation cache holding at most `capacity` entries
    pub fn new(capacity: usize, enabled: bool) -> Self {
        let capacity = capacity.max(1);
        let bound = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Arc::new(Mutex::new(LruCache::new(bound))),
            hits: Arc::new(AtomicUsize::new(0)),
            misses: Arc::new(AtomicUsize::new(0)),
            capacity,
            enabled,
        }
    }

    /// Look up a translation
    pub fn lookup(&self, fingerprint: &Fingerprint, target_language: &str) -> Option<String> {
        if !self.enabled {
            return None;
        }

        let key = CacheKey::new(*fingerprint, target_language);
        let mut cache = self.cache.lock();

        match cache.get(&key) {
            Some(translation) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("Cache hit for {} -> {}", fingerprint.short(), target_language);
                Some(translation.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("Cache miss for {} -> {}", fingerprint.short(), target_language);
                None
            }
        }
    }

    /// Whether an entry exists, without touching recency or counters
    pub fn contains(&self, fingerprint: &Fingerprint, target_language: &str) -> bool {
        let key = CacheKey::new(*fingerprint, target_language);
        self.cache.lock().contains(&key)
    }

    /// Store a translation
    pub fn store(&self, fingerprint: Fingerprint, target_language: &str, translation: &str) {
        if !self.enabled {
            return;
        }

        let key = CacheKey::new(fingerprint, target_language);
        if let Some((evicted, _)) = self.cache.lock().push(key, translation.to_string()) {
            if evicted.fingerprint != fingerprint || evicted.target_language != target_language {
                debug!(
                    "Evicted {} -> {} from translation cache",
                    evicted.fingerprint.short(),
                    evicted.target_language
                );
            }
        }

        debug!("Cached translation for {} -> {}", fingerprint.short(), target_language);
    }

    /// Keep only the entries for which `keep` returns true. Returns the number removed.
    pub fn retain<F>(&self, mut keep: F) -> usize
    where
        F: FnMut(&CacheKey) -> bool,
    {
        let mut cache = self.cache.lock();
        let doomed: Vec<CacheKey> = cache
            .iter()
            .filter(|(key, _)| !keep(key))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &doomed {
            cache.pop(key);
        }

        if !doomed.is_empty() {
            debug!("Pruned {} translation cache entries", doomed.len());
        }
        doomed.len()
    }

    /// All entries, most recently used first
    pub fn entries(&self) -> Vec<(CacheKey, String)> {
        self.cache
            .lock()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
            capacity: self.capacity,
        }
    }

    /// Clear the cache
    pub fn clear(&self) {
        self.cache.lock().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);

        debug!("Translation cache cleared");
    }

    /// Get the number of entries in the cache
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }

    /// Check if the cache is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl Default for TranslationCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY, true)
    }
}

impl Clone for TranslationCache {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            hits: self.hits.clone(),
            misses: self.misses.clone(),
            capacity: self.capacity,
            enabled: self.enabled,
        }
    }
}

impl std::fmt::Debug for TranslationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslationCache")
            .field("stats", &self.stats())
            .field("enabled", &self.enabled)
            .finish()
    }
}
