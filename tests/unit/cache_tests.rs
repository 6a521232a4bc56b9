/*!
 * Tests for translation cache functionality
 */

use storyforge::translation::{fingerprint, TranslationCache};

#[test]
fn test_cache_new_withDisabled_shouldNeverReturnEntries() {
    let cache = TranslationCache::new(16, false);
    cache.store(fingerprint("hello"), "French", "bonjour");

    assert!(cache.lookup(&fingerprint("hello"), "French").is_none());
    assert!(cache.is_empty());
}

#[test]
fn test_cache_lookup_withDifferentLanguage_shouldMiss() {
    let cache = TranslationCache::new(16, true);
    cache.store(fingerprint("hello"), "French", "bonjour");

    assert_eq!(cache.lookup(&fingerprint("hello"), "French").as_deref(), Some("bonjour"));
    assert!(cache.lookup(&fingerprint("hello"), "Spanish").is_none());
    assert!(cache.lookup(&fingerprint("hello "), "French").is_none());
}

#[test]
fn test_cache_store_overCapacity_shouldEvictLeastRecentlyUsed() {
    let cache = TranslationCache::new(2, true);
    cache.store(fingerprint("a"), "French", "A");
    cache.store(fingerprint("b"), "French", "B");
    cache.lookup(&fingerprint("a"), "French");
    cache.store(fingerprint("c"), "French", "C");

    assert_eq!(cache.len(), 2);
    assert!(cache.contains(&fingerprint("a"), "French"));
    assert!(!cache.contains(&fingerprint("b"), "French"));
    assert!(cache.contains(&fingerprint("c"), "French"));
}

#[test]
fn test_cache_clone_shouldShareStorage() {
    let cache = TranslationCache::default();
    let clone = cache.clone();

    clone.store(fingerprint("shared"), "German", "geteilt");

    assert!(cache.contains(&fingerprint("shared"), "German"));
}

#[test]
fn test_cache_stats_shouldCountHitsAndMisses() {
    let cache = TranslationCache::new(8, true);
    cache.store(fingerprint("x"), "French", "x");

    cache.lookup(&fingerprint("x"), "French");
    cache.lookup(&fingerprint("y"), "French");
    let stats = cache.stats();

    assert_eq!((stats.hits, stats.misses, stats.entries, stats.capacity), (1, 1, 1, 8));
    assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
}

#[test]
fn test_cache_retain_shouldReportRemovedCount() {
    let cache = TranslationCache::new(8, true);
    cache.store(fingerprint("x"), "French", "x");
    cache.store(fingerprint("x"), "German", "x");

    let removed = cache.retain(|key| key.target_language == "German");

    assert_eq!(removed, 1);
    assert_eq!(cache.len(), 1);
}
