/*!
 * Translation synchronization for derived language variants.
 *
 * This module keeps every derived variant in step with the default language.
 * It is split into several submodules:
 *
 * - `fingerprint`: Content hashing used to detect changed text
 * - `cache`: Translations keyed by fingerprint and target language
 * - `ledger`: Per-block sync state and the set of in-flight units
 * - `progress`: Completion counters for the current run
 * - `orchestrator`: The synchronization engine
 */

pub use self::cache::{CacheKey, CacheStats, TranslationCache, DEFAULT_CACHE_CAPACITY};
pub use self::fingerprint::{fingerprint, Fingerprint};
pub use self::ledger::{BlockKey, BlockState, SyncLedger, TrackedBlock};
pub use self::orchestrator::{
    BlockFailure, SyncReport, TranslationOrchestrator, DEFAULT_MAX_CONCURRENT_REQUESTS,
};
pub use self::progress::RunProgress;

pub mod cache;
pub mod fingerprint;
pub mod ledger;
pub mod orchestrator;
pub mod progress;
