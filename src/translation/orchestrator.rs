/*!
 * Translation synchronization between the default language and its derived
 * variants.
 *
 * The orchestrator owns the content tree and the sync ledger behind one lock.
 * Every mutation takes the lock briefly; the lock is never held across an
 * await. `synchronize` collects stale blocks, serves what it can from the
 * cache, groups the rest by (fingerprint, target) and dispatches the groups
 * through a bounded window of concurrent provider calls, merging each result
 * as soon as it arrives.
 */

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use parking_lot::Mutex;
use tokio::sync::{watch, Semaphore};

use crate::content::{Block, ContentStore, Page, PageReplacement, StoryDocument};
use crate::errors::{ContentError, ProviderError, TranslationError};
use crate::providers::{TranslationProvider, TranslationRequest};

use super::cache::TranslationCache;
use super::fingerprint::{fingerprint, Fingerprint};
use super::ledger::{BlockKey, BlockState, SyncLedger};
use super::progress::RunProgress;

/// Default number of translation requests in flight
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 4;

/// A block that could not be translated during a run
#[derive(Debug, Clone, PartialEq)]
pub struct BlockFailure {
    pub key: BlockKey,
    pub error: ProviderError,
}

/// Outcome of one `synchronize` run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    /// Stale units found when the run started
    pub total_units: usize,
    /// Units whose translation was merged
    pub applied: usize,
    /// Units applied from the cache without a provider call
    pub served_from_cache: usize,
    /// Provider calls that completed, successfully or not
    pub translation_calls: usize,
    pub failures: Vec<BlockFailure>,
    /// Units whose request was cancelled
    pub cancelled: usize,
    /// Late results for units that were no longer pending
    pub discarded: usize,
    /// Results that arrived after the default text changed
    pub superseded: usize,
}

impl SyncReport {
    /// Whether every stale unit ended up applied
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.cancelled == 0 && self.discarded == 0 && self.superseded == 0
    }
}

/// Content and bookkeeping guarded together
#[derive(Debug)]
struct Workspace {
    store: ContentStore,
    ledger: SyncLedger,
    /// Cancellation signal per derived language
    cancellations: HashMap<String, watch::Sender<u64>>,
    next_ticket: u64,
}

impl Workspace {
    fn cancel_signal(&mut self, language: &str) -> watch::Receiver<u64> {
        self.cancellations
            .entry(language.to_string())
            .or_insert_with(|| watch::channel(0).0)
            .subscribe()
    }

    fn default_fingerprint(&self, page: usize, block: usize) -> Result<Fingerprint, ContentError> {
        let text = self.store.text_at(self.store.default_language(), page, block)?;
        Ok(fingerprint(text))
    }
}

/// Units sharing one source text and one target language
struct Group {
    fingerprint: Fingerprint,
    language: String,
    text: String,
    units: Vec<(BlockKey, u64)>,
    cancel: watch::Receiver<u64>,
}

enum Outcome {
    Done(Result<String, ProviderError>),
    Cancelled,
}

/// Releases the run's pending units if the run is dropped before it finishes
struct PendingGuard {
    workspace: Arc<Mutex<Workspace>>,
    tickets: Vec<(BlockKey, u64)>,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        let released = self.workspace.lock().ledger.release_tickets(&self.tickets);
        if released > 0 {
            debug!("Released {} pending unit(s) of an interrupted run", released);
        }
    }
}

/// Keeps derived language variants in sync with the default language
#[derive(Debug, Clone)]
pub struct TranslationOrchestrator {
    workspace: Arc<Mutex<Workspace>>,
    cache: TranslationCache,
    provider: Arc<dyn TranslationProvider>,
    semaphore: Arc<Semaphore>,
    max_concurrent_requests: usize,
    progress: Arc<RunProgress>,
}

impl TranslationOrchestrator {
    /// Create an orchestrator over a story. Every derived text block starts stale.
    pub fn new(store: ContentStore, provider: Arc<dyn TranslationProvider>) -> Self {
        let mut ledger = SyncLedger::new();
        let mut cancellations = HashMap::new();
        for language in store.derived_languages() {
            ledger.track_language(&language, store.default_pages());
            cancellations.insert(language, watch::channel(0).0);
        }

        Self {
            workspace: Arc::new(Mutex::new(Workspace {
                store,
                ledger,
                cancellations,
                next_ticket: 0,
            })),
            cache: TranslationCache::default(),
            provider,
            semaphore: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENT_REQUESTS)),
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            progress: Arc::new(RunProgress::new()),
        }
    }

    /// Use a shared or preloaded cache
    pub fn with_cache(mut self, cache: TranslationCache) -> Self {
        self.cache = cache;
        self
    }

    /// Set the number of requests allowed in flight
    pub fn with_max_concurrent_requests(mut self, max_concurrent_requests: usize) -> Self {
        let max = max_concurrent_requests.max(1);
        self.max_concurrent_requests = max;
        self.semaphore = Arc::new(Semaphore::new(max));
        self
    }

    pub fn cache(&self) -> &TranslationCache {
        &self.cache
    }

    pub fn max_concurrent_requests(&self) -> usize {
        self.max_concurrent_requests
    }

    pub fn default_language(&self) -> String {
        self.workspace.lock().store.default_language().to_string()
    }

    /// All languages, default first
    pub fn languages(&self) -> Vec<String> {
        self.workspace.lock().store.languages()
    }

    pub fn page_count(&self) -> usize {
        self.workspace.lock().store.page_count()
    }

    /// Owned copy of a variant's pages
    pub fn snapshot(&self, language: &str) -> Result<Vec<Page>, ContentError> {
        self.workspace.lock().store.snapshot(language)
    }

    pub fn text_at(&self, language: &str, page: usize, block: usize) -> Result<String, ContentError> {
        self.workspace
            .lock()
            .store
            .text_at(language, page, block)
            .map(str::to_string)
    }

    /// The whole story, ready to be saved
    pub fn story_document(&self) -> StoryDocument {
        self.workspace.lock().store.to_document()
    }

    /// Sync state of a derived text block
    pub fn block_state(&self, language: &str, page: usize, block: usize) -> Option<BlockState> {
        self.workspace
            .lock()
            .ledger
            .state(&BlockKey::new(language, page, block))
    }

    /// Number of units currently in flight
    pub fn pending_count(&self) -> usize {
        self.workspace.lock().ledger.pending_count()
    }

    /// Tracked units per state
    pub fn state_counts(&self) -> HashMap<BlockState, usize> {
        self.workspace.lock().ledger.counts()
    }

    /// Completed/total for the current run
    pub fn progress(&self) -> f32 {
        self.progress.ratio()
    }

    /// Re-fingerprint a default block and flag it stale where the recorded
    /// translation came from other text. Returns the flagged languages.
    pub fn mark_dirty(&self, page: usize, block: usize) -> Result<Vec<String>, TranslationError> {
        let mut workspace = self.workspace.lock();
        let current = workspace.default_fingerprint(page, block)?;
        let flagged = workspace.ledger.mark_dirty(page, block, current);
        if !flagged.is_empty() {
            debug!("Block {}:{} is stale in {}", page, block, flagged.join(", "));
        }
        Ok(flagged)
    }

    /// Append a page to the story. Its text blocks start stale everywhere.
    pub fn append_page(&self, page: Page) -> usize {
        let mut workspace = self.workspace.lock();
        workspace.ledger.append_page(&page);
        workspace.store.append_page(page)
    }

    /// Append a block to a page of the story
    pub fn append_block(&self, page: usize, block: Block) -> Result<usize, ContentError> {
        let mut workspace = self.workspace.lock();
        let tracked = block.mirrored();
        let index = workspace.store.append_block(page, block)?;
        workspace.ledger.append_block(page, &tracked);
        Ok(index)
    }

    /// Remove a page from every variant
    pub fn remove_page(&self, index: usize) -> Result<Page, ContentError> {
        let mut workspace = self.workspace.lock();
        let removed = workspace.store.remove_page(index)?;
        workspace.ledger.remove_page(index);
        Ok(removed)
    }

    /// Replace a page's content.
    ///
    /// On the default language the page is mirrored; kept blocks keep their
    /// sync state until `mark_dirty` is called. On a derived language this is
    /// a manual override and every changed text block is pinned.
    pub fn replace_page_content(
        &self,
        language: &str,
        page_index: usize,
        content: Page,
    ) -> Result<PageReplacement, TranslationError> {
        let mut workspace = self.workspace.lock();
        let replacement = workspace.store.replace_page_content(language, page_index, content)?;

        match &replacement {
            PageReplacement::Default { origins } => {
                let page = workspace.store.default_pages()[page_index].clone();
                workspace.ledger.reconcile_page(page_index, origins, &page);
            }
            PageReplacement::Override { changed } => {
                for &block in changed {
                    let current = workspace.default_fingerprint(page_index, block)?;
                    workspace
                        .ledger
                        .pin(&BlockKey::new(language, page_index, block), current);
                }
            }
        }

        Ok(replacement)
    }

    /// Manually set the text of one derived block
    pub fn override_block_text(
        &self,
        language: &str,
        page: usize,
        block: usize,
        text: &str,
    ) -> Result<(), TranslationError> {
        let mut content = {
            let workspace = self.workspace.lock();
            if workspace.store.is_default(language) {
                return Err(ContentError::DefaultLanguageWrite(language.to_string()).into());
            }
            let pages = workspace.store.snapshot(language)?;
            let count = pages.len();
            pages
                .into_iter()
                .nth(page)
                .ok_or(ContentError::PageOutOfRange { index: page, count })?
        };

        let count = content.blocks.len();
        match content.blocks.get_mut(block) {
            Some(Block::Text { content, .. }) => *content = text.to_string(),
            Some(_) => return Err(ContentError::NotText { page, block }.into()),
            None => return Err(ContentError::BlockOutOfRange { page, block, count }.into()),
        }

        self.replace_page_content(language, page, content).map(|_| ())
    }

    /// Add a derived language. Its text is empty and stale until synchronized.
    pub fn add_language(&self, language: &str) -> Result<(), ContentError> {
        let mut workspace = self.workspace.lock();
        workspace.store.add_language(language)?;
        let pages = workspace.store.default_pages().to_vec();
        workspace.ledger.track_language(language, &pages);
        workspace
            .cancellations
            .insert(language.to_string(), watch::channel(0).0);
        info!("Added language '{}'", language);
        Ok(())
    }

    /// Remove a derived language, cancelling its requests and dropping its
    /// cache entries
    pub fn remove_language(&self, language: &str) -> Result<(), ContentError> {
        {
            let mut workspace = self.workspace.lock();
            workspace.store.remove_language(language)?;
            let released = workspace.ledger.untrack_language(language);
            if let Some(signal) = workspace.cancellations.remove(language) {
                signal.send_modify(|generation| *generation += 1);
            }
            debug!("Removed '{}' ({} pending unit(s) cancelled)", language, released);
        }

        self.cache.retain(|key| key.target_language != language);
        self.prune_cache();
        info!("Removed language '{}'", language);
        Ok(())
    }

    /// Abort in-flight requests for a language. Its pending blocks go back to
    /// stale. Returns the number of units released.
    pub fn cancel_language(&self, language: &str) -> Result<usize, TranslationError> {
        let mut workspace = self.workspace.lock();
        if !workspace.store.has_language(language) {
            return Err(ContentError::UnknownLanguage(language.to_string()).into());
        }

        let released = workspace.ledger.release_language(language);
        if let Some(signal) = workspace.cancellations.get(language) {
            signal.send_modify(|generation| *generation += 1);
        }
        info!("Cancelled {} pending unit(s) for '{}'", released, language);
        Ok(released)
    }

    /// Drop cache entries no current default text or language can reach.
    /// Returns the number removed.
    pub fn prune_cache(&self) -> usize {
        let (live, languages) = {
            let workspace = self.workspace.lock();
            let live: HashSet<Fingerprint> = workspace
                .store
                .default_pages()
                .iter()
                .flat_map(Page::texts)
                .map(fingerprint)
                .collect();
            let languages: HashSet<String> = workspace.store.derived_languages().into_iter().collect();
            (live, languages)
        };

        self.cache
            .retain(|key| live.contains(&key.fingerprint) && languages.contains(&key.target_language))
    }

    /// Bring the stale blocks of `targets` up to date with `source`, which
    /// must be the default language. An empty target list means every derived
    /// language.
    ///
    /// Failures are reported per block; the run itself only fails on invalid
    /// arguments.
    pub async fn synchronize<S: AsRef<str>>(
        &self,
        source: &str,
        targets: &[S],
    ) -> Result<SyncReport, TranslationError> {
        let mut report = SyncReport::default();

        let (groups, run, guard) = {
            let mut workspace = self.workspace.lock();

            let default_language = workspace.store.default_language().to_string();
            if source != default_language {
                return Err(TranslationError::SourceNotDefault {
                    source_language: source.to_string(),
                    default_language,
                });
            }

            let mut languages = Vec::new();
            for target in targets.iter().map(AsRef::as_ref) {
                if !workspace.store.has_language(target) {
                    return Err(ContentError::UnknownLanguage(target.to_string()).into());
                }
                if target == default_language || languages.iter().any(|l| l == target) {
                    continue;
                }
                languages.push(target.to_string());
            }
            if targets.is_empty() {
                languages = workspace.store.derived_languages();
            }

            workspace.ledger.settle_applied();
            let units = workspace.ledger.stale_units(&languages);
            report.total_units = units.len();

            let mut groups: Vec<Group> = Vec::new();
            let mut index: HashMap<(Fingerprint, String), usize> = HashMap::new();
            let mut tickets = Vec::new();

            for key in units {
                let text = match workspace.store.text_at(&default_language, key.page, key.block) {
                    Ok(text) => text.to_string(),
                    Err(e) => {
                        warn!("Skipping {}: {}", key, e);
                        continue;
                    }
                };
                let fp = fingerprint(&text);

                if text.trim().is_empty() {
                    workspace
                        .store
                        .write_translation(&key.language, key.page, key.block, &text)?;
                    workspace.ledger.mark_applied(&key, fp);
                    report.applied += 1;
                    continue;
                }

                if let Some(cached) = self.cache.lookup(&fp, &key.language) {
                    workspace
                        .store
                        .write_translation(&key.language, key.page, key.block, &cached)?;
                    workspace.ledger.mark_applied(&key, fp);
                    report.applied += 1;
                    report.served_from_cache += 1;
                    continue;
                }

                workspace.next_ticket += 1;
                let ticket = workspace.next_ticket;
                if !workspace.ledger.begin(&key, ticket) {
                    continue;
                }
                tickets.push((key.clone(), ticket));

                let slot = (fp, key.language.clone());
                match index.get(&slot) {
                    Some(&i) => groups[i].units.push((key, ticket)),
                    None => {
                        index.insert(slot, groups.len());
                        let cancel = workspace.cancel_signal(&key.language);
                        groups.push(Group {
                            fingerprint: fp,
                            language: key.language.clone(),
                            text,
                            units: vec![(key, ticket)],
                            cancel,
                        });
                    }
                }
            }

            let run = self.progress.reset(report.total_units, report.applied);
            let guard = PendingGuard {
                workspace: Arc::clone(&self.workspace),
                tickets,
            };
            (groups, run, guard)
        };

        debug!(
            "Synchronizing {} unit(s): {} from cache, {} request(s) to dispatch",
            report.total_units,
            report.served_from_cache,
            groups.len()
        );

        let mut outcomes = stream::iter(groups)
            .map(|group| {
                let provider = Arc::clone(&self.provider);
                let semaphore = Arc::clone(&self.semaphore);
                let request = TranslationRequest::new(group.text.clone(), source, group.language.clone());

                async move {
                    let mut cancel = group.cancel.clone();
                    let call = async {
                        let _permit = semaphore
                            .acquire()
                            .await
                            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
                        provider.translate(request).await.map(|r| r.translated_text)
                    };

                    let outcome = tokio::select! {
                        result = call => Outcome::Done(result),
                        _ = cancel.changed() => Outcome::Cancelled,
                    };
                    (group, outcome)
                }
            })
            .buffer_unordered(self.max_concurrent_requests);

        while let Some((group, outcome)) = outcomes.next().await {
            self.merge(group, outcome, run, &mut report);
        }
        drop(outcomes);
        drop(guard);

        info!(
            "Synchronization finished: {}/{} applied ({} from cache, {} call(s), {} failed, {} cancelled)",
            report.applied,
            report.total_units,
            report.served_from_cache,
            report.translation_calls,
            report.failures.len(),
            report.cancelled
        );
        Ok(report)
    }

    /// Fold one finished group into the content tree
    fn merge(&self, group: Group, outcome: Outcome, run: u64, report: &mut SyncReport) {
        let unit_count = group.units.len();

        let result = match outcome {
            Outcome::Cancelled => {
                let mut workspace = self.workspace.lock();
                workspace.ledger.release_tickets(&group.units);
                report.cancelled += unit_count;
                self.progress.advance(run, unit_count);
                return;
            }
            Outcome::Done(result) => {
                report.translation_calls += 1;
                result.and_then(|text| {
                    if text.trim().is_empty() {
                        Err(ProviderError::ParseError("Empty translation".to_string()))
                    } else {
                        Ok(text)
                    }
                })
            }
        };

        if let Ok(text) = &result {
            self.cache.store(group.fingerprint, &group.language, text);
        }

        let mut workspace = self.workspace.lock();
        for (key, ticket) in group.units {
            if !workspace.ledger.resolve(&key, ticket) {
                debug!("Discarding late result for {}", key);
                report.discarded += 1;
                continue;
            }

            match &result {
                Ok(text) => {
                    let current = workspace.default_fingerprint(key.page, key.block).ok();
                    if current != Some(group.fingerprint) {
                        debug!("Default text of {} changed during translation", key);
                        workspace.ledger.mark_stale(&key);
                        report.superseded += 1;
                        continue;
                    }

                    match workspace
                        .store
                        .write_translation(&key.language, key.page, key.block, text)
                    {
                        Ok(()) => {
                            workspace.ledger.mark_applied(&key, group.fingerprint);
                            report.applied += 1;
                        }
                        Err(e) => {
                            warn!("Could not apply translation to {}: {}", key, e);
                            workspace.ledger.mark_stale(&key);
                        }
                    }
                }
                Err(error) => {
                    warn!("Translation of {} failed: {}", key, error);
                    workspace.ledger.mark_stale(&key);
                    report.failures.push(BlockFailure {
                        key,
                        error: error.clone(),
                    });
                }
            }
        }

        self.progress.advance(run, unit_count);
    }
}
