/*!
 * Per-language synchronization bookkeeping.
 *
 * For every derived language the ledger mirrors the page/block layout of the
 * story and records, per text block, its sync state, the fingerprint of the
 * default text its current translation came from, and an optional manual
 * override pin. Media blocks are not tracked.
 */

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::content::{Block, BlockOrigin, Page};

use super::fingerprint::Fingerprint;

/// Sync state of one derived text block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockState {
    /// Translation matches the current default text
    Idle,
    /// Default text changed, or the block was just added
    Stale,
    /// A translation request is in flight
    Pending,
    /// Translation merged during the current run
    Applied,
}

/// Bookkeeping for one derived text block
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedBlock {
    pub state: BlockState,
    /// Fingerprint of the default text the current translation was made from
    pub source: Option<Fingerprint>,
    /// Set by a manual override; holds the default fingerprint at override time
    pub pinned: Option<Fingerprint>,
}

impl TrackedBlock {
    fn stale() -> Self {
        Self {
            state: BlockState::Stale,
            source: None,
            pinned: None,
        }
    }
}

/// Identifies one unit of translation work
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockKey {
    pub language: String,
    pub page: usize,
    pub block: usize,
}

impl BlockKey {
    pub fn new(language: &str, page: usize, block: usize) -> Self {
        Self {
            language: language.to_string(),
            page,
            block,
        }
    }
}

impl std::fmt::Display for BlockKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}:{}]", self.language, self.page, self.block)
    }
}

type Row = Vec<Option<TrackedBlock>>;

fn track_page(page: &Page) -> Row {
    page.blocks
        .iter()
        .map(|block| match block {
            Block::Text { .. } => Some(TrackedBlock::stale()),
            _ => None,
        })
        .collect()
}

/// Sync state for all derived languages plus the set of in-flight units
#[derive(Debug, Default)]
pub struct SyncLedger {
    languages: BTreeMap<String, Vec<Row>>,
    /// In-flight units and the ticket of the request that owns them
    pending: HashMap<BlockKey, u64>,
}

impl SyncLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a derived language; every text block begins stale
    pub fn track_language(&mut self, language: &str, pages: &[Page]) {
        let rows = pages.iter().map(track_page).collect();
        self.languages.insert(language.to_string(), rows);
    }

    /// Stop tracking a language. Returns the number of pending units released.
    pub fn untrack_language(&mut self, language: &str) -> usize {
        let released = self.release_language(language);
        self.languages.remove(language);
        released
    }

    pub fn get(&self, key: &BlockKey) -> Option<&TrackedBlock> {
        self.languages
            .get(&key.language)
            .and_then(|rows| rows.get(key.page))
            .and_then(|row| row.get(key.block))
            .and_then(Option::as_ref)
    }

    fn get_mut(&mut self, key: &BlockKey) -> Option<&mut TrackedBlock> {
        self.languages
            .get_mut(&key.language)
            .and_then(|rows| rows.get_mut(key.page))
            .and_then(|row| row.get_mut(key.block))
            .and_then(Option::as_mut)
    }

    pub fn state(&self, key: &BlockKey) -> Option<BlockState> {
        self.get(key).map(|t| t.state)
    }

    /// Mirror a newly appended page
    pub fn append_page(&mut self, page: &Page) {
        for rows in self.languages.values_mut() {
            rows.push(track_page(page));
        }
    }

    /// Mirror a newly appended block
    pub fn append_block(&mut self, page: usize, block: &Block) {
        for rows in self.languages.values_mut() {
            if let Some(row) = rows.get_mut(page) {
                row.push(match block {
                    Block::Text { .. } => Some(TrackedBlock::stale()),
                    _ => None,
                });
            }
        }
    }

    /// Remove a page. Pending units on this or later pages are released
    /// because their positions shift.
    pub fn remove_page(&mut self, index: usize) {
        self.release_where(|key| key.page >= index);
        for rows in self.languages.values_mut() {
            if index < rows.len() {
                rows.remove(index);
            }
        }
    }

    /// Rebuild a page's rows after the default page was replaced.
    ///
    /// Kept blocks carry their bookkeeping over; placeholders start stale.
    /// A pending unit stays pending only if its block kept its position.
    pub fn reconcile_page(&mut self, page_index: usize, origins: &[BlockOrigin], page: &Page) {
        let in_place: HashSet<usize> = origins
            .iter()
            .enumerate()
            .filter_map(|(i, origin)| match origin {
                BlockOrigin::Kept(j) if *j == i => Some(i),
                _ => None,
            })
            .collect();
        self.release_where(|key| key.page == page_index && !in_place.contains(&key.block));

        for rows in self.languages.values_mut() {
            let Some(previous) = rows.get(page_index).cloned() else {
                continue;
            };

            let row = page
                .blocks
                .iter()
                .zip(origins.iter())
                .enumerate()
                .map(|(i, (block, origin))| match (block, origin) {
                    (Block::Text { .. }, BlockOrigin::Kept(j)) => previous
                        .get(*j)
                        .cloned()
                        .flatten()
                        .map(|mut tracked| {
                            if tracked.state == BlockState::Pending && *j != i {
                                tracked.state = BlockState::Stale;
                            }
                            tracked
                        })
                        .or_else(|| Some(TrackedBlock::stale())),
                    (Block::Text { .. }, BlockOrigin::Placeholder) => Some(TrackedBlock::stale()),
                    _ => None,
                })
                .collect();

            rows[page_index] = row;
        }
    }

    /// Flag a block stale in every language whose translation was made from
    /// a different fingerprint. Returns the languages that became stale.
    pub fn mark_dirty(&mut self, page: usize, block: usize, current: Fingerprint) -> Vec<String> {
        let mut flagged = Vec::new();

        for (language, rows) in self.languages.iter_mut() {
            let Some(tracked) = rows
                .get_mut(page)
                .and_then(|row| row.get_mut(block))
                .and_then(Option::as_mut)
            else {
                continue;
            };

            if tracked.state == BlockState::Pending {
                continue;
            }

            match tracked.pinned {
                Some(pin) if pin == current => {
                    tracked.state = BlockState::Idle;
                    continue;
                }
                Some(_) => tracked.pinned = None,
                None => {}
            }

            if tracked.source == Some(current) {
                if tracked.state == BlockState::Stale {
                    tracked.state = BlockState::Idle;
                }
            } else if tracked.state != BlockState::Stale {
                tracked.state = BlockState::Stale;
                flagged.push(language.clone());
            }
        }

        flagged
    }

    /// Pin a block after a manual override of its derived text
    pub fn pin(&mut self, key: &BlockKey, current: Fingerprint) {
        self.pending.remove(key);
        if let Some(tracked) = self.get_mut(key) {
            tracked.state = BlockState::Idle;
            tracked.source = None;
            tracked.pinned = Some(current);
        }
    }

    /// Stale, non-pending units for the given languages in dispatch order:
    /// page by page, block by block, then language.
    pub fn stale_units(&self, languages: &[String]) -> Vec<BlockKey> {
        let mut units = Vec::new();
        let page_count = self.languages.values().map(Vec::len).max().unwrap_or(0);

        for page in 0..page_count {
            let block_count = self
                .languages
                .values()
                .filter_map(|rows| rows.get(page).map(Vec::len))
                .max()
                .unwrap_or(0);

            for block in 0..block_count {
                for language in languages {
                    let key = BlockKey::new(language, page, block);
                    if self.state(&key) == Some(BlockState::Stale) && !self.pending.contains_key(&key) {
                        units.push(key);
                    }
                }
            }
        }

        units
    }

    /// Move every applied unit back to idle at the start of a run
    pub fn settle_applied(&mut self) {
        for rows in self.languages.values_mut() {
            for tracked in rows.iter_mut().flatten().flatten() {
                if tracked.state == BlockState::Applied {
                    tracked.state = BlockState::Idle;
                }
            }
        }
    }

    /// Mark a unit in flight under `ticket`. Fails if it is already pending.
    pub fn begin(&mut self, key: &BlockKey, ticket: u64) -> bool {
        if self.pending.contains_key(key) {
            return false;
        }
        let Some(tracked) = self.get_mut(key) else {
            return false;
        };
        tracked.state = BlockState::Pending;
        self.pending.insert(key.clone(), ticket);
        true
    }

    /// Take ownership of a finished unit. Returns false when the unit is no
    /// longer pending under `ticket`, in which case the result must be dropped.
    pub fn resolve(&mut self, key: &BlockKey, ticket: u64) -> bool {
        if self.pending.get(key) == Some(&ticket) {
            self.pending.remove(key);
            true
        } else {
            false
        }
    }

    pub fn is_pending(&self, key: &BlockKey) -> bool {
        self.pending.contains_key(key)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Record a merged translation
    pub fn mark_applied(&mut self, key: &BlockKey, source: Fingerprint) {
        if let Some(tracked) = self.get_mut(key) {
            tracked.state = BlockState::Applied;
            tracked.source = Some(source);
            tracked.pinned = None;
        }
    }

    pub fn mark_stale(&mut self, key: &BlockKey) {
        if let Some(tracked) = self.get_mut(key) {
            tracked.state = BlockState::Stale;
        }
    }

    /// Release every pending unit of a language, leaving it stale
    pub fn release_language(&mut self, language: &str) -> usize {
        self.release_where(|key| key.language == language)
    }

    /// Release the given units if they are still owned by their tickets
    pub fn release_tickets(&mut self, tickets: &[(BlockKey, u64)]) -> usize {
        let mut released = 0;
        for (key, ticket) in tickets {
            if self.resolve(key, *ticket) {
                self.mark_stale(key);
                released += 1;
            }
        }
        released
    }

    fn release_where<F>(&mut self, predicate: F) -> usize
    where
        F: Fn(&BlockKey) -> bool,
    {
        let keys: Vec<BlockKey> = self.pending.keys().filter(|k| predicate(k)).cloned().collect();
        for key in &keys {
            self.pending.remove(key);
            self.mark_stale(key);
        }
        keys.len()
    }

    /// Number of tracked text units per state across all languages
    pub fn counts(&self) -> HashMap<BlockState, usize> {
        let mut counts = HashMap::new();
        for rows in self.languages.values() {
            for tracked in rows.iter().flatten().flatten() {
                *counts.entry(tracked.state).or_insert(0) += 1;
            }
        }
        counts
    }
}
