/*!
 * Progress of the current synchronization run.
 */

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Completed/total counters for one run.
///
/// Each run gets an id; updates tagged with an older id are ignored, so a
/// superseded run cannot move the ratio of the current one.
#[derive(Debug, Default)]
pub struct RunProgress {
    run: AtomicU64,
    total: AtomicUsize,
    completed: AtomicUsize,
}

impl RunProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new run. Returns its id.
    pub fn reset(&self, total: usize, completed: usize) -> u64 {
        let run = self.run.fetch_add(1, Ordering::SeqCst) + 1;
        self.total.store(total, Ordering::SeqCst);
        self.completed.store(completed.min(total), Ordering::SeqCst);
        run
    }

    /// Record `count` finished units for run `run`
    pub fn advance(&self, run: u64, count: usize) {
        if self.run.load(Ordering::SeqCst) != run {
            return;
        }
        let total = self.total.load(Ordering::SeqCst);
        let _ = self
            .completed
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |done| Some((done + count).min(total)));
    }

    /// Completed/total in `[0, 1]`; 1.0 when the run has nothing to do
    pub fn ratio(&self) -> f32 {
        let total = self.total.load(Ordering::SeqCst);
        if total == 0 {
            return 1.0;
        }
        self.completed.load(Ordering::SeqCst) as f32 / total as f32
    }

    /// (completed, total)
    pub fn counts(&self) -> (usize, usize) {
        (
            self.completed.load(Ordering::SeqCst),
            self.total.load(Ordering::SeqCst),
        )
    }
}
