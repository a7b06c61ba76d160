//! Shared gram occurrence counters for parallel selection.

use std::sync::atomic::{AtomicU32, Ordering};

use ahash::AHashMap;
use parking_lot::RwLock;

/// Concurrent `gram -> record count` map behind a single reader/writer lock.
///
/// Incrementing an existing gram only takes the shared lock; the exclusive
/// lock is taken to insert a gram seen for the first time.
#[derive(Debug, Default)]
pub struct ConcurrentGramCounts {
    counts: RwLock<AHashMap<Vec<u8>, AtomicU32>>,
}

impl ConcurrentGramCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one to the count of `gram`.
    pub fn increment(&self, gram: &[u8]) {
        {
            let counts = self.counts.read();
            if let Some(count) = counts.get(gram) {
                count.fetch_add(1, Ordering::Relaxed);
                return;
            }
        }

        let mut counts = self.counts.write();
        // Another worker may have inserted it between the two locks.
        match counts.get(gram) {
            Some(count) => {
                count.fetch_add(1, Ordering::Relaxed);
            }
            None => {
                counts.insert(gram.to_vec(), AtomicU32::new(1));
            }
        }
    }

    /// Consume the map into `(gram, count)` pairs sorted by gram.
    pub fn into_sorted(self) -> Vec<(Vec<u8>, u32)> {
        let mut entries: Vec<(Vec<u8>, u32)> = self
            .counts
            .into_inner()
            .into_iter()
            .map(|(gram, count)| (gram, count.into_inner()))
            .collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}
