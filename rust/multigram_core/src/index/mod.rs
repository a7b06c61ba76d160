//! Selective multigram index.
//!
//! # Architecture
//!
//! - **select** — grow grams by length, indexing each at its first selective length
//! - **suffix** — optional suffix-free refinement of the selected keys
//! - **posting** — posting list construction and sorted-list algebra
//! - **parallel** — sharded counting and classification for selection
//! - **counts** — the shared gram counter map used by parallel selection
//! - **pool** — fixed worker pool over static shards
//!
//! The key set is prefix-free: scanning from any position, at most one key
//! matches. Posting lists and [`Index::covering_keys`] both rely on this.

pub mod counts;
pub mod parallel;
pub mod pool;
pub mod posting;
pub mod select;
pub mod suffix;

use std::fmt;
use std::time::Instant;

use tracing::info;

pub use posting::{intersect, union, PostingListBuilder, PostingMap};
pub use select::{is_prefix_free, GramSelector, IndexKeySet};
pub use suffix::suffix_free;

use crate::config::IndexConfig;
use crate::error::ConfigError;
use crate::plan::PlanCompiler;
use crate::RecordId;
use pool::WorkerPool;

/// Size summary of a built index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    pub records: usize,
    pub keys: usize,
    /// Total number of ids over all posting lists.
    pub postings: usize,
    /// Approximate heap footprint of keys and posting lists.
    pub bytes_used: usize,
}

/// Immutable key -> posting list index over a borrowed dataset.
#[derive(Debug, Clone)]
pub struct Index {
    postings: PostingMap,
    max_key_len: usize,
    record_count: usize,
    config: IndexConfig,
}

impl Index {
    /// Select keys and build posting lists for `dataset`.
    ///
    /// The configuration is validated before any work is done.
    pub fn build<S: AsRef<str> + Sync>(
        dataset: &[S],
        config: &IndexConfig,
    ) -> Result<Self, ConfigError> {
        let selector = GramSelector::new(config)?;
        check_dataset_len(dataset.len())?;
        let start = Instant::now();

        let index = if config.threads > 1 {
            let pool = WorkerPool::new(config.threads)?;
            let keys = selector.select_parallel(dataset, &pool);
            let postings = PostingListBuilder::new(&keys, config.upper_k)
                .build_parallel(dataset, &pool);
            Self::from_postings(postings, dataset.len(), config.clone())
        } else {
            let keys = selector.select(dataset);
            let postings = PostingListBuilder::new(&keys, config.upper_k).build(dataset);
            Self::from_postings(postings, dataset.len(), config.clone())
        };

        let stats = index.stats();
        info!(
            records = stats.records,
            keys = stats.keys,
            postings = stats.postings,
            bytes_used = stats.bytes_used,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "index built"
        );
        Ok(index)
    }

    /// Single-threaded build with the given threshold and gram length bound.
    pub fn with_threshold<S: AsRef<str> + Sync>(
        dataset: &[S],
        threshold: f64,
        upper_k: usize,
    ) -> Result<Self, ConfigError> {
        Self::build(dataset, &IndexConfig::new(threshold, upper_k))
    }

    /// Build with `threads` workers.
    pub fn build_parallel<S: AsRef<str> + Sync>(
        dataset: &[S],
        threshold: f64,
        upper_k: usize,
        threads: usize,
    ) -> Result<Self, ConfigError> {
        Self::build(
            dataset,
            &IndexConfig::new(threshold, upper_k).with_threads(threads),
        )
    }

    /// Build posting lists for a key set chosen elsewhere.
    ///
    /// `keys` must be prefix-free, with every key between 1 and `upper_k`
    /// bytes long; any selection heuristic that satisfies that contract can
    /// feed the query side. Other key sets are rejected.
    pub fn from_keys<S: AsRef<str>>(
        dataset: &[S],
        keys: &IndexKeySet,
        upper_k: usize,
    ) -> Result<Self, ConfigError> {
        if upper_k == 0 {
            return Err(ConfigError::InvalidUpperK(upper_k));
        }
        if keys.iter().any(Vec::is_empty) || !is_prefix_free(keys) {
            return Err(ConfigError::KeysNotPrefixFree);
        }
        if let Some(len) = keys.iter().map(Vec::len).find(|&len| len > upper_k) {
            return Err(ConfigError::KeyTooLong { len, upper_k });
        }
        check_dataset_len(dataset.len())?;
        let postings = PostingListBuilder::new(keys, upper_k).build(dataset);
        let mut config = IndexConfig::default().with_upper_k(upper_k);
        config.threshold = 1.0;
        Ok(Self::from_postings(postings, dataset.len(), config))
    }

    fn from_postings(postings: PostingMap, record_count: usize, config: IndexConfig) -> Self {
        let max_key_len = postings.keys().map(Vec::len).max().unwrap_or(0);
        Index {
            postings,
            max_key_len,
            record_count,
            config,
        }
    }

    /// Ascending ids of the records containing `key`. Empty if `key` is not
    /// an index key.
    pub fn posting_list(&self, key: impl AsRef<[u8]>) -> &[RecordId] {
        self.postings
            .get(key.as_ref())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn contains_key(&self, key: impl AsRef<[u8]>) -> bool {
        self.postings.contains_key(key.as_ref())
    }

    /// The index keys occurring in `text`, in order of first occurrence.
    ///
    /// Any record containing `text` contains every returned key.
    pub fn covering_keys(&self, text: impl AsRef<[u8]>) -> Vec<&[u8]> {
        let text = text.as_ref();
        let mut found: Vec<&[u8]> = Vec::new();
        for pos in 0..text.len() {
            let longest = self.max_key_len.min(text.len() - pos);
            for k in 1..=longest {
                if let Some((key, _)) = self.postings.get_key_value(&text[pos..pos + k]) {
                    if !found.contains(&key.as_slice()) {
                        found.push(key.as_slice());
                    }
                    // At most one key starts at a position.
                    break;
                }
            }
        }
        found
    }

    /// Covering keys of every literal the plan compiler extracts from
    /// `pattern`.
    pub fn find_all_keys(&self, pattern: &str) -> Vec<&[u8]> {
        let plan = PlanCompiler::default().compile(pattern);
        let mut found: Vec<&[u8]> = Vec::new();
        for literal in plan.literals() {
            for key in self.covering_keys(literal) {
                if !found.contains(&key) {
                    found.push(key);
                }
            }
        }
        found
    }

    /// Keys in byte order.
    pub fn keys(&self) -> Vec<&[u8]> {
        let mut keys: Vec<&[u8]> = self.postings.keys().map(Vec::as_slice).collect();
        keys.sort_unstable();
        keys
    }

    pub fn num_keys(&self) -> usize {
        self.postings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    pub fn record_count(&self) -> usize {
        self.record_count
    }

    pub fn max_key_len(&self) -> usize {
        self.max_key_len
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn stats(&self) -> IndexStats {
        let ptr = std::mem::size_of::<usize>();
        let mut postings = 0;
        // Map buckets plus the map header.
        let mut bytes_used = self.postings.capacity() * ptr + 4 * ptr;
        for (key, ids) in &self.postings {
            postings += ids.len();
            bytes_used += std::mem::size_of::<Vec<u8>>() + key.capacity();
            bytes_used += std::mem::size_of::<Vec<RecordId>>()
                + ids.capacity() * std::mem::size_of::<RecordId>();
        }
        IndexStats {
            records: self.record_count,
            keys: self.postings.len(),
            postings,
            bytes_used,
        }
    }

    /// One line per key with the length of its posting list.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "records: {}, keys: {}\n",
            self.record_count,
            self.num_keys()
        );
        for key in self.keys() {
            out.push_str(&format!(
                "{:?}: {} records\n",
                String::from_utf8_lossy(key),
                self.posting_list(key).len()
            ));
        }
        out
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "records: {}, keys: {}",
            self.record_count,
            self.num_keys()
        )?;
        for key in self.keys() {
            writeln!(
                f,
                "{:?}: {:?}",
                String::from_utf8_lossy(key),
                self.posting_list(key)
            )?;
        }
        Ok(())
    }
}

fn check_dataset_len(len: usize) -> Result<(), ConfigError> {
    if RecordId::try_from(len).is_err() {
        return Err(ConfigError::DatasetTooLarge(len));
    }
    Ok(())
}
