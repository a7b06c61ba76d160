//! Selectivity-driven gram selection.
//!
//! Grams are grown one byte at a time. A gram is indexed at the first length
//! at which it is selective enough; otherwise it goes into the expand set and
//! is only extended, never indexed. A key is therefore never extended from an
//! indexed prefix, which keeps the key set prefix-free.

use std::collections::BTreeSet;
use std::time::Instant;

use ahash::{AHashMap, AHashSet};
use tracing::{debug, info};

use super::parallel;
use super::pool::WorkerPool;
use super::suffix::suffix_free;
use crate::config::IndexConfig;
use crate::error::ConfigError;

/// The selected index keys, in byte order.
pub type IndexKeySet = BTreeSet<Vec<u8>>;

/// Grams too frequent at their current length.
pub(crate) type GramSet = AHashSet<Vec<u8>>;

/// Grams split into `(indexed, expand)`.
pub(crate) type Split = (Vec<Vec<u8>>, Vec<Vec<u8>>);

/// Returns true if no key is a proper prefix of another key.
pub fn is_prefix_free(keys: &IndexKeySet) -> bool {
    // In byte order a key is directly followed by one of its extensions, if
    // it has any.
    keys.iter()
        .zip(keys.iter().skip(1))
        .all(|(a, b)| !b.starts_with(a))
}

/// Chooses a prefix-free key set by measured selectivity.
#[derive(Debug, Clone)]
pub struct GramSelector {
    threshold: f64,
    upper_k: usize,
    suffix_free: bool,
    max_keys: Option<usize>,
}

impl GramSelector {
    pub fn new(config: &IndexConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(GramSelector {
            threshold: config.threshold,
            upper_k: config.upper_k,
            suffix_free: config.suffix_free,
            max_keys: config.max_keys,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn upper_k(&self) -> usize {
        self.upper_k
    }

    /// Select keys on the calling thread.
    pub fn select<S: AsRef<str>>(&self, dataset: &[S]) -> IndexKeySet {
        let start = Instant::now();
        let total = dataset.len();
        if total == 0 {
            return IndexKeySet::new();
        }

        let (unigrams, bigrams) = count_uni_bigrams(dataset);
        let unigram_split = self.split(
            unigrams.iter().map(|(c, n)| (std::slice::from_ref(c), *n)),
            total,
        );
        let (mut keys, expand) = self.first_pass(unigram_split, |uni_expand| {
            self.split(
                bigrams
                    .iter()
                    .filter(|(bigram, _)| uni_expand.contains(&bigram[0]))
                    .map(|(bigram, n)| (bigram.as_slice(), *n)),
                total,
            )
        });

        self.grow(&mut keys, expand, |expand, k| {
            let counts = count_extensions(dataset, expand, k);
            self.split(counts.iter().map(|(g, n)| (g.as_slice(), *n)), total)
        });

        self.finish(keys, start, 1)
    }

    /// Select keys with every counting and classification step spread over
    /// `pool`. Yields the same key set as [`select`](Self::select).
    pub fn select_parallel<S: AsRef<str> + Sync>(
        &self,
        dataset: &[S],
        pool: &WorkerPool,
    ) -> IndexKeySet {
        let start = Instant::now();
        let total = dataset.len();
        if total == 0 {
            return IndexKeySet::new();
        }

        let (unigrams, bigrams) = parallel::count_uni_bigrams(dataset, pool);
        let unigram_split = parallel::split_partitioned(self, &unigrams, total, pool, |_| true);
        let (mut keys, expand) = self.first_pass(unigram_split, |uni_expand| {
            parallel::split_partitioned(self, &bigrams, total, pool, |bigram| {
                uni_expand.contains(&bigram[0])
            })
        });

        self.grow(&mut keys, expand, |expand, k| {
            let counts = parallel::count_extensions(dataset, expand, k, pool);
            parallel::split_partitioned(self, &counts, total, pool, |_| true)
        });

        self.finish(keys, start, pool.threads())
    }

    /// Whether a gram found in `count` of `total` records may be indexed.
    pub(crate) fn is_selective(&self, count: u32, total: usize) -> bool {
        f64::from(count) / total as f64 <= self.threshold
    }

    /// Classify counted grams into indexed keys and grams to expand.
    pub(crate) fn split<'g, I>(&self, grams: I, total: usize) -> Split
    where
        I: IntoIterator<Item = (&'g [u8], u32)>,
    {
        let mut indexed = Vec::new();
        let mut expand = Vec::new();
        for (gram, count) in grams {
            if self.is_selective(count, total) {
                indexed.push(gram.to_vec());
            } else {
                expand.push(gram.to_vec());
            }
        }
        (indexed, expand)
    }

    /// Combine the unigram split with the split of bigrams whose first byte
    /// was too frequent on its own.
    fn first_pass<F>(&self, unigrams: Split, split_bigrams: F) -> (IndexKeySet, GramSet)
    where
        F: FnOnce(&AHashSet<u8>) -> Split,
    {
        let (indexed, too_frequent) = unigrams;
        let mut keys: IndexKeySet = indexed.into_iter().collect();
        let mut expand = GramSet::default();

        if self.upper_k >= 2 && !too_frequent.is_empty() {
            let uni_expand: AHashSet<u8> = too_frequent.iter().map(|g| g[0]).collect();
            let (indexed, too_frequent) = split_bigrams(&uni_expand);
            keys.extend(indexed);
            expand.extend(too_frequent);
        }

        debug!(keys = keys.len(), expand = expand.len(), "unigram/bigram pass");
        (keys, expand)
    }

    /// Run the `k = 3..=upper_k` passes. `step` counts the extensions of the
    /// expand set at length `k` and splits them.
    fn grow<F>(&self, keys: &mut IndexKeySet, mut expand: GramSet, mut step: F)
    where
        F: FnMut(&GramSet, usize) -> Split,
    {
        let mut k = 3;
        while !expand.is_empty() && k <= self.upper_k {
            if self.at_capacity(keys) {
                debug!(k, keys = keys.len(), "max_keys reached, stopping selection");
                break;
            }

            let (indexed, too_frequent) = step(&expand, k);
            debug!(
                k,
                indexed = indexed.len(),
                expand = too_frequent.len(),
                "gram length pass"
            );
            keys.extend(indexed);
            expand = too_frequent.into_iter().collect();
            k += 1;
        }
    }

    fn at_capacity(&self, keys: &IndexKeySet) -> bool {
        self.max_keys.is_some_and(|max| keys.len() >= max)
    }

    fn finish(&self, mut keys: IndexKeySet, start: Instant, threads: usize) -> IndexKeySet {
        let selected = keys.len();
        if self.suffix_free {
            suffix_free(&mut keys);
        }
        info!(
            threshold = self.threshold,
            upper_k = self.upper_k,
            threads,
            selected,
            keys = keys.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "gram selection finished"
        );
        keys
    }
}

/// Call `unigram` once per distinct byte of `bytes` and `bigram` once per
/// distinct byte pair.
pub(crate) fn visit_uni_bigrams<U, B>(bytes: &[u8], mut unigram: U, mut bigram: B)
where
    U: FnMut(u8),
    B: FnMut([u8; 2]),
{
    let mut seen_unigrams = [false; 256];
    for &c in bytes {
        if !seen_unigrams[usize::from(c)] {
            seen_unigrams[usize::from(c)] = true;
            unigram(c);
        }
    }

    let mut seen_bigrams: AHashSet<[u8; 2]> = AHashSet::new();
    for pair in bytes.windows(2) {
        let pair = [pair[0], pair[1]];
        if seen_bigrams.insert(pair) {
            bigram(pair);
        }
    }
}

/// Call `visit` once per distinct `k`-gram of `bytes` whose `(k-1)`-prefix
/// is in `expand`. `seen` is cleared first and used for de-duplication.
pub(crate) fn visit_extensions<'r, F>(
    bytes: &'r [u8],
    expand: &GramSet,
    k: usize,
    seen: &mut AHashSet<&'r [u8]>,
    mut visit: F,
) where
    F: FnMut(&'r [u8]),
{
    seen.clear();
    for gram in bytes.windows(k) {
        if expand.contains(&gram[..k - 1]) && seen.insert(gram) {
            visit(gram);
        }
    }
}

/// Distinct-record counts of every unigram and bigram.
fn count_uni_bigrams<S: AsRef<str>>(dataset: &[S]) -> (AHashMap<u8, u32>, AHashMap<[u8; 2], u32>) {
    let mut unigrams: AHashMap<u8, u32> = AHashMap::new();
    let mut bigrams: AHashMap<[u8; 2], u32> = AHashMap::new();
    for record in dataset {
        visit_uni_bigrams(
            record.as_ref().as_bytes(),
            |c| *unigrams.entry(c).or_insert(0) += 1,
            |pair| *bigrams.entry(pair).or_insert(0) += 1,
        );
    }
    (unigrams, bigrams)
}

/// Distinct-record counts of the `k`-grams extending the expand set.
fn count_extensions<S: AsRef<str>>(
    dataset: &[S],
    expand: &GramSet,
    k: usize,
) -> AHashMap<Vec<u8>, u32> {
    let mut counts: AHashMap<Vec<u8>, u32> = AHashMap::new();
    let mut seen = AHashSet::new();
    for record in dataset {
        visit_extensions(record.as_ref().as_bytes(), expand, k, &mut seen, |gram| {
            match counts.get_mut(gram) {
                Some(count) => *count += 1,
                None => {
                    counts.insert(gram.to_vec(), 1);
                }
            }
        });
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(items: &[&str]) -> IndexKeySet {
        items.iter().map(|s| s.as_bytes().to_vec()).collect()
    }

    fn digits_dataset() -> Vec<&'static str> {
        vec!["0.aaaaa", "1.bbbbb", "2.ccccc", "3.ddddd", "4.eeeee", "5.fffff"]
    }

    #[test]
    fn test_threshold_one_indexes_every_unigram() {
        let selector = GramSelector::new(&IndexConfig::new(1.0, 2)).unwrap();
        let selected = selector.select(&digits_dataset());
        assert_eq!(
            selected,
            keys(&["0", "1", "2", "3", "4", "5", ".", "a", "b", "c", "d", "e", "f"])
        );
    }

    #[test]
    fn test_frequent_unigram_is_extended() {
        let selector = GramSelector::new(&IndexConfig::new(0.9, 2)).unwrap();
        let selected = selector.select(&digits_dataset());
        assert!(!selected.contains(b".".as_slice()));
        for key in [".a", ".b", ".c", ".d", ".e", ".f"] {
            assert!(selected.contains(key.as_bytes()), "missing {key}");
        }
        // Extensions of an indexed unigram are never tested.
        assert!(!selected.contains(b"0.".as_slice()));
        assert!(is_prefix_free(&selected));
    }

    #[test]
    fn test_upper_k_one_only_tests_unigrams() {
        let selector = GramSelector::new(&IndexConfig::new(0.9, 1)).unwrap();
        let selected = selector.select(&digits_dataset());
        assert!(selected.iter().all(|k| k.len() == 1));
        assert!(!selected.contains(b".".as_slice()));
    }

    #[test]
    fn test_longer_grams_are_grown() {
        // "ab" is in every record, "abc" only in one.
        let dataset = ["abc", "abd", "abe", "abf"];
        let selector = GramSelector::new(&IndexConfig::new(0.5, 3)).unwrap();
        let selected = selector.select(&dataset);
        assert!(selected.contains(b"c".as_slice()));
        assert!(!selected.contains(b"a".as_slice()));
        assert!(!selected.contains(b"ab".as_slice()));
        // "ab" expands to the four 3-grams, each in a quarter of the records.
        for key in ["abc", "abd", "abe", "abf"] {
            assert!(selected.contains(key.as_bytes()), "missing {key}");
        }
        assert!(is_prefix_free(&selected));
    }

    #[test]
    fn test_repeated_grams_count_once_per_record() {
        // 'a' appears many times but only in one of two records.
        let dataset = ["aaaaaaaa", "b"];
        let selector = GramSelector::new(&IndexConfig::new(0.5, 2)).unwrap();
        let selected = selector.select(&dataset);
        assert!(selected.contains(b"a".as_slice()));
        assert!(selected.contains(b"b".as_slice()));
    }

    #[test]
    fn test_single_byte_records_are_counted() {
        let dataset = ["x", "y", "y"];
        let selector = GramSelector::new(&IndexConfig::new(0.5, 2)).unwrap();
        let selected = selector.select(&dataset);
        assert!(selected.contains(b"x".as_slice()));
        assert!(!selected.contains(b"y".as_slice()));
    }

    #[test]
    fn test_max_keys_stops_growth() {
        let dataset = ["abc", "abd", "abe", "abf"];
        let config = IndexConfig::new(0.5, 3).with_max_keys(1);
        let selected = GramSelector::new(&config).unwrap().select(&dataset);
        // The first pass already produced keys, so no 3-grams are explored.
        assert!(selected.iter().all(|k| k.len() <= 2));
    }

    #[test]
    fn test_empty_dataset_selects_nothing() {
        let selector = GramSelector::new(&IndexConfig::default()).unwrap();
        let empty: [&str; 0] = [];
        assert!(selector.select(&empty).is_empty());
    }

    #[test]
    fn test_invalid_config_is_rejected_up_front() {
        assert!(GramSelector::new(&IndexConfig::new(0.0, 3)).is_err());
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let dataset: Vec<String> = (0..200)
            .map(|i| format!("record-{i} value={} tag={}", i * 7 % 13, i % 5))
            .collect();
        let config = IndexConfig::new(0.05, 6);
        let selector = GramSelector::new(&config).unwrap();
        let pool = WorkerPool::new(4).unwrap();
        assert_eq!(selector.select(&dataset), selector.select_parallel(&dataset, &pool));
    }

    #[test]
    fn test_prefix_free_detection() {
        assert!(is_prefix_free(&keys(&["ab", "ac", "b"])));
        assert!(!is_prefix_free(&keys(&["a", "ab"])));
        assert!(!is_prefix_free(&keys(&["a", "aa", "b"])));
        assert!(is_prefix_free(&IndexKeySet::new()));
    }
}
