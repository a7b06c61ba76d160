//! Parallel counting and classification steps for gram selection.
//!
//! Counting writes into one shared [`ConcurrentGramCounts`] map per pass.
//! Classification splits the sorted counts into one sub-range per worker;
//! each worker fills its own output vectors, which are concatenated after
//! the join.

use ahash::AHashSet;

use super::counts::ConcurrentGramCounts;
use super::pool::WorkerPool;
use super::select::{visit_extensions, visit_uni_bigrams, GramSelector, GramSet, Split};

/// Sorted `(gram, distinct record count)` pairs.
pub(crate) type SortedCounts = Vec<(Vec<u8>, u32)>;

/// Count unigrams and bigrams over every shard of the dataset.
pub(crate) fn count_uni_bigrams<S: AsRef<str> + Sync>(
    dataset: &[S],
    pool: &WorkerPool,
) -> (SortedCounts, SortedCounts) {
    let unigrams = ConcurrentGramCounts::new();
    let bigrams = ConcurrentGramCounts::new();

    pool.for_each_shard(dataset.len(), |range| {
        for record in &dataset[range] {
            visit_uni_bigrams(
                record.as_ref().as_bytes(),
                |c| unigrams.increment(&[c]),
                |pair| bigrams.increment(&pair),
            );
        }
    });

    (unigrams.into_sorted(), bigrams.into_sorted())
}

/// Count the `k`-grams extending `expand` over every shard of the dataset.
pub(crate) fn count_extensions<S: AsRef<str> + Sync>(
    dataset: &[S],
    expand: &GramSet,
    k: usize,
    pool: &WorkerPool,
) -> SortedCounts {
    let counts = ConcurrentGramCounts::new();

    pool.for_each_shard(dataset.len(), |range| {
        let mut seen = AHashSet::new();
        for record in &dataset[range] {
            visit_extensions(record.as_ref().as_bytes(), expand, k, &mut seen, |gram| {
                counts.increment(gram)
            });
        }
    });

    counts.into_sorted()
}

/// Classify `counts` (restricted to grams passing `keep`) with one worker per
/// contiguous sub-range.
pub(crate) fn split_partitioned<F>(
    selector: &GramSelector,
    counts: &[(Vec<u8>, u32)],
    total: usize,
    pool: &WorkerPool,
    keep: F,
) -> Split
where
    F: Fn(&[u8]) -> bool + Sync,
{
    let parts = pool.map_shards(counts.len(), |range| {
        selector.split(
            counts[range]
                .iter()
                .filter(|(gram, _)| keep(gram))
                .map(|(gram, count)| (gram.as_slice(), *count)),
            total,
        )
    });

    let mut indexed = Vec::new();
    let mut expand = Vec::new();
    for (part_indexed, part_expand) in parts {
        indexed.extend(part_indexed);
        expand.extend(part_expand);
    }
    (indexed, expand)
}
