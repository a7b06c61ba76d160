//! Posting list construction and sorted-list algebra.
//!
//! A posting list is the strictly ascending list of record ids containing a
//! key. Lists are built in record order, so appending only when the last id
//! differs keeps them sorted and duplicate-free.

use std::time::Instant;

use ahash::{AHashMap, AHashSet};
use tracing::info;

use super::pool::WorkerPool;
use super::select::IndexKeySet;
use crate::RecordId;

/// Key -> ascending record ids, as produced by [`PostingListBuilder`].
pub type PostingMap = AHashMap<Vec<u8>, Vec<RecordId>>;

/// Builds posting lists for a prefix-free key set.
#[derive(Debug)]
pub struct PostingListBuilder<'k> {
    keys: &'k IndexKeySet,
    lookup: AHashSet<&'k [u8]>,
    /// Longest length worth trying at a position.
    max_len: usize,
}

impl<'k> PostingListBuilder<'k> {
    pub fn new(keys: &'k IndexKeySet, upper_k: usize) -> Self {
        let longest = keys.iter().map(Vec::len).max().unwrap_or(0);
        PostingListBuilder {
            keys,
            lookup: keys.iter().map(Vec::as_slice).collect(),
            max_len: longest.min(upper_k),
        }
    }

    /// Build every posting list on the calling thread.
    pub fn build<S: AsRef<str>>(&self, dataset: &[S]) -> PostingMap {
        let start = Instant::now();
        let mut lists = self.empty_lists();
        self.scan(dataset, 0, &mut lists);

        let postings: PostingMap = lists
            .into_iter()
            .map(|(key, ids)| (key.to_vec(), ids))
            .collect();
        self.log_built(&postings, start, 1);
        postings
    }

    /// Build posting lists with the dataset sharded over `pool`, then merge
    /// the per-shard lists with the key set sharded over `pool`.
    pub fn build_parallel<S: AsRef<str> + Sync>(
        &self,
        dataset: &[S],
        pool: &WorkerPool,
    ) -> PostingMap {
        let start = Instant::now();

        let locals: Vec<AHashMap<&'k [u8], Vec<RecordId>>> =
            pool.map_shards(dataset.len(), |range| {
                let mut lists = AHashMap::new();
                self.scan(&dataset[range.clone()], range.start, &mut lists);
                lists
            });

        let keys: Vec<&'k Vec<u8>> = self.keys.iter().collect();
        let merged: Vec<Vec<(Vec<u8>, Vec<RecordId>)>> = pool.map_shards(keys.len(), |range| {
            keys[range]
                .iter()
                .map(|key| {
                    // Shards cover ascending, disjoint id ranges, so shard
                    // order is id order.
                    let mut ids = Vec::new();
                    for local in &locals {
                        if let Some(part) = local.get(key.as_slice()) {
                            ids.extend_from_slice(part);
                        }
                    }
                    ((*key).clone(), ids)
                })
                .collect()
        });

        let postings: PostingMap = merged.into_iter().flatten().collect();
        self.log_built(&postings, start, pool.threads());
        postings
    }

    fn empty_lists(&self) -> AHashMap<&'k [u8], Vec<RecordId>> {
        self.keys
            .iter()
            .map(|key| (key.as_slice(), Vec::new()))
            .collect()
    }

    /// Append the records of `records` (the first having id `first_id`) to
    /// the lists of the keys they contain.
    fn scan<S: AsRef<str>>(
        &self,
        records: &[S],
        first_id: usize,
        lists: &mut AHashMap<&'k [u8], Vec<RecordId>>,
    ) {
        for (offset, record) in records.iter().enumerate() {
            let id = (first_id + offset) as RecordId;
            let bytes = record.as_ref().as_bytes();
            for pos in 0..bytes.len() {
                let longest = self.max_len.min(bytes.len() - pos);
                for k in 1..=longest {
                    let gram = &bytes[pos..pos + k];
                    let Some(&key) = self.lookup.get(gram) else {
                        continue;
                    };
                    let ids = lists.entry(key).or_default();
                    if ids.last().map_or(true, |&last| last < id) {
                        ids.push(id);
                    }
                    // Prefix-free: no longer key can start here.
                    break;
                }
            }
        }
    }

    fn log_built(&self, postings: &PostingMap, start: Instant, threads: usize) {
        let entries: usize = postings.values().map(Vec::len).sum();
        info!(
            keys = postings.len(),
            entries,
            threads,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "posting lists built"
        );
    }
}

/// Intersect two ascending, duplicate-free id lists.
pub fn intersect(left: &[RecordId], right: &[RecordId]) -> Vec<RecordId> {
    let mut result = Vec::with_capacity(left.len().min(right.len()));
    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        match left[i].cmp(&right[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                if result.last() != Some(&left[i]) {
                    result.push(left[i]);
                }
                i += 1;
                j += 1;
            }
        }
    }
    result
}

/// Union two ascending id lists, collapsing repeated ids.
pub fn union(left: &[RecordId], right: &[RecordId]) -> Vec<RecordId> {
    let mut result: Vec<RecordId> = Vec::with_capacity(left.len() + right.len());
    let push = |id: RecordId, result: &mut Vec<RecordId>| {
        if result.last() != Some(&id) {
            result.push(id);
        }
    };

    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        match left[i].cmp(&right[j]) {
            std::cmp::Ordering::Less => {
                push(left[i], &mut result);
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                push(right[j], &mut result);
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                push(left[i], &mut result);
                i += 1;
                j += 1;
            }
        }
    }
    for &id in left[i..].iter().chain(&right[j..]) {
        push(id, &mut result);
    }
    result
}

/// Intersect any number of lists, smallest first.
///
/// Returns an empty list if no lists are given.
pub fn intersect_all(lists: &[&[RecordId]]) -> Vec<RecordId> {
    let mut ordered: Vec<&[RecordId]> = lists.to_vec();
    ordered.sort_by_key(|list| list.len());

    let Some((first, rest)) = ordered.split_first() else {
        return Vec::new();
    };
    let mut result = first.to_vec();
    for list in rest {
        // Early exit if intersection is empty.
        if result.is_empty() {
            break;
        }
        result = intersect(&result, list);
    }
    result
}

/// Union any number of lists.
pub fn union_all(lists: &[&[RecordId]]) -> Vec<RecordId> {
    lists
        .iter()
        .fold(Vec::new(), |acc, list| union(&acc, list))
}
