//! Fixed worker pool over statically sharded record ranges.
//!
//! Each shard is a contiguous range handed to exactly one task, so there is no
//! rebalancing between workers. Results come back in shard order.

use std::ops::Range;

use rayon::prelude::*;

use crate::error::ConfigError;

/// Split `len` items into at most `shards` contiguous, non-empty ranges.
///
/// The first `len % shards` ranges get one extra item.
pub fn shard_ranges(len: usize, shards: usize) -> Vec<Range<usize>> {
    let shards = shards.max(1).min(len.max(1));
    let base = len / shards;
    let extra = len % shards;

    let mut ranges = Vec::with_capacity(shards);
    let mut start = 0;
    for i in 0..shards {
        let size = base + usize::from(i < extra);
        ranges.push(start..start + size);
        start += size;
    }
    ranges
}

/// A pool of `threads` workers.
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    threads: usize,
}

impl WorkerPool {
    pub fn new(threads: usize) -> Result<Self, ConfigError> {
        if threads == 0 {
            return Err(ConfigError::InvalidThreadCount(threads));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("multigram-worker-{i}"))
            .build()?;
        Ok(WorkerPool { pool, threads })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Run `job` once per shard of `0..len` and collect the results in shard
    /// order. Blocks until every shard has finished.
    pub fn map_shards<T, F>(&self, len: usize, job: F) -> Vec<T>
    where
        T: Send,
        F: Fn(Range<usize>) -> T + Sync + Send,
    {
        let ranges = shard_ranges(len, self.threads);
        self.pool
            .install(|| ranges.into_par_iter().map(|range| job(range)).collect())
    }

    /// Like `map_shards`, for jobs that only write to shared state.
    pub fn for_each_shard<F>(&self, len: usize, job: F)
    where
        F: Fn(Range<usize>) + Sync + Send,
    {
        let ranges = shard_ranges(len, self.threads);
        self.pool
            .install(|| ranges.into_par_iter().for_each(|range| job(range)));
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.threads)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_shards_cover_range_in_order() {
        let ranges = shard_ranges(10, 3);
        assert_eq!(ranges, vec![0..4, 4..7, 7..10]);
    }

    #[test]
    fn test_more_shards_than_items() {
        let ranges = shard_ranges(2, 8);
        assert_eq!(ranges, vec![0..1, 1..2]);
    }

    #[test]
    fn test_empty_input_gives_one_empty_shard() {
        assert_eq!(shard_ranges(0, 4), vec![0..0]);
    }

    #[test]
    fn test_map_shards_preserves_order() {
        let pool = WorkerPool::new(4).unwrap();
        let starts = pool.map_shards(100, |range| range.start);
        assert_eq!(starts, vec![0, 25, 50, 75]);
    }

    #[test]
    fn test_for_each_shard_visits_everything() {
        let pool = WorkerPool::new(3).unwrap();
        let seen = AtomicUsize::new(0);
        pool.for_each_shard(50, |range| {
            seen.fetch_add(range.len(), Ordering::Relaxed);
        });
        assert_eq!(seen.load(Ordering::Relaxed), 50);
    }

    #[test]
    fn test_zero_threads_rejected() {
        assert!(matches!(
            WorkerPool::new(0),
            Err(ConfigError::InvalidThreadCount(0))
        ));
    }
}
