//! Match sessions over an index and the dataset it was built from.

use std::collections::hash_map::Entry;
use std::time::Instant;

use ahash::AHashMap;
use tracing::debug;

use super::matcher::{Matcher, RegexMatcher};
use super::QueryPlan;
use crate::error::{ConfigError, Result};
use crate::index::Index;
use crate::RecordId;

/// A query compiled for both the index and the matcher.
struct PreparedQuery<C> {
    plan: QueryPlan,
    candidates: Option<Vec<RecordId>>,
    compiled: C,
}

/// Runs regex queries against a dataset, scanning only index candidates.
///
/// Compiled queries are cached by pattern for the life of the session.
pub struct QueryMatcher<'a, S, M: Matcher = RegexMatcher> {
    index: &'a Index,
    dataset: &'a [S],
    matcher: M,
    cache: AHashMap<String, PreparedQuery<M::Compiled>>,
}

impl<'a, S: AsRef<str>> QueryMatcher<'a, S, RegexMatcher> {
    /// Session using the `regex` crate.
    pub fn new(index: &'a Index, dataset: &'a [S]) -> Result<Self> {
        Self::with_matcher(index, dataset, RegexMatcher::default())
    }
}

impl<'a, S: AsRef<str>, M: Matcher> QueryMatcher<'a, S, M> {
    /// Fails if `dataset` is not the size of the dataset `index` was built over.
    pub fn with_matcher(index: &'a Index, dataset: &'a [S], matcher: M) -> Result<Self> {
        if index.record_count() != dataset.len() {
            return Err(ConfigError::DatasetMismatch {
                index: index.record_count(),
                dataset: dataset.len(),
            }
            .into());
        }
        Ok(QueryMatcher {
            index,
            dataset,
            matcher,
            cache: AHashMap::new(),
        })
    }

    /// Compile and cache `pattern` without running it.
    pub fn add_query(&mut self, pattern: &str) -> Result<()> {
        prepare(&mut self.cache, self.index, &self.matcher, pattern)?;
        Ok(())
    }

    /// The cached plan for `pattern`, if it has been added or run.
    pub fn plan(&self, pattern: &str) -> Option<&QueryPlan> {
        self.cache.get(pattern).map(|prepared| &prepared.plan)
    }

    pub fn cached_queries(&self) -> usize {
        self.cache.len()
    }

    /// Number of records matching `pattern`.
    pub fn match_one(&mut self, pattern: &str) -> Result<usize> {
        Ok(self.matching_ids(pattern)?.len())
    }

    /// Ascending ids of the records matching `pattern`.
    pub fn matching_ids(&mut self, pattern: &str) -> Result<Vec<RecordId>> {
        let start = Instant::now();
        let prepared = prepare(&mut self.cache, self.index, &self.matcher, pattern)?;
        let dataset = self.dataset;
        let matcher = &self.matcher;
        let is_match = |id: RecordId| {
            matcher.partial_match(&prepared.compiled, dataset[id as usize].as_ref())
        };

        let ids: Vec<RecordId> = match &prepared.candidates {
            Some(candidates) => candidates.iter().copied().filter(|&id| is_match(id)).collect(),
            // Index gave no help: scan everything.
            None => (0..dataset.len() as RecordId).filter(|&id| is_match(id)).collect(),
        };

        debug!(
            pattern,
            scanned = prepared.candidates.as_ref().map_or(dataset.len(), Vec::len),
            matches = ids.len(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "query matched"
        );
        Ok(ids)
    }

    /// Match count of every pattern, in input order.
    pub fn match_all(&mut self, patterns: &[&str]) -> Result<Vec<(String, usize)>> {
        patterns
            .iter()
            .map(|pattern| Ok((pattern.to_string(), self.match_one(pattern)?)))
            .collect()
    }
}

fn prepare<'c, M: Matcher>(
    cache: &'c mut AHashMap<String, PreparedQuery<M::Compiled>>,
    index: &Index,
    matcher: &M,
    pattern: &str,
) -> Result<&'c PreparedQuery<M::Compiled>> {
    let prepared: &PreparedQuery<M::Compiled> = match cache.entry(pattern.to_string()) {
        Entry::Occupied(entry) => entry.into_mut(),
        Entry::Vacant(entry) => {
            let (plan, compiled) = QueryPlan::with_matcher(pattern, matcher)?;
            let candidates = plan.candidates(index);
            debug!(
                pattern,
                candidates = candidates.as_ref().map(Vec::len),
                "query cached"
            );
            entry.insert(PreparedQuery {
                plan,
                candidates,
                compiled,
            })
        }
    };
    Ok(prepared)
}
