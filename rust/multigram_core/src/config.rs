//! Index build configuration.
//!
//! The selectivity threshold, the gram length bound, and the worker count are
//! passed explicitly to the builders. `validate()` runs before any selection,
//! so a bad value never surfaces mid-build.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default selectivity threshold.
pub const DEFAULT_THRESHOLD: f64 = 0.1;

/// Default upper bound on gram length.
pub const DEFAULT_UPPER_K: usize = 8;

/// Configuration for building an [`Index`](crate::index::Index).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// A gram is indexed once the fraction of records containing it is at
    /// most this value. Must be in `(0, 1]`.
    pub threshold: f64,
    /// Longest gram length explored during selection.
    pub upper_k: usize,
    /// Worker threads used for selection and posting construction.
    /// `1` runs everything on the calling thread.
    pub threads: usize,
    /// Drop keys that end with a shorter retained key.
    pub suffix_free: bool,
    /// Stop exploring longer grams once this many keys are selected.
    pub max_keys: Option<usize>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            threshold: DEFAULT_THRESHOLD,
            upper_k: DEFAULT_UPPER_K,
            threads: 1,
            suffix_free: false,
            max_keys: None,
        }
    }
}

impl IndexConfig {
    pub fn new(threshold: f64, upper_k: usize) -> Self {
        IndexConfig {
            threshold,
            upper_k,
            ..Default::default()
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_upper_k(mut self, upper_k: usize) -> Self {
        self.upper_k = upper_k;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_suffix_free(mut self, suffix_free: bool) -> Self {
        self.suffix_free = suffix_free;
        self
    }

    pub fn with_max_keys(mut self, max_keys: usize) -> Self {
        self.max_keys = Some(max_keys);
        self
    }

    /// Check every field against its allowed range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Written so that NaN fails too.
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(ConfigError::InvalidThreshold(self.threshold));
        }
        if self.upper_k == 0 {
            return Err(ConfigError::InvalidUpperK(self.upper_k));
        }
        if self.threads == 0 {
            return Err(ConfigError::InvalidThreadCount(self.threads));
        }
        if self.max_keys == Some(0) {
            return Err(ConfigError::InvalidMaxKeys);
        }
        Ok(())
    }

    /// Parse a config from JSON and validate it. Missing fields take their
    /// defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: IndexConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}
