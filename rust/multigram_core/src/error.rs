//! Error types for index construction and query matching.
//!
//! Plan compilation never fails: patterns it cannot understand degrade to
//! an unconstrained plan instead.

use thiserror::Error;

/// Invalid build configuration, reported before any work starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("selectivity threshold must be in (0, 1], got {0}")]
    InvalidThreshold(f64),

    #[error("upper gram length must be at least 1, got {0}")]
    InvalidUpperK(usize),

    #[error("thread count must be at least 1, got {0}")]
    InvalidThreadCount(usize),

    #[error("max_keys bound must be at least 1")]
    InvalidMaxKeys,

    #[error("index keys must be non-empty and prefix-free")]
    KeysNotPrefixFree,

    #[error("index key of {len} bytes exceeds the upper gram length {upper_k}")]
    KeyTooLong { len: usize, upper_k: usize },

    #[error("dataset of {0} records exceeds the record id range")]
    DatasetTooLarge(usize),

    #[error("dataset has {dataset} records but the index was built over {index}")]
    DatasetMismatch { index: usize, dataset: usize },

    #[error("failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors raised by the regex matcher collaborator.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("invalid pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Crate-level error.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Match(#[from] MatchError),
}

pub type Result<T> = std::result::Result<T, Error>;
