//! Selective multigram index for regex candidate filtering.
//!
//! The crate avoids a full regex scan over an in-memory corpus by first
//! narrowing the corpus down to a superset of the matching records.
//!
//! Modules:
//! - `config` — index build configuration and validation
//! - `error`  — error types
//! - `index`  — gram selection, posting lists, and sorted-list algebra
//! - `plan`   — regex-to-plan compilation and plan rewrites
//! - `query`  — query plans, the external matcher seam, and match sessions
//!
//! Two pipelines share the [`index::Index`] contract:
//!
//! ```text
//! dataset -> GramSelector -> IndexKeySet -> PostingListBuilder -> Index
//! regex -> PlanCompiler -> PlanNode -> null propagation -> index rewrite -> candidates
//! ```

pub mod config;
pub mod error;
pub mod index;
pub mod plan;
pub mod query;

/// Position of a record in the dataset the index was built over.
pub type RecordId = u32;

// Re-export key types for convenience.
pub use config::IndexConfig;
pub use error::{ConfigError, Error, MatchError, Result};
pub use index::{GramSelector, Index, IndexKeySet, IndexStats, PostingListBuilder};
pub use plan::{PlanCompiler, PlanNode};
pub use query::{Matcher, QueryMatcher, QueryPlan, RegexMatcher};
