//! Query plans and match sessions.
//!
//! A [`QueryPlan`] is the index-independent part of a query: the pattern and
//! its compiled plan tree. Binding it to an [`Index`] rewrites the tree into
//! posting list lookups; evaluating that yields the candidate records.

pub mod matcher;
pub mod session;

use tracing::trace;

pub use matcher::{is_literal_pattern, CompiledPattern, Matcher, RegexMatcher};
pub use session::QueryMatcher;

use crate::error::MatchError;
use crate::index::Index;
use crate::plan::{evaluate, propagate_nulls, rewrite_with_index, PlanCompiler, PlanNode};
use crate::RecordId;

/// A compiled regex query.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    pattern: String,
    /// Compiled plan with nulls already propagated.
    root: PlanNode,
}

impl QueryPlan {
    /// Compile `pattern` with the default plan compiler. Never fails.
    pub fn compile(pattern: &str) -> Self {
        Self::with_compiler(pattern, &PlanCompiler::default())
    }

    pub fn with_compiler(pattern: &str, compiler: &PlanCompiler) -> Self {
        let mut root = compiler.compile(pattern);
        propagate_nulls(&mut root);
        QueryPlan {
            pattern: pattern.to_string(),
            root,
        }
    }

    /// Compile `pattern` for both the index and `matcher`.
    ///
    /// Pattern errors from the matcher are returned as is.
    pub fn with_matcher<M: Matcher>(
        pattern: &str,
        matcher: &M,
    ) -> Result<(Self, M::Compiled), MatchError> {
        let compiled = matcher.compile(pattern)?;
        Ok((Self::compile(pattern), compiled))
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn root(&self) -> &PlanNode {
        &self.root
    }

    /// True if the plan carries no literal, so no index can narrow it.
    pub fn is_unconstrained(&self) -> bool {
        self.root.is_null()
    }

    /// The plan rewritten against `index`: every literal is replaced by its
    /// covering keys and nulls are propagated again.
    pub fn prepare(&self, index: &Index) -> PlanNode {
        let mut bound = self.root.clone();
        rewrite_with_index(&mut bound, index);
        trace!(pattern = %self.pattern, plan = %bound, "query plan prepared");
        bound
    }

    /// Candidate record ids, or `None` when every record must be scanned.
    pub fn candidates(&self, index: &Index) -> Option<Vec<RecordId>> {
        evaluate(&self.prepare(index), index)
    }
}
