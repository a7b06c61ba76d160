//! The regex engine seam.
//!
//! The index only narrows the dataset; a [`Matcher`] decides whether a
//! candidate record really matches.

use memchr::memmem;
use regex::RegexBuilder;

use crate::error::MatchError;

/// A regex engine able to test a pattern anywhere inside a record.
pub trait Matcher {
    type Compiled;

    /// Compile `pattern`, failing on invalid syntax.
    fn compile(&self, pattern: &str) -> Result<Self::Compiled, MatchError>;

    /// True if `compiled` matches some substring of `text`.
    fn partial_match(&self, compiled: &Self::Compiled, text: &str) -> bool;
}

/// Check if a pattern is a literal string (no regex metacharacters).
pub fn is_literal_pattern(pattern: &str) -> bool {
    !pattern.chars().any(|c| {
        matches!(
            c,
            '.' | '*' | '+' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '|' | '^' | '$' | '\\'
        )
    })
}

/// Search mode chosen at compile time.
#[derive(Debug, Clone)]
pub enum CompiledPattern {
    /// SIMD substring search for patterns without metacharacters.
    Literal(memmem::Finder<'static>),
    Regex(regex::Regex),
}

/// [`Matcher`] backed by the `regex` crate, with a memchr fast path for
/// literal patterns.
#[derive(Debug, Clone, Default)]
pub struct RegexMatcher {
    size_limit: Option<usize>,
}

impl RegexMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the compiled program size of each pattern, in bytes.
    pub fn with_size_limit(mut self, bytes: usize) -> Self {
        self.size_limit = Some(bytes);
        self
    }
}

impl Matcher for RegexMatcher {
    type Compiled = CompiledPattern;

    fn compile(&self, pattern: &str) -> Result<CompiledPattern, MatchError> {
        if is_literal_pattern(pattern) {
            return Ok(CompiledPattern::Literal(
                memmem::Finder::new(pattern.as_bytes()).into_owned(),
            ));
        }

        let mut builder = RegexBuilder::new(pattern);
        if let Some(limit) = self.size_limit {
            builder.size_limit(limit);
        }
        builder
            .build()
            .map(CompiledPattern::Regex)
            .map_err(|source| MatchError::Pattern {
                pattern: pattern.to_string(),
                source,
            })
    }

    fn partial_match(&self, compiled: &CompiledPattern, text: &str) -> bool {
        match compiled {
            CompiledPattern::Literal(finder) => finder.find(text.as_bytes()).is_some(),
            CompiledPattern::Regex(regex) => regex.is_match(text),
        }
    }
}
