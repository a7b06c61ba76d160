//! Regex -> plan tree compilation.
//!
//! Only the literal and boolean skeleton of a pattern is kept. Anything the
//! compiler cannot express degrades to [`PlanNode::Null`], which costs
//! selectivity but never drops a match. Malformed input is not an error.

use tracing::trace;

use super::PlanNode;

/// Unescaped bytes that disqualify a span from being a literal.
pub const DEFAULT_METACHARS: &[u8] = b"{[^$.*+?|()]}";

/// Compiles regex strings into [`PlanNode`] trees.
#[derive(Debug, Clone)]
pub struct PlanCompiler {
    metachars: Vec<u8>,
    /// Bytes that denote a class or an assertion when escaped (`\d`, `\b`, ...).
    class_escapes: Vec<u8>,
}

impl Default for PlanCompiler {
    fn default() -> Self {
        let class_escapes: Vec<u8> = (0u8..=127).filter(u8::is_ascii_alphanumeric).collect();
        PlanCompiler::new(DEFAULT_METACHARS, class_escapes)
    }
}

impl PlanCompiler {
    pub fn new(metachars: impl Into<Vec<u8>>, class_escapes: impl Into<Vec<u8>>) -> Self {
        PlanCompiler {
            metachars: metachars.into(),
            class_escapes: class_escapes.into(),
        }
    }

    pub fn metachars(&self) -> &[u8] {
        &self.metachars
    }

    pub fn class_escapes(&self) -> &[u8] {
        &self.class_escapes
    }

    /// Compile `pattern` into a raw plan. Nulls are not propagated yet.
    pub fn compile(&self, pattern: &str) -> PlanNode {
        let bytes = pattern.as_bytes();
        // Inline flags such as (?i) change how every later literal matches.
        let plan = if has_inline_flags(bytes) {
            PlanNode::Null
        } else {
            self.compile_span(bytes)
        };
        trace!(pattern, nodes = plan.size(), "plan compiled");
        plan
    }

    fn compile_span(&self, span: &[u8]) -> PlanNode {
        if span.is_empty() {
            return PlanNode::Null;
        }

        let bars = top_level_bars(span);
        if bars.is_empty() {
            return self.compile_concat(span);
        }

        let mut alternatives = Vec::with_capacity(bars.len() + 1);
        let mut start = 0;
        for bar in bars {
            alternatives.push(self.compile_span(&span[start..bar]));
            start = bar + 1;
        }
        alternatives.push(self.compile_span(&span[start..]));
        alternatives
            .into_iter()
            .reduce(PlanNode::or)
            .unwrap_or_default()
    }

    /// AND together the literal runs and groups of a span with no top-level `|`.
    fn compile_concat(&self, span: &[u8]) -> PlanNode {
        let mut parts = Vec::new();
        let mut start = 0;

        while let Some(open) = next_group_open(span, start) {
            if open > start {
                parts.push(self.compile_leaf(&span[start..open]));
            }
            let Some(close) = matching_paren(span, open) else {
                // Unterminated group: the rest is one final span.
                parts.push(self.compile_leaf(&span[open..]));
                start = span.len();
                break;
            };
            let (required, end) = group_quantifier(span, close + 1);
            parts.push(if required {
                self.compile_group(&span[open + 1..close])
            } else {
                PlanNode::Null
            });
            start = end;
        }
        if start < span.len() {
            parts.push(self.compile_leaf(&span[start..]));
        }

        parts.into_iter().reduce(PlanNode::and).unwrap_or_default()
    }

    fn compile_group(&self, inner: &[u8]) -> PlanNode {
        let body = match inner {
            [b'?', b':', rest @ ..] => rest,
            [b'?', b'P', b'<', rest @ ..] | [b'?', b'<', rest @ ..]
                if !matches!(rest.first(), Some(b'=' | b'!')) =>
            {
                match memchr::memchr(b'>', rest) {
                    Some(end) => &rest[end + 1..],
                    None => return PlanNode::Null,
                }
            }
            // Lookaround and scoped flags.
            [b'?', ..] => return PlanNode::Null,
            _ => inner,
        };
        self.compile_span(body)
    }

    fn compile_leaf(&self, span: &[u8]) -> PlanNode {
        if span.is_empty() || !self.is_plain_literal(span) {
            return PlanNode::Null;
        }
        PlanNode::Literal(unescape(span))
    }

    /// True if `span` has no unescaped metacharacter and no escaped class byte.
    fn is_plain_literal(&self, span: &[u8]) -> bool {
        let mut pos = 0;
        while pos < span.len() {
            if span[pos] == b'\\' {
                match span.get(pos + 1) {
                    Some(escaped) if !self.class_escapes.contains(escaped) => pos += 2,
                    _ => return false,
                }
            } else if self.metachars.contains(&span[pos]) {
                return false;
            } else {
                pos += 1;
            }
        }
        true
    }
}

fn unescape(span: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(span.len());
    let mut pos = 0;
    while pos < span.len() {
        if span[pos] == b'\\' && pos + 1 < span.len() {
            pos += 1;
        }
        out.push(span[pos]);
        pos += 1;
    }
    out
}

/// Walks the bytes of a pattern that carry structure: escape pairs and
/// bracket classes are skipped whole.
struct Structural<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Structural<'a> {
    fn at(bytes: &'a [u8], pos: usize) -> Self {
        Structural { bytes, pos }
    }
}

impl Iterator for Structural<'_> {
    type Item = (usize, u8);

    fn next(&mut self) -> Option<(usize, u8)> {
        loop {
            let &byte = self.bytes.get(self.pos)?;
            match byte {
                b'\\' => self.pos += 2,
                b'[' => self.pos = skip_class(self.bytes, self.pos),
                _ => {
                    self.pos += 1;
                    return Some((self.pos - 1, byte));
                }
            }
        }
    }
}

/// Position just past the class opened at `open`, or the end of input.
fn skip_class(bytes: &[u8], open: usize) -> usize {
    let mut depth = 0usize;
    let mut pos = open;
    while pos < bytes.len() {
        match bytes[pos] {
            b'[' => {
                depth += 1;
                pos += 1;
                if bytes.get(pos) == Some(&b'^') {
                    pos += 1;
                }
                // A leading ']' is a literal member, nested classes included.
                if bytes.get(pos) == Some(&b']') {
                    pos += 1;
                }
                continue;
            }
            b'\\' => pos += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return pos + 1;
                }
            }
            _ => {}
        }
        pos += 1;
    }
    bytes.len()
}

fn top_level_bars(span: &[u8]) -> Vec<usize> {
    let mut depth = 0usize;
    let mut bars = Vec::new();
    for (pos, byte) in Structural::at(span, 0) {
        match byte {
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            b'|' if depth == 0 => bars.push(pos),
            _ => {}
        }
    }
    bars
}

fn next_group_open(span: &[u8], start: usize) -> Option<usize> {
    Structural::at(span, start)
        .find(|&(_, byte)| byte == b'(')
        .map(|(pos, _)| pos)
}

fn matching_paren(span: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (pos, byte) in Structural::at(span, open) {
        match byte {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(pos);
                }
            }
            _ => {}
        }
    }
    None
}

/// Reads the quantifiers (if any) starting at `pos`. Returns whether the
/// group must occur and the position after the last quantifier.
fn group_quantifier(span: &[u8], mut pos: usize) -> (bool, usize) {
    let mut required = true;
    let mut lazy_allowed = false;
    loop {
        let (step_required, end) = match span.get(pos) {
            Some(b'?') if lazy_allowed => {
                lazy_allowed = false;
                pos += 1;
                continue;
            }
            Some(b'*' | b'?') => (false, pos + 1),
            Some(b'+') => (true, pos + 1),
            Some(b'{') => match memchr::memchr(b'}', &span[pos..]) {
                Some(offset) => (repeat_required(&span[pos + 1..pos + offset]), pos + offset + 1),
                // Not a repetition; the brace stays in the next span.
                None => break,
            },
            _ => break,
        };
        // Stacked quantifiers: optional if any of them is.
        required &= step_required;
        lazy_allowed = true;
        pos = end;
    }
    (required, pos)
}

/// True if the `{m}` / `{m,}` / `{m,n}` body has a minimum of at least one.
fn repeat_required(body: &[u8]) -> bool {
    let min = body.split(|&b| b == b',').next().unwrap_or_default();
    !min.is_empty() && min.iter().all(u8::is_ascii_digit) && min.iter().any(|&d| d != b'0')
}

/// True if the pattern contains a bare flag group such as `(?i)` or `(?-s)`.
fn has_inline_flags(bytes: &[u8]) -> bool {
    Structural::at(bytes, 0).any(|(pos, byte)| {
        if byte != b'(' || bytes.get(pos + 1) != Some(&b'?') {
            return false;
        }
        let flags = bytes[pos + 2..]
            .iter()
            .take_while(|&&b| b.is_ascii_alphabetic() || b == b'-')
            .count();
        flags > 0 && bytes.get(pos + 2 + flags) == Some(&b')')
    })
}
