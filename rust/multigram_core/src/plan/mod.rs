//! Boolean plans over the literal skeleton of a regex.
//!
//! - **compile** — regex string -> [`PlanNode`] tree
//! - **rewrite** — null propagation and index rewriting
//! - **eval** — evaluate a rewritten tree against posting lists

pub mod compile;
pub mod eval;
pub mod rewrite;

use std::fmt;

pub use compile::PlanCompiler;
pub use eval::evaluate;
pub use rewrite::{propagate_nulls, rewrite_with_index};

/// A node of a query plan. Each node owns its children.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PlanNode {
    /// Both sides must hold.
    And(Box<PlanNode>, Box<PlanNode>),
    /// At least one side must hold.
    Or(Box<PlanNode>, Box<PlanNode>),
    /// The record must contain these bytes.
    Literal(Vec<u8>),
    /// No information; every record may match.
    #[default]
    Null,
}

impl PlanNode {
    pub fn and(left: PlanNode, right: PlanNode) -> Self {
        PlanNode::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: PlanNode, right: PlanNode) -> Self {
        PlanNode::Or(Box::new(left), Box::new(right))
    }

    pub fn literal(text: impl Into<Vec<u8>>) -> Self {
        PlanNode::Literal(text.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, PlanNode::Null)
    }

    /// Literal leaves, left to right.
    pub fn literals(&self) -> Vec<&[u8]> {
        let mut out = Vec::new();
        self.collect_literals(&mut out);
        out
    }

    fn collect_literals<'a>(&'a self, out: &mut Vec<&'a [u8]>) {
        match self {
            PlanNode::And(left, right) | PlanNode::Or(left, right) => {
                left.collect_literals(out);
                right.collect_literals(out);
            }
            PlanNode::Literal(text) => out.push(text),
            PlanNode::Null => {}
        }
    }

    /// Number of nodes in the tree.
    pub fn size(&self) -> usize {
        match self {
            PlanNode::And(left, right) | PlanNode::Or(left, right) => {
                1 + left.size() + right.size()
            }
            PlanNode::Literal(_) | PlanNode::Null => 1,
        }
    }

    fn label(&self) -> String {
        match self {
            PlanNode::And(..) => "AND".to_string(),
            PlanNode::Or(..) => "OR".to_string(),
            PlanNode::Literal(text) => format!("{:?}", String::from_utf8_lossy(text)),
            PlanNode::Null => "NULL".to_string(),
        }
    }

    fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, prefix: &str, last: bool) -> fmt::Result {
        writeln!(f, "{prefix}{}{}", if last { "└── " } else { "├── " }, self.label())?;
        if let PlanNode::And(left, right) | PlanNode::Or(left, right) = self {
            let child_prefix = format!("{prefix}{}", if last { "    " } else { "│   " });
            left.fmt_tree(f, &child_prefix, false)?;
            right.fmt_tree(f, &child_prefix, true)?;
        }
        Ok(())
    }
}

/// Renders the tree, one node per line.
impl fmt::Display for PlanNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_tree(f, "", true)
    }
}
