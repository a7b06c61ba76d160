//! Tree rewrites applied between compilation and evaluation.

use std::mem;

use tracing::trace;

use super::PlanNode;
use crate::index::Index;

/// Remove `Null` nodes bottom-up.
///
/// An `And` drops a `Null` operand. An `Or` with a `Null` operand becomes
/// `Null`, since the unconstrained side may match any record.
pub fn propagate_nulls(node: &mut PlanNode) {
    match node {
        PlanNode::And(left, right) => {
            propagate_nulls(left);
            propagate_nulls(right);
            let kept = if left.is_null() {
                mem::take(right.as_mut())
            } else if right.is_null() {
                mem::take(left.as_mut())
            } else {
                return;
            };
            *node = kept;
        }
        PlanNode::Or(left, right) => {
            propagate_nulls(left);
            propagate_nulls(right);
            if left.is_null() || right.is_null() {
                *node = PlanNode::Null;
            }
        }
        PlanNode::Literal(_) | PlanNode::Null => {}
    }
}

/// Replace each literal by the `And` of its covering index keys, or `Null`
/// if none cover it, then propagate nulls again.
pub fn rewrite_with_index(node: &mut PlanNode, index: &Index) {
    replace_literals(node, index);
    propagate_nulls(node);
    trace!(nodes = node.size(), "plan rewritten against index");
}

fn replace_literals(node: &mut PlanNode, index: &Index) {
    match node {
        PlanNode::And(left, right) | PlanNode::Or(left, right) => {
            replace_literals(left, index);
            replace_literals(right, index);
        }
        PlanNode::Literal(text) => {
            *node = index
                .covering_keys(text.as_slice())
                .into_iter()
                .map(|key| PlanNode::literal(key))
                .reduce(PlanNode::and)
                .unwrap_or_default();
        }
        PlanNode::Null => {}
    }
}
