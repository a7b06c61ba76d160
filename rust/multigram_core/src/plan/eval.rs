//! Plan evaluation against posting lists.

use std::borrow::Cow;

use super::PlanNode;
use crate::index::posting::{intersect_all, union_all};
use crate::index::Index;
use crate::RecordId;

/// Candidate record ids for a rewritten plan.
///
/// `None` means the index gives no help and every record must be scanned.
/// `Some` is a sorted, duplicate-free superset of the true matches.
pub fn evaluate(node: &PlanNode, index: &Index) -> Option<Vec<RecordId>> {
    eval(node, index).map(Cow::into_owned)
}

fn eval<'i>(node: &PlanNode, index: &'i Index) -> Option<Cow<'i, [RecordId]>> {
    match node {
        PlanNode::Literal(key) => Some(Cow::Borrowed(index.posting_list(key))),
        PlanNode::And(..) => {
            // An unconstrained operand does not narrow the others.
            let mut lists: Vec<Cow<'i, [RecordId]>> = operands(node)
                .into_iter()
                .filter_map(|child| eval(child, index))
                .collect();
            if lists.len() <= 1 {
                return lists.pop();
            }
            let slices: Vec<&[RecordId]> = lists.iter().map(|list| &**list).collect();
            Some(Cow::Owned(intersect_all(&slices)))
        }
        PlanNode::Or(..) => {
            let lists = operands(node)
                .into_iter()
                .map(|child| eval(child, index))
                .collect::<Option<Vec<_>>>()?;
            let slices: Vec<&[RecordId]> = lists.iter().map(|list| &**list).collect();
            Some(Cow::Owned(union_all(&slices)))
        }
        PlanNode::Null => None,
    }
}

/// Operands of a chain of same-kind nodes rooted at `node`, left to right.
fn operands(node: &PlanNode) -> Vec<&PlanNode> {
    let mut out = Vec::new();
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        match (node, current) {
            (PlanNode::And(..), PlanNode::And(left, right))
            | (PlanNode::Or(..), PlanNode::Or(left, right)) => {
                stack.push(right);
                stack.push(left);
            }
            _ => out.push(current),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexKeySet;

    fn index() -> Index {
        let dataset = ["ab", "bc", "cd", "abcd"];
        let keys: IndexKeySet = ["a", "b", "c", "d"]
            .iter()
            .map(|k| k.as_bytes().to_vec())
            .collect();
        Index::from_keys(&dataset, &keys, 1).unwrap()
    }

    fn lit(text: &str) -> PlanNode {
        PlanNode::literal(text)
    }

    #[test]
    fn test_literal_is_its_posting_list() {
        assert_eq!(evaluate(&lit("b"), &index()), Some(vec![0, 1, 3]));
    }

    #[test]
    fn test_and_intersects_or_unions() {
        let index = index();
        assert_eq!(
            evaluate(&PlanNode::and(lit("a"), lit("d")), &index),
            Some(vec![3])
        );
        assert_eq!(
            evaluate(&PlanNode::or(lit("a"), lit("d")), &index),
            Some(vec![0, 2, 3])
        );
    }

    #[test]
    fn test_empty_operands() {
        let index = index();
        assert_eq!(
            evaluate(&PlanNode::and(lit("a"), lit("z")), &index),
            Some(vec![])
        );
        assert_eq!(
            evaluate(&PlanNode::or(lit("z"), lit("c")), &index),
            Some(vec![1, 2, 3])
        );
    }

    #[test]
    fn test_chains_are_flattened() {
        let index = index();
        let chain = PlanNode::and(
            lit("b"),
            PlanNode::and(PlanNode::or(lit("a"), lit("c")), PlanNode::and(lit("d"), PlanNode::Null)),
        );
        assert_eq!(operands(&chain).len(), 4);
        assert_eq!(evaluate(&chain, &index), Some(vec![3]));

        let any = PlanNode::or(lit("a"), PlanNode::or(lit("d"), PlanNode::or(lit("c"), lit("a"))));
        assert_eq!(operands(&any), vec![&lit("a"), &lit("d"), &lit("c"), &lit("a")]);
        assert_eq!(evaluate(&any, &index), Some(vec![0, 1, 2, 3]));

        let gap = PlanNode::or(lit("a"), PlanNode::or(lit("d"), PlanNode::Null));
        assert_eq!(evaluate(&gap, &index), None);
    }

    #[test]
    fn test_null_means_no_help() {
        let index = index();
        assert_eq!(evaluate(&PlanNode::Null, &index), None);
        assert_eq!(evaluate(&PlanNode::or(lit("a"), PlanNode::Null), &index), None);
        assert_eq!(
            evaluate(&PlanNode::and(PlanNode::Null, lit("c")), &index),
            Some(vec![1, 2, 3])
        );
    }
}
