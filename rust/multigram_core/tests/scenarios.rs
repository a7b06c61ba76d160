//! End-to-end scenarios: build an index, compile queries, match records.

use multigram_core::plan::propagate_nulls;
use multigram_core::{Index, IndexConfig, PlanCompiler, PlanNode, QueryMatcher, QueryPlan};

const REPEAT: usize = 10;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("multigram_core=debug")
        .with_test_writer()
        .try_init();
}

fn digits_dataset() -> Vec<&'static str> {
    vec!["0.aaaaa", "1.bbbbb", "2.ccccc", "3.ddddd", "4.eeeee", "5.fffff"]
}

/// Each key once, followed by every proper substring of it `REPEAT` times.
/// The keys themselves are the only grams rare enough to index.
fn dataset_with_keys(keys: &[&str]) -> Vec<String> {
    let mut dataset = Vec::new();
    for key in keys {
        dataset.push(key.to_string());
        for i in 0..key.len() {
            for j in i..key.len() {
                if i == 0 && j == key.len() - 1 {
                    break;
                }
                for _ in 0..REPEAT {
                    dataset.push(key[i..=j].to_string());
                }
            }
        }
    }
    dataset
}

/// The key dataset padded with decoys, plus "William" and "Bill.Clinton".
fn clinton_workload() -> (Vec<String>, f64) {
    let mut dataset = dataset_with_keys(&["Will", "liam", "Clint", "nton"]);
    let threshold = 4.0 / (42.0 + dataset.len() as f64);
    for _ in 0..REPEAT {
        for decoy in ["linto", "illi", "ton", "llia"] {
            dataset.push(decoy.to_string());
        }
    }
    dataset.push("William".to_string());
    dataset.push("Bill.Clinton".to_string());
    (dataset, threshold)
}

fn strings(keys: Vec<&[u8]>) -> Vec<String> {
    keys.into_iter()
        .map(|k| String::from_utf8_lossy(k).into_owned())
        .collect()
}

#[test]
fn test_threshold_one_indexes_every_unigram() {
    init_tracing();
    let index = Index::with_threshold(&digits_dataset(), 1.0, 2).unwrap();
    assert_eq!(index.posting_list("0"), &[0]);
    assert_eq!(index.posting_list("1"), &[1]);
    assert_eq!(index.posting_list("5"), &[5]);
    assert_eq!(index.posting_list("a"), &[0]);
    assert_eq!(index.posting_list("."), &[0, 1, 2, 3, 4, 5]);
}

#[test]
fn test_too_frequent_unigram_is_extended() {
    let index = Index::with_threshold(&digits_dataset(), 0.9, 2).unwrap();
    assert!(index.posting_list(".").is_empty());
    assert!(!index.contains_key("."));
    for (id, key) in [".a", ".b", ".c", ".d", ".e", ".f"].iter().enumerate() {
        assert_eq!(index.posting_list(key), &[id as u32]);
    }
    assert!(!index.contains_key("0."));
}

#[test]
fn test_suffix_free_drops_redundant_bigrams() {
    let config = IndexConfig::new(0.9, 2).with_suffix_free(true);
    let index = Index::build(&digits_dataset(), &config).unwrap();
    for (id, unigram) in ["a", "b", "c", "d", "e", "f"].iter().enumerate() {
        assert_eq!(index.posting_list(unigram), &[id as u32]);
        assert!(!index.contains_key(format!(".{unigram}")));
    }
}

#[test]
fn test_plan_for_alternation_with_wildcard_group() {
    let mut plan = PlanCompiler::default().compile("(Bill|William)(.*)Clinton");
    propagate_nulls(&mut plan);
    assert_eq!(
        plan,
        PlanNode::and(
            PlanNode::or(PlanNode::literal("Bill"), PlanNode::literal("William")),
            PlanNode::literal("Clinton"),
        )
    );
}

#[test]
fn test_find_keys_in_literals() {
    let dataset = dataset_with_keys(&["Will", "liam", "Clint", "nton"]);
    let threshold = (REPEAT as f64 - 1.0) / dataset.len() as f64;

    for threads in [1, 4] {
        let index = Index::build_parallel(&dataset, threshold, 5, threads).unwrap();
        assert!(index.find_all_keys("Bill").is_empty());

        let mut william = strings(index.find_all_keys("William"));
        william.sort();
        assert_eq!(william, vec!["Will", "liam"]);

        let mut clinton = strings(index.find_all_keys("Clinton"));
        clinton.sort();
        assert_eq!(clinton, vec!["Clint", "nton"]);
    }
}

#[test]
fn test_rewritten_plan_narrows_to_one_record() {
    init_tracing();
    let (dataset, threshold) = clinton_workload();
    assert_eq!(dataset.len(), 456);
    assert_eq!(dataset[455], "Bill.Clinton");

    let plain = IndexConfig::new(threshold, 5);
    let suffix_free = plain.clone().with_suffix_free(true);
    for config in [plain, suffix_free] {
        let index = Index::build(&dataset, &config).unwrap();
        let plan = QueryPlan::compile("(Bill|William)(.*)Clinton");
        assert_eq!(plan.candidates(&index), Some(vec![455]));
    }
}

#[test]
fn test_parallel_build_answers_like_sequential() {
    let (dataset, threshold) = clinton_workload();
    let sequential = Index::with_threshold(&dataset, threshold, 5).unwrap();
    let parallel = Index::build_parallel(&dataset, threshold, 5, 4).unwrap();
    assert_eq!(sequential.keys(), parallel.keys());

    let plan = QueryPlan::compile("(Bill|William)(.*)Clinton");
    assert_eq!(plan.candidates(&sequential), plan.candidates(&parallel));
}

#[test]
fn test_match_session_counts_true_matches() {
    let (dataset, threshold) = clinton_workload();
    let index = Index::with_threshold(&dataset, threshold, 5).unwrap();
    let mut session = QueryMatcher::new(&index, &dataset).unwrap();

    assert_eq!(session.match_one("(Bill|William)(.*)Clinton").unwrap(), 1);
    assert_eq!(session.matching_ids("William").unwrap(), vec![454]);

    let results = session
        .match_all(&["(Bill|William)(.*)Clinton", "TDT"])
        .unwrap();
    assert_eq!(
        results,
        vec![
            ("(Bill|William)(.*)Clinton".to_string(), 1),
            ("TDT".to_string(), 0),
        ]
    );
}

#[test]
fn test_unhelpful_plan_falls_back_to_full_scan() {
    let (dataset, threshold) = clinton_workload();
    let index = Index::with_threshold(&dataset, threshold, 5).unwrap();
    let plan = QueryPlan::compile("l+i");
    assert_eq!(plan.candidates(&index), None);

    let mut session = QueryMatcher::new(&index, &dataset).unwrap();
    let expected = dataset.iter().filter(|r| r.contains("li")).count();
    assert_eq!(session.match_one("l+i").unwrap(), expected);
}
