mod helpers;

use std::collections::HashSet;

use jira_cache::cache::search_key::search_key;
use jira_cache::similarity::SimilarityIndex;

fn fields(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[test]
fn equivalent_searches_share_a_key() {
    let a = search_key("project = PROJ AND status = Open", &fields(&["summary", "status"]), 50, 0);
    let b = search_key(
        "  PROJECT = proj   and STATUS = open ",
        &fields(&["status", "Summary"]),
        50,
        0,
    );
    assert_eq!(a, b);
}

#[test]
fn limit_and_offset_change_the_key() {
    let f = fields(&["summary"]);
    let base = search_key("project = PROJ", &f, 50, 0);
    assert_ne!(base, search_key("project = PROJ", &f, 25, 0));
    assert_ne!(base, search_key("project = PROJ", &f, 50, 50));
}

#[test]
fn keyword_search_ranks_and_supports_operators() {
    let store = helpers::test_store();
    store.put_issue(&helpers::issue("PROJ-1", "Login fails on Safari", "Open")).unwrap();
    store.put_issue(&helpers::issue("PROJ-2", "Export reports as CSV", "Open")).unwrap();
    store.put_issue(&helpers::issue("PROJ-3", "Safari rendering glitch", "Open")).unwrap();

    let keys = |q: &str| -> Vec<String> {
        store
            .keyword_search(q, 10)
            .unwrap()
            .into_iter()
            .map(|i| i.key)
            .collect()
    };

    let safari = keys("safari");
    assert_eq!(safari.len(), 2);
    assert!(safari.contains(&"PROJ-1".to_string()));
    assert_eq!(keys("safari NOT login"), vec!["PROJ-3".to_string()]);
    assert_eq!(keys("\"export reports\""), vec!["PROJ-2".to_string()]);
    assert_eq!(keys("login OR csv").len(), 2);
}

#[test]
fn keyword_search_never_errors_on_bad_input() {
    let store = helpers::test_store();
    store.put_issue(&helpers::issue("PROJ-1", "Login", "Open")).unwrap();
    for q in ["", "   ", "\"unterminated", "AND OR", "(((", "login AND", "*"] {
        let result = store.keyword_search(q, 10);
        assert!(result.is_ok(), "query {q:?} raised");
        if q.trim().is_empty() {
            assert!(result.unwrap().is_empty());
        }
    }
}

#[test]
fn similarity_exclusion_still_fills_the_limit() {
    let store = helpers::test_store();
    let index = helpers::test_similarity(&store);
    assert!(index.is_available());

    for (key, text) in [
        ("PROJ-1", "safari login crash"),
        ("PROJ-2", "safari login timeout"),
        ("PROJ-3", "safari login button"),
        ("PROJ-4", "safari login redirect"),
        ("PROJ-5", "export csv report"),
        ("PROJ-6", "billing invoice totals"),
    ] {
        assert!(index.upsert(key, text).unwrap());
    }

    let top = index.query("safari login", 3, &HashSet::new()).unwrap();
    assert_eq!(top.len(), 3);

    let exclude: HashSet<String> = top[..2].iter().cloned().collect();
    let rest = index.query("safari login", 3, &exclude).unwrap();
    assert_eq!(rest.len(), 3);
    assert!(rest.iter().all(|k| !exclude.contains(k)));
}

#[test]
fn similarity_returns_fewer_only_when_corpus_is_small() {
    let store = helpers::test_store();
    let index = helpers::test_similarity(&store);
    index.upsert("PROJ-1", "alpha").unwrap();
    index.upsert("PROJ-2", "beta").unwrap();

    let exclude: HashSet<String> = ["PROJ-1".to_string()].into_iter().collect();
    assert_eq!(index.query("alpha", 5, &exclude).unwrap(), vec!["PROJ-2".to_string()]);
}

#[test]
fn prune_removes_vectors_for_missing_issues() {
    let store = helpers::test_store();
    let index = helpers::test_similarity(&store);
    store.put_issue(&helpers::issue("PROJ-1", "Login", "Open")).unwrap();
    index.upsert_issue("PROJ-1", "Login", "").unwrap();
    index.upsert_issue("PROJ-9", "Orphan", "").unwrap();

    assert_eq!(index.prune_orphans().unwrap(), 1);
    assert_eq!(index.count().unwrap(), 1);
}

#[test]
fn disabled_index_answers_empty() {
    let store = helpers::test_store();
    let index = SimilarityIndex::disabled(store.connection());
    assert!(index.query("anything", 5, &HashSet::new()).unwrap().is_empty());
    assert_eq!(index.count().unwrap(), 0);
}
