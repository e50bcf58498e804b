mod helpers;

use chrono::{Duration, Utc};
use serde_json::json;

use jira_cache::cache::counters::{read_counter, PURGED_ISSUES};
use jira_cache::cache::noise::strip_noise;
use jira_cache::cache::{AdaptiveTtl, NewSearch};

#[test]
fn freshness_holds_up_to_and_including_max_age() {
    let store = helpers::test_store();
    let written = Utc::now() - Duration::hours(1);
    store
        .put_issue_at(&helpers::issue("PROJ-1", "Login", "Open"), written)
        .unwrap();

    for (delta, max_age, expect_hit) in [
        (Duration::seconds(59), Duration::minutes(1), true),
        (Duration::seconds(60), Duration::minutes(1), true),
        (Duration::seconds(61), Duration::minutes(1), false),
        (Duration::days(3), Duration::MAX, true),
    ] {
        let hit = store
            .get_issue_as_of("PROJ-1", max_age, written + delta)
            .unwrap();
        assert_eq!(hit.is_some(), expect_hit, "delta={delta} max_age={max_age}");
    }
}

#[test]
fn put_then_get_round_trips_the_stripped_record() {
    let store = helpers::test_store();
    let raw = helpers::issue("PROJ-1", "Login", "Open");
    store.put_issue(&raw).unwrap();
    store.put_issue(&raw).unwrap();

    let cached = store.get_issue("PROJ-1", Duration::MAX).unwrap().unwrap();
    assert_eq!(cached.raw, strip_noise(&raw));
    assert!(cached.raw.get("self").is_none());
    assert!(cached.raw["fields"]["assignee"].get("avatarUrls").is_none());
    assert_eq!(cached.assignee.as_deref(), Some("Ada"));
    assert_eq!(cached.labels, vec!["backend".to_string()]);
}

#[test]
fn invalidated_issue_is_gone_until_rewritten() {
    let store = helpers::test_store();
    let raw = helpers::issue("PROJ-1", "Login", "Open");
    store.put_issue(&raw).unwrap();

    assert!(store.invalidate_issue("PROJ-1").unwrap());
    assert!(store.get_issue("PROJ-1", Duration::MAX).unwrap().is_none());
    assert!(store.get_issue_stale("PROJ-1").unwrap().is_none());
    assert!(store.keyword_search("login", 10).unwrap().is_empty());

    store.put_issue(&raw).unwrap();
    assert!(store.get_issue("PROJ-1", Duration::MAX).unwrap().is_some());
}

#[test]
fn zero_max_age_keeps_a_stale_fallback() {
    let store = helpers::test_store();
    store
        .put_issue(&helpers::issue("PROJ-1", "Login", "Open"))
        .unwrap();
    assert!(store.get_issue("PROJ-1", Duration::zero()).unwrap().is_none());
    assert!(store.get_issue_stale("PROJ-1").unwrap().is_some());
}

#[test]
fn purge_keeps_issue_exactly_at_threshold() {
    let store = helpers::test_store();
    let now = Utc::now();
    store
        .put_issue_at(&helpers::issue("PROJ-1", "At threshold", "Open"), now - Duration::days(7))
        .unwrap();
    store
        .put_issue_at(&helpers::issue("PROJ-2", "One day older", "Open"), now - Duration::days(8))
        .unwrap();
    store
        .put_issue_at(&helpers::issue("PROJ-3", "Fresh", "Open"), now)
        .unwrap();

    let result = store.purge_stale_as_of(now).unwrap();
    assert_eq!(result.issues_removed, 1);
    assert!(store.get_issue_stale("PROJ-1").unwrap().is_some());
    assert!(store.get_issue_stale("PROJ-2").unwrap().is_none());
    assert!(store.get_issue_stale("PROJ-3").unwrap().is_some());

    let conn = store.connection();
    let conn = conn.lock().unwrap();
    assert_eq!(read_counter(&conn, PURGED_ISSUES).unwrap(), 1);
}

#[test]
fn purge_drops_searches_after_twelve_hours() {
    let store = helpers::test_store();
    let now = Utc::now();
    let fields = vec!["summary".to_string()];
    let issues = vec![helpers::issue("PROJ-1", "Login", "Open")];
    let old = store
        .put_search_at(
            NewSearch {
                query: "project = PROJ",
                fields: &fields,
                limit: 50,
                offset: 0,
                total: 1,
                issues: &issues,
            },
            now - Duration::hours(13),
        )
        .unwrap();

    let result = store.purge_stale_as_of(now).unwrap();
    assert_eq!(result.searches_removed, 1);
    assert!(store.get_search_stale(&old).unwrap().is_none());
    // The contained issue is younger than the issue threshold and survives.
    assert!(store.get_issue_stale("PROJ-1").unwrap().is_some());
}

#[test]
fn done_outlives_in_progress_by_an_order_of_magnitude() {
    let store = helpers::test_store();
    store.put_issue(&helpers::issue("PROJ-1", "Shipped", "Done")).unwrap();
    store
        .put_issue(&helpers::issue("PROJ-2", "Ongoing", "In Progress"))
        .unwrap();

    let done = store.adaptive_ttl("PROJ-1").unwrap();
    let active = store.adaptive_ttl("PROJ-2").unwrap();
    assert!(done >= active * 10, "done={done} active={active}");
    assert_eq!(
        store.adaptive_ttl("PROJ-404").unwrap(),
        AdaptiveTtl::default().fallback()
    );
}

#[test]
fn stats_report_size_but_not_location() {
    let store = helpers::test_store();
    store.put_issue(&helpers::issue("PROJ-1", "Login", "Open")).unwrap();
    store.get_issue("PROJ-1", Duration::MAX).unwrap();
    store.get_issue("PROJ-2", Duration::MAX).unwrap();

    let stats = store.stats().unwrap();
    assert_eq!(stats.issues, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);

    let json = serde_json::to_value(&stats).unwrap();
    assert!(json.get("db_size_bytes").is_some());
    assert!(!json.to_string().contains("cache.db"));
}

#[test]
fn batch_put_skips_keyless_records() {
    let store = helpers::test_store();
    let written = store
        .put_issues(&[
            helpers::issue("PROJ-1", "One", "Open"),
            json!({"fields": {"summary": "no key"}}),
            helpers::issue("PROJ-2", "Two", "Open"),
        ])
        .unwrap();
    assert_eq!(written, 2);
}
