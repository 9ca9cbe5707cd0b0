//! ABOUTME: Integration coverage of the store's documented testable properties
//! ABOUTME: Each test names the scenario it exercises; opens a fresh tempdir-backed store

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use facetstore::{
    Dimension, DimensionConfig, FacetError, Filters, FixedClock, ListOptions, Store, StoreOptions,
    UpdateRequest,
};
use serde_json::json;

fn open(path: &std::path::Path, dims: Vec<Dimension>) -> Store {
    // Best-effort: lets `RUST_LOG=debug cargo test -- --nocapture` show the
    // `#[tracing::instrument]` spans on Store's public methods. Ignored if
    // another test in this binary already installed a subscriber.
    let _ = tracing_subscriber::fmt::try_init();
    let config = DimensionConfig::new(dims).unwrap();
    Store::open(path, config).unwrap()
}

#[test]
fn title_boundary_lengths_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    let store = open(&path, vec![]);

    let empty = store.add("", "", BTreeMap::new()).unwrap();
    let long_title = "x".repeat(1_000_000);
    let big = store.add(&long_title, "", BTreeMap::new()).unwrap();

    let listed = store.list(&ListOptions::new()).unwrap();
    let empty_doc = listed.iter().find(|d| d.document.uuid == empty).unwrap();
    let big_doc = listed.iter().find(|d| d.document.uuid == big).unwrap();
    assert_eq!(empty_doc.document.title, "");
    assert_eq!(big_doc.document.title.len(), 1_000_000);
}

#[test]
fn hierarchy_of_depth_sixty_four_resolves() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    let store = open(&path, vec![Dimension::hierarchical("parent", "parent_uuid")]);

    let mut parent = store.add("root", "", BTreeMap::new()).unwrap();
    for depth in 0..64 {
        let mut dims = BTreeMap::new();
        dims.insert("parent_uuid".to_string(), json!(parent.to_string()));
        parent = store.add(&format!("level-{depth}"), "", dims).unwrap();
    }

    let listed = store.list(&ListOptions::new()).unwrap();
    assert_eq!(listed.len(), 65);
    let deepest = listed.iter().find(|d| d.document.uuid == parent).unwrap();
    // A 65-segment chain (root + 64 levels) needs at least 64 dots.
    assert!(deepest.simple_id.matches('.').count() >= 63);
}

#[test]
fn save_reopen_list_yields_the_same_documents() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    {
        let store = open(&path, vec![Dimension::enumerated("priority", ["low", "high"])]);
        let mut dims = BTreeMap::new();
        dims.insert("priority".to_string(), json!("high"));
        store.add("first", "body-1", dims).unwrap();
        store.add("second", "body-2", BTreeMap::new()).unwrap();
    }

    let reopened = open(&path, vec![Dimension::enumerated("priority", ["low", "high"])]);
    let listed = reopened.list(&ListOptions::new()).unwrap();
    assert_eq!(listed.len(), 2);
    let titles: Vec<&str> = listed.iter().map(|d| d.document.title.as_str()).collect();
    assert!(titles.contains(&"first"));
    assert!(titles.contains(&"second"));
}

#[test]
fn delete_by_dimension_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    let store = open(&path, vec![Dimension::enumerated("status", ["open", "closed"])]);

    let mut dims = BTreeMap::new();
    dims.insert("status".to_string(), json!("closed"));
    store.add("t1", "", dims.clone()).unwrap();
    store.add("t2", "", dims).unwrap();

    let filters = Filters::new().eq("status", "closed");
    let first = store.delete_by_dimension(&filters).unwrap();
    assert_eq!(first, 2);
    let second = store.delete_by_dimension(&filters).unwrap();
    assert_eq!(second, 0);
}

#[test]
fn preprocessor_tolerates_an_unresolvable_forward_reference() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    let store = open(&path, vec![Dimension::hierarchical("parent", "parent_id")]);

    let mut dims = BTreeMap::new();
    dims.insert("parent_id".to_string(), json!("99"));
    let uuid = store.add("x", "", dims).unwrap();

    let listed = store.list(&ListOptions::new()).unwrap();
    let doc = listed.iter().find(|d| d.document.uuid == uuid).unwrap();
    assert_eq!(doc.document.dimensions.get("parent_id").unwrap(), "99");
    // Unresolved forward reference: the document is a root on this listing.
    assert_eq!(doc.simple_id, "1");
}

#[test]
fn filter_set_membership_returns_exactly_the_matching_subset() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    let store = open(
        &path,
        vec![Dimension::enumerated("priority", ["low", "normal", "high"])],
    );

    for priority in ["low", "normal", "normal", "high"] {
        let mut dims = BTreeMap::new();
        dims.insert("priority".to_string(), json!(priority));
        store.add("t", "", dims).unwrap();
    }

    let listed = store
        .list(&ListOptions::new().filter(Filters::new().any_of("priority", ["low", "high"])))
        .unwrap();
    assert_eq!(listed.len(), 2);
}

#[test]
fn empty_sequence_filter_matches_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    let store = open(&path, vec![Dimension::enumerated("priority", ["low"])]);
    let mut dims = BTreeMap::new();
    dims.insert("priority".to_string(), json!("low"));
    store.add("t", "", dims).unwrap();

    let listed = store
        .list(&ListOptions::new().filter(Filters::new().any_of("priority", Vec::<String>::new())))
        .unwrap();
    assert!(listed.is_empty());
}

#[test]
fn update_with_no_fields_set_is_a_payload_noop_but_bumps_updated_at() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    let clock = Arc::new(FixedClock::new(Utc::now()));
    let config = DimensionConfig::new(vec![]).unwrap();
    let store = Store::open_with_clock(StoreOptions::new(&path, config), clock.clone()).unwrap();

    let uuid = store.add("t", "b", BTreeMap::new()).unwrap();
    let before = store.list(&ListOptions::new()).unwrap();
    let created = before[0].document.updated_at;

    clock.tick(chrono::Duration::seconds(1));
    store.update(&uuid.to_string(), UpdateRequest::new()).unwrap();

    let after = store.list(&ListOptions::new()).unwrap();
    assert_eq!(after[0].document.title, "t");
    assert_eq!(after[0].document.body, "b");
    assert!(after[0].document.updated_at > created);
}

#[test]
fn five_independent_instances_see_identical_documents_and_ids() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    {
        let store = open(&path, vec![]);
        for i in 0..10 {
            store.add(&format!("doc-{i}"), "", BTreeMap::new()).unwrap();
        }
    }

    let mut reference: Option<Vec<(String, String)>> = None;
    for _ in 0..5 {
        let store = open(&path, vec![]);
        let listed = store.list(&ListOptions::new()).unwrap();
        let mut pairs: Vec<(String, String)> = listed
            .iter()
            .map(|d| (d.simple_id.clone(), d.document.title.clone()))
            .collect();
        pairs.sort();
        match &reference {
            None => reference = Some(pairs),
            Some(expected) => assert_eq!(&pairs, expected),
        }
    }
}

#[test]
fn delete_target_that_does_not_exist_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    let store = open(&path, vec![]);
    let err = store.delete("does-not-exist-1", false).unwrap_err();
    assert!(matches!(err, FacetError::NotFound(_)));
}
