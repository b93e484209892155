//! Tests for Collection
//!
//! These tests verify:
//! - Decoding collection files (arrays only, records only)
//! - Lookup, selection and truncation in storage order
//! - Replace-on-set and first-match delete
//! - Collection name validation and file name parsing

use std::path::Path;

use flickdb::storage::{
    collection_path, parse_collection_name, validate_collection_name, Collection, Record,
};
use flickdb::ErrorKind;
use serde_json::json;

// =============================================================================
// Helper Functions
// =============================================================================

fn collection_with(entries: &[(&str, serde_json::Value)]) -> Collection {
    let mut collection = Collection::new("test");
    for (key, data) in entries {
        collection.upsert(key, data.clone());
    }
    collection
}

fn keys(list: &[&str]) -> Vec<String> {
    list.iter().map(|k| k.to_string()).collect()
}

// =============================================================================
// Decode Tests
// =============================================================================

#[test]
fn test_decode_empty_array() {
    let collection = Collection::decode("users", b"[]").unwrap();
    assert!(collection.is_empty());
    assert_eq!(collection.name(), "users");
}

#[test]
fn test_decode_records() {
    let bytes = br#"[{"key":"lasse","data":{"age":30}},{"key":"maria","data":[1,2]}]"#;
    let collection = Collection::decode("users", bytes).unwrap();

    assert_eq!(collection.len(), 2);
    assert_eq!(collection.records()[0], Record::new("lasse", json!({"age": 30})));
    assert_eq!(collection.get("maria"), Some(&json!([1, 2])));
}

#[test]
fn test_decode_missing_data_reads_as_null() {
    let collection = Collection::decode("users", br#"[{"key":"a"}]"#).unwrap();
    assert_eq!(collection.get("a"), Some(&serde_json::Value::Null));
}

#[test]
fn test_decode_object_is_corrupt() {
    let err = Collection::decode("users", br#"{"key":"a"}"#).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CorruptCollection);
    assert!(err.to_string().contains("not an array"));
}

#[test]
fn test_decode_invalid_json_is_corrupt() {
    let err = Collection::decode("users", b"[{\"key\":").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CorruptCollection);
}

#[test]
fn test_decode_non_record_element_is_corrupt() {
    let err = Collection::decode("users", br#"[{"key":"a","data":1}, 42]"#).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CorruptCollection);
}

#[test]
fn test_decode_keeps_extra_record_fields() {
    let bytes = br#"[{"key":"a","data":1,"owner":"lasse","tags":["x"]}]"#;
    let mut collection = Collection::decode("users", bytes).unwrap();
    assert_eq!(collection.records()[0].extra["owner"], json!("lasse"));

    collection.upsert("a", json!(2));
    let encoded: serde_json::Value = serde_json::from_slice(&collection.encode().unwrap()).unwrap();
    assert_eq!(
        encoded,
        json!([{"key": "a", "data": 2, "owner": "lasse", "tags": ["x"]}])
    );
}

#[test]
fn test_encode_is_compact_array() {
    let collection = collection_with(&[("a", json!({"x": 1}))]);
    let encoded = collection.encode().unwrap();
    assert_eq!(encoded, br#"[{"key":"a","data":{"x":1}}]"#.to_vec());
    assert!(!encoded.contains(&b'\n'));
}

// =============================================================================
// Read Tests
// =============================================================================

#[test]
fn test_get_first_match() {
    // Duplicates cannot be produced through upsert; build them via decode
    let bytes = br#"[{"key":"k","data":1},{"key":"k","data":2}]"#;
    let collection = Collection::decode("dups", bytes).unwrap();
    assert_eq!(collection.get("k"), Some(&json!(1)));
}

#[test]
fn test_get_missing_key() {
    let collection = collection_with(&[("a", json!(1))]);
    assert_eq!(collection.get("b"), None);
}

#[test]
fn test_select_storage_order() {
    let collection = collection_with(&[("a", json!(1)), ("b", json!(2)), ("c", json!(3))]);

    let result = collection.select(&keys(&["c", "a"]), 10);
    assert_eq!(result, vec![json!(1), json!(3)]);
}

#[test]
fn test_select_omits_absent_keys() {
    let collection = collection_with(&[("a", json!(1)), ("b", json!(2))]);

    let result = collection.select(&keys(&["a", "zzz"]), 10);
    assert_eq!(result, vec![json!(1)]);
}

#[test]
fn test_select_empty_keys() {
    let collection = collection_with(&[("a", json!(1))]);
    assert!(collection.select(&[], 10).is_empty());
}

#[test]
fn test_select_respects_limit() {
    let collection = collection_with(&[("a", json!(1)), ("b", json!(2)), ("c", json!(3))]);

    let result = collection.select(&keys(&["a", "b", "c"]), 2);
    assert_eq!(result, vec![json!(1), json!(2)]);

    assert!(collection.select(&keys(&["a"]), 0).is_empty());
}

#[test]
fn test_all_with_and_without_limit() {
    let collection = collection_with(&[("a", json!(1)), ("b", json!(2)), ("c", json!(3))]);

    assert_eq!(collection.all(None), vec![json!(1), json!(2), json!(3)]);
    assert_eq!(collection.all(Some(1)), vec![json!(1)]);
    assert_eq!(collection.all(Some(100)).len(), 3);
}

// =============================================================================
// Mutation Tests
// =============================================================================

#[test]
fn test_upsert_appends_new_key() {
    let mut collection = Collection::new("test");

    assert!(!collection.upsert("a", json!(1)));
    assert!(!collection.upsert("b", json!(2)));

    assert_eq!(collection.len(), 2);
    assert_eq!(collection.records()[1].key, "b");
}

#[test]
fn test_upsert_replaces_in_place() {
    let mut collection = collection_with(&[("a", json!(1)), ("b", json!(2))]);

    assert!(collection.upsert("a", json!({"new": true})));

    assert_eq!(collection.len(), 2);
    assert_eq!(collection.records()[0], Record::new("a", json!({"new": true})));
}

#[test]
fn test_remove_existing_and_missing() {
    let mut collection = collection_with(&[("a", json!(1)), ("b", json!(2))]);

    assert!(collection.remove("a"));
    assert!(!collection.remove("a"));
    assert_eq!(collection.len(), 1);
    assert_eq!(collection.get("b"), Some(&json!(2)));
}

#[test]
fn test_remove_only_first_duplicate() {
    let bytes = br#"[{"key":"k","data":1},{"key":"k","data":2}]"#;
    let mut collection = Collection::decode("dups", bytes).unwrap();

    assert!(collection.remove("k"));
    assert_eq!(collection.len(), 1);
    assert_eq!(collection.get("k"), Some(&json!(2)));
}

// =============================================================================
// Name Tests
// =============================================================================

#[test]
fn test_valid_collection_names() {
    for name in ["users", "user_data", "orders-2024", "v1.archive", "A9"] {
        assert!(validate_collection_name(name).is_ok(), "{} should be valid", name);
    }
}

#[test]
fn test_invalid_collection_names() {
    let too_long = "x".repeat(129);
    for name in ["", ".hidden", "..", "a/b", "..\\evil", "with space", "ü", too_long.as_str()] {
        let err = validate_collection_name(name).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation, "{:?} should be rejected", name);
    }
}

#[test]
fn test_collection_path() {
    let path = collection_path(Path::new("/data"), "users");
    assert_eq!(path, Path::new("/data/users.json"));
}

#[test]
fn test_parse_collection_name() {
    assert_eq!(
        parse_collection_name(Path::new("/data/users.json")),
        Some("users".to_string())
    );
    assert_eq!(parse_collection_name(Path::new("/data/users.json.tmp")), None);
    assert_eq!(parse_collection_name(Path::new("/data/notes.txt")), None);
    assert_eq!(parse_collection_name(Path::new("/data/.hidden.json")), None);
}
