//! Atomic Collection Tests
//!
//! Array paths mutated through a document:
//! - every mutation marks the path modified
//! - same-kind operations merge, mixed kinds collapse to a full replacement
//! - atomic pop/shift run once per save generation
//! - element paths under a collection force a full replacement in dirty()

use chrono::{TimeZone, Utc};
use graphdoc::document::{AtomicOp, Document, PopEnd};
use graphdoc::schema::{Schema, SchemaKind, SchemaType};
use graphdoc::Value;
use serde_json::json;
use std::sync::Arc;

// =============================================================================
// Helper Functions
// =============================================================================

fn schema() -> Arc<Schema> {
    Arc::new(
        Schema::builder()
            .path("scores", SchemaType::array(SchemaKind::Number))
            .path("seen", SchemaType::array(SchemaKind::Date))
            .path("name", SchemaType::string())
            .build()
            .unwrap(),
    )
}

fn stored(raw: serde_json::Value) -> Document {
    let mut doc = Document::existing(schema(), None);
    doc.init(Value::from(raw));
    doc
}

fn numbers(items: &[i64]) -> Vec<Value> {
    items.iter().map(|&n| Value::from(n)).collect()
}

// =============================================================================
// Merge Tests
// =============================================================================

/// Two pushes merge into one push of both values.
#[test]
fn test_pushes_merge() {
    let mut doc = stored(json!({"scores": [1]}));
    {
        let mut scores = doc.array_mut("scores").unwrap();
        scores.push(numbers(&[2])).unwrap();
        scores.push(vec![Value::from("3")]).unwrap();
    }

    assert!(doc.is_direct_modified("scores"));
    let scores = doc.array("scores").unwrap();
    assert_eq!(scores.as_slice(), numbers(&[1, 2, 3]).as_slice());
    assert_eq!(scores.atomics(), Some(&AtomicOp::Push(numbers(&[2, 3]))));
}

/// A push followed by a pull becomes a full replacement.
#[test]
fn test_push_then_pull_collapses() {
    let mut doc = stored(json!({"scores": [1, 2]}));
    {
        let mut scores = doc.array_mut("scores").unwrap();
        scores.push(numbers(&[3])).unwrap();
        assert_eq!(scores.pull(numbers(&[3])).unwrap(), 1);
    }

    let dirty = doc.dirty();
    assert_eq!(dirty.len(), 1);
    assert_eq!(dirty[0].atomic, Some(AtomicOp::Set));
    assert_eq!(dirty[0].value, Some(Value::Array(numbers(&[1, 2]))));
}

/// add_to_set only appends absent values; dates compare by millisecond.
#[test]
fn test_add_to_set_with_dates() {
    let mut doc = stored(json!({"seen": [1000]}));
    let same_instant = Utc.timestamp_millis_opt(1000).unwrap();
    let later = Utc.timestamp_millis_opt(2000).unwrap();

    let added = doc
        .array_mut("seen")
        .unwrap()
        .add_to_set(vec![Value::Date(same_instant), Value::from(2000)])
        .unwrap();

    assert_eq!(added, vec![Value::Date(later)]);
    assert_eq!(doc.array("seen").unwrap().len(), 2);
    assert!(matches!(
        doc.array("seen").unwrap().atomics(),
        Some(AtomicOp::AddToSet(_))
    ));
}

/// Element casts that fail return the error without marking anything.
#[test]
fn test_push_cast_failure() {
    let mut doc = stored(json!({"scores": []}));
    let err = doc
        .array_mut("scores")
        .unwrap()
        .push(vec![Value::from("many")])
        .unwrap_err();

    assert_eq!(err.code(), "GRAPHDOC_CAST_FAILED");
    assert!(doc.array("scores").unwrap().is_empty());
    assert!(!doc.is_modified(None));
}

// =============================================================================
// Pop / Shift Tests
// =============================================================================

/// atomic_pop runs once per generation and again after reset.
#[test]
fn test_atomic_pop_once_per_generation() {
    let mut doc = stored(json!({"scores": [1, 2, 3]}));

    assert_eq!(doc.array_mut("scores").unwrap().atomic_pop(), Some(Value::from(3)));
    assert_eq!(doc.array("scores").unwrap().as_slice(), numbers(&[1, 2]).as_slice());

    assert_eq!(doc.array_mut("scores").unwrap().atomic_pop(), None);
    assert_eq!(doc.array("scores").unwrap().len(), 2);
    assert_eq!(
        doc.array("scores").unwrap().atomics(),
        Some(&AtomicOp::Pop(PopEnd::Last))
    );

    doc.reset();
    assert!(doc.array("scores").unwrap().atomics().is_none());
    assert_eq!(doc.array_mut("scores").unwrap().atomic_pop(), Some(Value::from(2)));
}

/// atomic_shift queues a pop from the front.
#[test]
fn test_atomic_shift() {
    let mut doc = stored(json!({"scores": [1, 2, 3]}));
    assert_eq!(doc.array_mut("scores").unwrap().atomic_shift(), Some(Value::from(1)));

    let dirty = doc.dirty();
    assert_eq!(dirty[0].atomic, Some(AtomicOp::Pop(PopEnd::First)));
    assert_eq!(PopEnd::First.direction(), -1);
}

/// Non-atomic edits replace the whole array.
#[test]
fn test_non_atomic_edits_use_set() {
    let mut doc = stored(json!({"scores": [3, 1, 2]}));
    {
        let mut scores = doc.array_mut("scores").unwrap();
        scores.sort_by(|a, b| a.as_i64().cmp(&b.as_i64()));
        scores.unshift(numbers(&[0])).unwrap();
    }

    let scores = doc.array("scores").unwrap();
    assert_eq!(scores.as_slice(), numbers(&[0, 1, 2, 3]).as_slice());
    assert_eq!(scores.atomics(), Some(&AtomicOp::Set));
}

// =============================================================================
// Dirty Interaction Tests
// =============================================================================

/// An element path under a modified collection forces a full replacement.
#[test]
fn test_element_write_collapses_collection() {
    let mut doc = stored(json!({"scores": [1, 2]}));
    {
        let mut scores = doc.array_mut("scores").unwrap();
        scores.push(numbers(&[3])).unwrap();
        scores.set_at(0, Value::from(9)).unwrap();
    }
    assert!(doc.is_direct_modified("scores.0"));
    assert_eq!(doc.get("scores.0"), Some(Value::from(9)));

    let dirty = doc.dirty();
    assert_eq!(dirty.len(), 1);
    assert_eq!(dirty[0].path, "scores");
    assert_eq!(dirty[0].atomic, Some(AtomicOp::Set));
}

/// Without queued operations an element write leaves the collection as is.
#[test]
fn test_element_write_without_queued_ops() {
    let mut doc = stored(json!({"scores": [1, 2]}));
    doc.mark_modified("scores");
    doc.array_mut("scores").unwrap().set_at(0, Value::from(9)).unwrap();

    let dirty = doc.dirty();
    assert_eq!(dirty.len(), 1);
    assert_eq!(dirty[0].path, "scores");
    assert_eq!(dirty[0].atomic, None);
    assert_eq!(dirty[0].value, Some(Value::Array(numbers(&[9, 2]))));
}

/// Replacing an array path by assignment starts a fresh collection.
#[test]
fn test_assignment_replaces_collection() {
    let mut doc = stored(json!({"scores": [1]}));
    doc.array_mut("scores").unwrap().push(numbers(&[2])).unwrap();
    doc.set("scores", Value::from(json!(["4", 5]))).unwrap();

    let scores = doc.array("scores").unwrap();
    assert_eq!(scores.as_slice(), numbers(&[4, 5]).as_slice());
    assert!(scores.atomics().is_none());
    assert!(doc.is_direct_modified("scores"));
}

/// Only array paths hand out collection handles.
#[test]
fn test_array_mut_requires_array_path() {
    let mut doc = stored(json!({"name": "x"}));
    assert!(doc.array_mut("name").is_none());
    assert!(doc.array_mut("missing").is_none());
}

// =============================================================================
// Prior Value Tests
// =============================================================================

/// The first mutation records the contents held before it.
#[test]
fn test_mutation_records_prior_contents() {
    let mut doc = stored(json!({"scores": [1]}));
    {
        let mut scores = doc.array_mut("scores").unwrap();
        scores.push(numbers(&[2])).unwrap();
        scores.push(numbers(&[3])).unwrap();
    }
    assert_eq!(
        doc.states().prior("scores"),
        Some(&Value::Array(numbers(&[1])))
    );

    doc.reset();
    doc.array_mut("scores").unwrap().atomic_shift();
    assert_eq!(
        doc.states().prior("scores"),
        Some(&Value::Array(numbers(&[1, 2, 3])))
    );
}

/// Element writes record the element they replace.
#[test]
fn test_element_write_records_prior_element() {
    let mut doc = stored(json!({"scores": [1, 2]}));
    doc.array_mut("scores").unwrap().set_at(1, Value::from(5)).unwrap();
    assert_eq!(doc.states().prior("scores.1"), Some(&Value::from(2)));
}
