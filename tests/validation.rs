//! Validation Tests
//!
//! validate() collects candidate paths, runs every path's validators
//! concurrently and returns one aggregate error covering all failures.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use graphdoc::document::{Document, Selection};
use graphdoc::schema::{Schema, SchemaType, Validator};
use graphdoc::Value;
use regex::Regex;
use serde_json::json;

// =============================================================================
// Helper Functions
// =============================================================================

fn account_schema() -> Arc<Schema> {
    let handle = SchemaType::string()
        .required()
        .matches(Regex::new("^[a-z]+$").unwrap())
        .validate(Validator::with_async("unique", |value, _doc| {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                value.as_ref().and_then(Value::as_str) != Some("taken")
            })
        }));

    Arc::new(
        Schema::builder()
            .path("handle", handle)
            .path("email", SchemaType::string().required())
            .path("age", SchemaType::number().min(0.0).max(150.0))
            .path("limit", SchemaType::number())
            .path(
                "used",
                SchemaType::number().validate(Validator::sync("limit", |value, doc| {
                    let limit = doc.get("limit").and_then(|v| v.as_f64());
                    match (value.and_then(Value::as_f64), limit) {
                        (Some(used), Some(limit)) => used <= limit,
                        _ => true,
                    }
                })),
            )
            .build()
            .unwrap(),
    )
}

fn create(values: serde_json::Value) -> Document {
    Document::with_values(account_schema(), Value::from(values)).unwrap()
}

// =============================================================================
// Aggregation Tests
// =============================================================================

/// Two unset required paths produce one error with two entries.
#[tokio::test]
async fn test_missing_required_paths_aggregate() {
    let mut doc = Document::new(account_schema());
    let err = doc.validate().await.unwrap_err();

    assert_eq!(err.len(), 2);
    assert_eq!(err.paths(), vec!["email", "handle"]);
    assert_eq!(err.get("email").unwrap().kind, "required");
    assert_eq!(err.code(), "GRAPHDOC_VALIDATION_FAILED");
}

/// A passing document validates cleanly and leaves no error behind.
#[tokio::test]
async fn test_valid_document_passes() {
    let mut doc = create(json!({"handle": "ann", "email": "a@b.c", "age": 30}));
    doc.validate().await.unwrap();
    assert!(doc.validation_error().is_none());
    assert!(doc.errors().is_none());
}

/// Async validators are awaited alongside synchronous ones.
#[tokio::test]
async fn test_async_validator_failure() {
    let mut doc = create(json!({"handle": "taken", "email": "a@b.c", "age": 200}));
    let err = doc.validate().await.unwrap_err();

    assert_eq!(err.paths(), vec!["age", "handle"]);
    assert_eq!(err.get("handle").unwrap().kind, "unique");
    assert_eq!(err.get("age").unwrap().kind, "max");
}

/// The first failing validator for a path is the one reported.
#[tokio::test]
async fn test_first_failure_per_path() {
    let mut doc = create(json!({"handle": "", "email": "a@b.c"}));
    let err = doc.validate().await.unwrap_err();
    assert_eq!(err.get("handle").unwrap().kind, "required");
}

/// Validators can read other paths of the document.
#[tokio::test]
async fn test_validator_reads_document() {
    let mut doc = create(json!({"handle": "ann", "email": "a@b.c", "limit": 3, "used": 5}));
    let err = doc.validate().await.unwrap_err();
    assert_eq!(err.paths(), vec!["used"]);

    doc.set("limit", 10).unwrap();
    doc.validate().await.unwrap();
}

// =============================================================================
// Candidate Selection Tests
// =============================================================================

/// A required path that was not fetched is not validated.
#[tokio::test]
async fn test_unselected_required_path_skipped() {
    let mut doc = Document::existing(account_schema(), Some(Selection::exclude(["email"])));
    doc.init(Value::from(json!({"handle": "ann"})));
    doc.validate().await.unwrap();
}

/// Stored values are validated even when unmodified.
#[tokio::test]
async fn test_init_paths_are_candidates() {
    let mut doc = Document::existing(account_schema(), None);
    doc.init(Value::from(json!({"handle": "ann", "email": "a@b.c", "age": -1})));
    let err = doc.validate().await.unwrap_err();
    assert_eq!(err.paths(), vec!["age"]);
}

/// Every candidate path is checked exactly once.
#[tokio::test]
async fn test_each_candidate_checked_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let schema = Schema::builder()
        .path(
            "code",
            SchemaType::string()
                .required()
                .validate(Validator::sync("counted", move |_, _| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    true
                })),
        )
        .build()
        .unwrap();

    let mut doc = Document::existing(Arc::new(schema), None);
    doc.init(Value::from(json!({"code": "a"})));
    doc.set("code", "b").unwrap();
    doc.validate().await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// =============================================================================
// Manual Invalidation Tests
// =============================================================================

/// invalidate() entries are reported by the next validate().
#[tokio::test]
async fn test_manual_invalidation_reported() {
    let mut doc = create(json!({"handle": "ann", "email": "a@b.c"}));
    doc.invalidate("email", "domain");
    assert_eq!(doc.errors().unwrap()["email"].kind, "domain");

    let err = doc.validate().await.unwrap_err();
    assert_eq!(err.paths(), vec!["email"]);
    assert!(doc.errors().is_none());
}

/// With no candidates validate() succeeds without touching recorded errors.
#[tokio::test]
async fn test_no_candidates() {
    let schema = Schema::builder()
        .path("note", SchemaType::string())
        .build()
        .unwrap();
    let mut doc = Document::existing(Arc::new(schema), None);
    doc.invalidate("note", "manual");

    doc.validate().await.unwrap();
    assert!(doc.errors().is_some());
}

// =============================================================================
// Concurrency Tests
// =============================================================================

/// A waiting async validator does not hold back its siblings: the path
/// checked first waits on a signal only the second path's validator sends.
#[tokio::test]
async fn test_async_validators_run_concurrently() {
    let signal = Arc::new(Notify::new());
    let waiter = Arc::clone(&signal);
    let sender = Arc::clone(&signal);

    let schema = Schema::builder()
        .path(
            "a",
            SchemaType::string().validate(Validator::with_async("waits", move |_, _| {
                let waiter = Arc::clone(&waiter);
                Box::pin(async move {
                    waiter.notified().await;
                    false
                })
            })),
        )
        .path(
            "b",
            SchemaType::string().validate(Validator::with_async("signals", move |_, _| {
                let sender = Arc::clone(&sender);
                Box::pin(async move {
                    sender.notify_one();
                    false
                })
            })),
        )
        .build()
        .unwrap();

    let mut doc =
        Document::with_values(Arc::new(schema), Value::from(json!({"a": "x", "b": "y"}))).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), doc.validate())
        .await
        .expect("validation stalled on the waiting validator");

    let err = result.unwrap_err();
    assert_eq!(err.paths(), vec!["a", "b"]);
    assert_eq!(err.get("a").unwrap().kind, "waits");
    assert_eq!(err.get("b").unwrap().kind, "signals");
}
