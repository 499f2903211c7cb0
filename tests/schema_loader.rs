//! Schema Loader Tests
//!
//! Declarative JSON definitions loaded from a directory drive documents
//! exactly like schemas built in code.

use std::fs;
use std::path::Path;

use graphdoc::model::Model;
use graphdoc::schema::{SchemaDefinition, SchemaLoader};
use graphdoc::Value;
use serde_json::json;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn write_definition(dir: &Path, file: &str, definition: serde_json::Value) {
    fs::write(dir.join(file), definition.to_string()).unwrap();
}

fn user_definition() -> serde_json::Value {
    json!({
        "name": "user",
        "options": { "strict": "throw" },
        "paths": [
            { "path": "name", "type": "string", "required": true, "trim": true },
            { "path": "email", "type": "string", "lowercase": true, "unique": true },
            { "path": "role", "type": "string", "enum": ["admin", "member"], "default": "member" },
            { "path": "tags", "type": "array", "of": { "type": "string" } }
        ]
    })
}

fn loaded(dir: &TempDir) -> SchemaLoader {
    let mut loader = SchemaLoader::new(dir.path());
    loader.load_all().unwrap();
    loader
}

// =============================================================================
// Loading Tests
// =============================================================================

/// Every JSON file in the directory is registered under its declared name.
#[test]
fn test_loads_directory() {
    let dir = TempDir::new().unwrap();
    write_definition(dir.path(), "user.json", user_definition());
    write_definition(
        dir.path(),
        "post.json",
        json!({"name": "post", "paths": [{ "path": "title", "type": "string" }]}),
    );
    fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let loader = loaded(&dir);
    assert_eq!(loader.schema_count(), 2);
    assert!(loader.exists("user"));
    assert!(loader.exists("post"));
    assert!(loader.get("comment").is_none());
}

/// Two files declaring the same name fail the load.
#[test]
fn test_duplicate_name_across_files() {
    let dir = TempDir::new().unwrap();
    write_definition(dir.path(), "a.json", user_definition());
    write_definition(dir.path(), "b.json", user_definition());

    let err = SchemaLoader::new(dir.path()).load_all().unwrap_err();
    assert_eq!(err.code(), "GRAPHDOC_SCHEMA_DUPLICATE");
}

/// Reserved document member names cannot be declared as paths.
#[test]
fn test_reserved_path_rejected() {
    let dir = TempDir::new().unwrap();
    write_definition(
        dir.path(),
        "bad.json",
        json!({"name": "bad", "paths": [{ "path": "save.when", "type": "date" }]}),
    );

    let err = SchemaLoader::new(dir.path()).load_all().unwrap_err();
    assert_eq!(err.code(), "GRAPHDOC_SCHEMA_RESERVED_PATH");
}

/// A saved definition is written once and loads back identically.
#[test]
fn test_saved_definition_round_trips() {
    let dir = TempDir::new().unwrap();
    let definition = SchemaDefinition::from_json("user.json", &user_definition().to_string()).unwrap();

    let loader = SchemaLoader::new(dir.path());
    let path = loader.save_definition(&definition).unwrap();
    assert!(path.ends_with("user.json"));
    assert!(loader.save_definition(&definition).is_err());

    let written = fs::read_to_string(&path).unwrap();
    assert_eq!(SchemaDefinition::from_json("user.json", &written).unwrap(), definition);
}

// =============================================================================
// Document Behavior Tests
// =============================================================================

/// Setters, defaults and indexes declared in JSON apply to documents.
#[tokio::test]
async fn test_loaded_schema_drives_documents() {
    let dir = TempDir::new().unwrap();
    write_definition(dir.path(), "user.json", user_definition());
    let loader = loaded(&dir);
    let users = Model::from_loader(&loader, "user").unwrap();

    let mut doc = users
        .create(Some(Value::from(json!({"name": "  Ann ", "email": "ANN@X.IO"}))))
        .unwrap();
    assert_eq!(doc.get("name"), Some(Value::from("Ann")));
    assert_eq!(doc.get("email"), Some(Value::from("ann@x.io")));
    assert_eq!(doc.get("role"), Some(Value::from("member")));
    assert_eq!(doc.get("tags"), Some(Value::Array(Vec::new())));
    assert_eq!(users.indexes().len(), 1);
    assert!(users.indexes()[0].unique);

    doc.validate().await.unwrap();

    doc.set("role", "owner").unwrap();
    let err = doc.validate().await.unwrap_err();
    assert_eq!(err.get("role").unwrap().kind, "enum");
}

/// Strict mode from the definition rejects unknown paths.
#[test]
fn test_loaded_strict_mode() {
    let dir = TempDir::new().unwrap();
    write_definition(dir.path(), "user.json", user_definition());
    let users = Model::from_loader(&loaded(&dir), "user").unwrap();

    let err = users
        .create(Some(Value::from(json!({"name": "Ann", "nickname": "A"}))))
        .unwrap_err();
    assert_eq!(err.code(), "GRAPHDOC_STRICT_MODE");
}
