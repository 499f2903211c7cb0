//! Declarative schema definitions
//!
//! Schemas can be described in JSON instead of code:
//!
//! ```json
//! {
//!   "name": "person",
//!   "options": { "strict": "throw" },
//!   "paths": [
//!     { "path": "name", "type": "string", "required": true, "trim": true },
//!     { "path": "age", "type": "number", "min": 0, "default": 18 },
//!     { "path": "tags", "type": "array", "of": { "type": "string" } }
//!   ]
//! }
//! ```
//!
//! The loader reads every `*.json` file in a directory and keeps the
//! compiled schemas in memory by name. Registering a name twice is an error.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::definition::{Schema, SchemaOptions};
use super::errors::{SchemaError, SchemaResult};
use super::types::{SchemaKind, SchemaType};
use crate::observability::{log_event_with_fields, Event};
use crate::value::Value;

/// One path in a declarative schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathDefinition {
    /// Dotted path name
    pub path: String,
    /// Declared kind
    #[serde(flatten)]
    pub kind: SchemaKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<String>>,
    #[serde(default, rename = "match", skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default)]
    pub lowercase: bool,
    #[serde(default)]
    pub uppercase: bool,
    #[serde(default)]
    pub trim: bool,
    #[serde(default)]
    pub index: bool,
    #[serde(default)]
    pub unique: bool,
}

impl PathDefinition {
    fn to_schema_type(&self, source_name: &str) -> SchemaResult<SchemaType> {
        let mut ty = SchemaType::new(self.kind.clone());
        if self.trim {
            ty = ty.trim();
        }
        if self.lowercase {
            ty = ty.lowercase();
        }
        if self.uppercase {
            ty = ty.uppercase();
        }
        if self.required {
            ty = ty.required();
        }
        if let Some(min) = self.min {
            ty = ty.min(min);
        }
        if let Some(max) = self.max {
            ty = ty.max(max);
        }
        if let Some(values) = &self.one_of {
            ty = ty.enum_values(values.iter().cloned());
        }
        if let Some(pattern) = &self.pattern {
            let re = Regex::new(pattern).map_err(|e| {
                SchemaError::malformed(
                    source_name,
                    format!("invalid match pattern for '{}': {}", self.path, e),
                )
            })?;
            ty = ty.matches(re);
        }
        if let Some(default) = &self.default {
            ty = ty.default_value(default.clone());
        }
        if self.unique {
            ty = ty.unique();
        } else if self.index {
            ty = ty.index();
        }
        Ok(ty)
    }
}

/// A whole declarative schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDefinition {
    /// Registry name
    pub name: String,
    #[serde(default)]
    pub options: SchemaOptions,
    pub paths: Vec<PathDefinition>,
}

impl SchemaDefinition {
    /// Parses a definition from JSON text.
    pub fn from_json(source_name: &str, content: &str) -> SchemaResult<Self> {
        serde_json::from_str(content)
            .map_err(|e| SchemaError::malformed(source_name, format!("Invalid JSON: {}", e)))
    }

    /// Compiles the definition.
    pub fn compile(&self) -> SchemaResult<Schema> {
        let mut builder = Schema::builder().options(self.options.clone());
        for def in &self.paths {
            builder = builder.path(def.path.clone(), def.to_schema_type(&self.name)?);
        }
        builder.build()
    }
}

/// Reads schema definition files and keeps compiled schemas by name.
pub struct SchemaLoader {
    schema_dir: PathBuf,
    schemas: HashMap<String, Arc<Schema>>,
}

impl SchemaLoader {
    pub fn new(schema_dir: &Path) -> Self {
        Self {
            schema_dir: schema_dir.to_path_buf(),
            schemas: HashMap::new(),
        }
    }

    pub fn schema_dir(&self) -> &Path {
        &self.schema_dir
    }

    /// Loads every `*.json` file in the schema directory. A missing
    /// directory loads nothing.
    pub fn load_all(&mut self) -> SchemaResult<usize> {
        if !self.schema_dir.exists() {
            return Ok(0);
        }

        let entries = fs::read_dir(&self.schema_dir).map_err(|e| {
            SchemaError::malformed(
                self.schema_dir.display().to_string(),
                format!("Failed to read schema directory: {}", e),
            )
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                SchemaError::malformed(
                    self.schema_dir.display().to_string(),
                    format!("Failed to read directory entry: {}", e),
                )
            })?;
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();

        for path in &files {
            self.load_file(path)?;
        }

        let count = files.len().to_string();
        let dir = self.schema_dir.display().to_string();
        log_event_with_fields(
            Event::SchemasLoaded,
            &[("count", count.as_str()), ("dir", dir.as_str())],
        );
        Ok(files.len())
    }

    fn load_file(&mut self, path: &Path) -> SchemaResult<()> {
        let source_name = path.display().to_string();
        let content = fs::read_to_string(path).map_err(|e| {
            SchemaError::malformed(&source_name, format!("Failed to read file: {}", e))
        })?;
        let definition = SchemaDefinition::from_json(&source_name, &content)?;
        let schema = definition.compile()?;
        self.register(definition.name, schema)
    }

    /// Registers a compiled schema under `name`.
    pub fn register(&mut self, name: impl Into<String>, schema: Schema) -> SchemaResult<()> {
        let name = name.into();
        if self.schemas.contains_key(&name) {
            return Err(SchemaError::DuplicateSchema(name));
        }
        self.schemas.insert(name, Arc::new(schema));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<Schema>> {
        self.schemas.get(name).cloned()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    pub fn schema_count(&self) -> usize {
        self.schemas.len()
    }

    /// Writes a definition to `<dir>/<name>.json`; existing files are never
    /// overwritten.
    pub fn save_definition(&self, definition: &SchemaDefinition) -> SchemaResult<PathBuf> {
        let path = self.schema_dir.join(format!("{}.json", definition.name));
        if path.exists() {
            return Err(SchemaError::DuplicateSchema(definition.name.clone()));
        }
        fs::create_dir_all(&self.schema_dir).map_err(|e| {
            SchemaError::malformed(
                self.schema_dir.display().to_string(),
                format!("Failed to create schema directory: {}", e),
            )
        })?;
        let content = serde_json::to_string_pretty(definition).map_err(|e| {
            SchemaError::malformed(&definition.name, format!("Failed to serialize: {}", e))
        })?;
        fs::write(&path, content).map_err(|e| {
            SchemaError::malformed(
                path.display().to_string(),
                format!("Failed to write file: {}", e),
            )
        })?;
        Ok(path)
    }
}
