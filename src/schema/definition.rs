//! Schema: the ordered set of declared paths for one kind of document
//!
//! Paths are dotted (`"profile.age"`); every proper prefix of a declared
//! path is a nested path. Virtual paths are computed and never stored.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use super::errors::{SchemaError, SchemaResult};
use super::types::{IndexKind, SchemaKind, SchemaType};
use crate::document::{Document, DocumentResult};
use crate::value::Value;

/// Names a path may not take because documents expose them as members.
pub const RESERVED_PATHS: &[&str] = &[
    "get",
    "set",
    "validate",
    "save",
    "init",
    "errors",
    "schema",
    "is_new",
    "is_modified",
    "mark_modified",
    "to_object",
    "to_json",
    "on",
    "emit",
    "remove",
    "collection",
    "db",
];

/// How `Document::set` treats paths the schema does not declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrictMode {
    /// Store undeclared paths as adhoc values
    Off,
    /// Silently ignore undeclared paths
    #[default]
    Drop,
    /// Reject undeclared paths with an error
    Throw,
}

/// Behavioral options bound to a schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaOptions {
    /// Undeclared path handling
    pub strict: StrictMode,
    /// Name of the numeric version path, `None` to disable
    pub version_key: Option<String>,
    /// Omit empty objects from `to_object` output
    pub minimize: bool,
}

impl Default for SchemaOptions {
    fn default() -> Self {
        Self {
            strict: StrictMode::Drop,
            version_key: Some("__v".to_string()),
            minimize: true,
        }
    }
}

impl SchemaOptions {
    /// Options with strict mode set to reject unknown paths.
    pub fn throwing() -> Self {
        Self {
            strict: StrictMode::Throw,
            ..Self::default()
        }
    }

    /// Options that accept unknown paths as adhoc values.
    pub fn lenient() -> Self {
        Self {
            strict: StrictMode::Off,
            ..Self::default()
        }
    }
}

/// Classification of a path against a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathType {
    Real,
    Virtual,
    Nested,
    AdhocOrUndefined,
}

/// An index declaration collected from path options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexSpec {
    pub path: String,
    pub unique: bool,
}

pub type VirtualGetter = Arc<dyn Fn(Option<Value>, &Document) -> Option<Value> + Send + Sync>;
pub type VirtualSetter = Arc<dyn Fn(Option<Value>, &mut Document) -> DocumentResult<()> + Send + Sync>;

/// A computed path: getters produce its value, setters usually write other
/// real paths.
#[derive(Clone, Default)]
pub struct VirtualType {
    getters: Vec<VirtualGetter>,
    setters: Vec<VirtualSetter>,
}

impl fmt::Debug for VirtualType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualType")
            .field("getters", &self.getters.len())
            .field("setters", &self.setters.len())
            .finish()
    }
}

impl VirtualType {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<F>(mut self, getter: F) -> Self
    where
        F: Fn(Option<Value>, &Document) -> Option<Value> + Send + Sync + 'static,
    {
        self.getters.push(Arc::new(getter));
        self
    }

    pub fn set<F>(mut self, setter: F) -> Self
    where
        F: Fn(Option<Value>, &mut Document) -> DocumentResult<()> + Send + Sync + 'static,
    {
        self.setters.push(Arc::new(setter));
        self
    }

    pub fn apply_getters(&self, document: &Document) -> Option<Value> {
        self.getters
            .iter()
            .fold(None, |current, getter| getter(current, document))
    }

    pub fn apply_setters(&self, value: Option<Value>, document: &mut Document) -> DocumentResult<()> {
        for setter in &self.setters {
            setter(value.clone(), document)?;
        }
        Ok(())
    }
}

/// A compiled schema. Immutable once built; shared by every document
/// created from it.
#[derive(Debug, Clone)]
pub struct Schema {
    paths: Vec<Arc<SchemaType>>,
    by_name: HashMap<String, usize>,
    nested: BTreeSet<String>,
    virtuals: HashMap<String, Arc<VirtualType>>,
    required: Vec<String>,
    options: SchemaOptions,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Declared type for `name`, if real.
    pub fn path(&self, name: &str) -> Option<&Arc<SchemaType>> {
        self.by_name.get(name).map(|&i| &self.paths[i])
    }

    pub fn virtual_path(&self, name: &str) -> Option<&Arc<VirtualType>> {
        self.virtuals.get(name)
    }

    pub fn path_type(&self, name: &str) -> PathType {
        if self.by_name.contains_key(name) {
            PathType::Real
        } else if self.virtuals.contains_key(name) {
            PathType::Virtual
        } else if self.nested.contains(name) {
            PathType::Nested
        } else {
            PathType::AdhocOrUndefined
        }
    }

    /// All real paths in declaration order.
    pub fn paths(&self) -> impl Iterator<Item = &Arc<SchemaType>> {
        self.paths.iter()
    }

    pub fn virtual_names(&self) -> impl Iterator<Item = &str> {
        self.virtuals.keys().map(String::as_str)
    }

    pub fn required_paths(&self) -> &[String] {
        &self.required
    }

    pub fn options(&self) -> &SchemaOptions {
        &self.options
    }

    pub fn indexes(&self) -> Vec<IndexSpec> {
        self.paths
            .iter()
            .filter_map(|ty| {
                ty.index_kind().map(|kind| IndexSpec {
                    path: ty.path().to_string(),
                    unique: kind == IndexKind::Unique,
                })
            })
            .collect()
    }

    /// Nearest declared Mixed ancestor of `path` (`"meta"` for `"meta.a.b"`).
    pub fn mixed_ancestor(&self, path: &str) -> Option<&Arc<SchemaType>> {
        let mut end = path.len();
        while let Some(dot) = path[..end].rfind('.') {
            if let Some(ty) = self.path(&path[..dot]) {
                return (ty.kind() == &SchemaKind::Mixed).then_some(ty);
            }
            end = dot;
        }
        None
    }
}

/// Collects path declarations and checks them on `build`.
#[derive(Default)]
pub struct SchemaBuilder {
    paths: Vec<(String, SchemaType)>,
    virtuals: Vec<(String, VirtualType)>,
    options: SchemaOptions,
}

impl SchemaBuilder {
    pub fn path(mut self, name: impl Into<String>, ty: SchemaType) -> Self {
        self.paths.push((name.into(), ty));
        self
    }

    pub fn virtual_path(mut self, name: impl Into<String>, virt: VirtualType) -> Self {
        self.virtuals.push((name.into(), virt));
        self
    }

    pub fn options(mut self, options: SchemaOptions) -> Self {
        self.options = options;
        self
    }

    pub fn strict(mut self, mode: StrictMode) -> Self {
        self.options.strict = mode;
        self
    }

    pub fn version_key(mut self, key: Option<&str>) -> Self {
        self.options.version_key = key.map(str::to_string);
        self
    }

    /// Validates names and compiles the schema.
    pub fn build(self) -> SchemaResult<Schema> {
        let mut schema = Schema {
            paths: Vec::new(),
            by_name: HashMap::new(),
            nested: BTreeSet::new(),
            virtuals: HashMap::new(),
            required: Vec::new(),
            options: self.options,
        };

        let mut declared = self.paths;
        if let Some(key) = schema.options.version_key.clone() {
            if !declared.iter().any(|(name, _)| *name == key) {
                declared.push((key, SchemaType::number()));
            }
        }

        for (name, ty) in declared {
            check_name(&name)?;
            if schema.by_name.contains_key(&name) {
                return Err(SchemaError::DuplicatePath(name));
            }
            let mut end = name.len();
            while let Some(dot) = name[..end].rfind('.') {
                schema.nested.insert(name[..dot].to_string());
                end = dot;
            }
            if ty.is_required() {
                schema.required.push(name.clone());
            }
            schema.by_name.insert(name.clone(), schema.paths.len());
            schema.paths.push(Arc::new(ty.with_path(name)));
        }

        for (name, virt) in self.virtuals {
            check_name(&name)?;
            if schema.by_name.contains_key(&name) || schema.virtuals.contains_key(&name) {
                return Err(SchemaError::DuplicatePath(name));
            }
            schema.virtuals.insert(name, Arc::new(virt));
        }

        if let Some(name) = schema.nested.iter().find(|n| schema.by_name.contains_key(*n)) {
            return Err(SchemaError::malformed(
                "<in-memory>",
                format!("'{}' is declared both as a path and as a nested prefix", name),
            ));
        }

        Ok(schema)
    }
}

fn check_name(name: &str) -> SchemaResult<()> {
    if name.is_empty() || name.split('.').any(str::is_empty) {
        return Err(SchemaError::malformed("<in-memory>", format!("invalid path '{}'", name)));
    }
    let head = name.split('.').next().unwrap_or(name);
    if RESERVED_PATHS.contains(&head) {
        return Err(SchemaError::ReservedPath(name.to_string()));
    }
    Ok(())
}
