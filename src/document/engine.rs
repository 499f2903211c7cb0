//! Document: state engine for one record
//!
//! A document owns the raw nested property tree, the collections for
//! array-valued paths, the per-path state sets and the pending errors.
//! Schema, setters, getters and validators are shared through the
//! `Arc<Schema>` it was built from.
//!
//! Assignment never fails on a bad value: cast and setter failures are
//! stored as the pending save error and surface on the next pre-save.
//! Only strict-mode rejections fail `set` directly.

use futures_util::stream::{FuturesUnordered, StreamExt};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use super::atomic::{AtomicCollection, AtomicOp, CollectionMut};
use super::errors::{DocumentError, DocumentResult, ValidationError};
use super::events::{emit, DocumentEvent, Listener};
use super::selection::Selection;
use super::state::{PathState, PathStateSet};
use crate::observability::{log_event, log_event_with_fields, Event};
use crate::schema::{
    CastError, CastResult, PathType, Schema, SchemaKind, SchemaType, StrictMode, ValidatorError,
};
use crate::value::{assign, is_sub_path, join_path, lookup, Map, Value};

/// Adds `path` to the modified set and notifies listeners the first time.
pub(crate) fn record_modified(
    states: &mut PathStateSet,
    listeners: &[Listener],
    path: &str,
    prior: Option<Value>,
) {
    if states.modify(path, prior) {
        emit(listeners, &DocumentEvent::Modified(path.to_string()));
    }
}

/// Reason recorded by [`Document::invalidate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalidation {
    /// Plain failure kind, wrapped into a `ValidatorError` for the path
    Kind(String),
    /// A ready-made validator failure, stored as given
    Validator(ValidatorError),
}

impl From<&str> for Invalidation {
    fn from(kind: &str) -> Self {
        Invalidation::Kind(kind.to_string())
    }
}

impl From<String> for Invalidation {
    fn from(kind: String) -> Self {
        Invalidation::Kind(kind)
    }
}

impl From<ValidatorError> for Invalidation {
    fn from(error: ValidatorError) -> Self {
        Invalidation::Validator(error)
    }
}

/// One entry of the minimal change set handed to a persister.
#[derive(Debug, Clone)]
pub struct DirtyPath {
    pub path: String,
    /// Current value, `None` for an unset path
    pub value: Option<Value>,
    /// Declared or adhoc type, `None` for undeclared paths
    pub schema_type: Option<Arc<SchemaType>>,
    /// Pending collection operation for array paths
    pub atomic: Option<AtomicOp>,
}

pub struct Document {
    schema: Arc<Schema>,
    doc: Map,
    arrays: BTreeMap<String, AtomicCollection>,
    adhoc: HashMap<String, Arc<SchemaType>>,
    states: PathStateSet,
    selected: Option<Selection>,
    is_new: bool,
    constructing: bool,
    save_error: Option<DocumentError>,
    validation_error: Option<ValidationError>,
    listeners: Vec<Listener>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("doc", &self.doc)
            .field("arrays", &self.arrays)
            .field("states", &self.states)
            .field("selected", &self.selected)
            .field("is_new", &self.is_new)
            .field("save_error", &self.save_error)
            .field("validation_error", &self.validation_error)
            .finish()
    }
}

impl Document {
    /// A new, empty document with defaults applied.
    pub fn new(schema: Arc<Schema>) -> Self {
        Self::construct(schema, None, true)
    }

    /// A new document assigned from `values` (an object keyed by path).
    pub fn with_values(schema: Arc<Schema>, values: Value) -> DocumentResult<Self> {
        let mut doc = Self::new(schema);
        doc.constructing = true;
        let result = doc.set_many(values);
        doc.constructing = false;
        result.map(|_| doc)
    }

    /// A document for a record that already exists in storage. Defaults are
    /// applied only to selected paths; call [`Document::init`] next.
    pub fn existing(schema: Arc<Schema>, selected: Option<Selection>) -> Self {
        Self::construct(schema, selected, false)
    }

    fn construct(schema: Arc<Schema>, selected: Option<Selection>, is_new: bool) -> Self {
        let mut doc = Self {
            schema,
            doc: Map::new(),
            arrays: BTreeMap::new(),
            adhoc: HashMap::new(),
            states: PathStateSet::new(),
            selected,
            is_new,
            constructing: false,
            save_error: None,
            validation_error: None,
            listeners: Vec::new(),
        };
        doc.seed_required();
        doc.constructing = true;
        doc.apply_defaults();
        doc.constructing = false;
        doc
    }

    fn seed_required(&mut self) {
        for path in self.schema.required_paths() {
            self.states.require(path.clone());
        }
    }

    fn apply_defaults(&mut self) {
        let schema = Arc::clone(&self.schema);
        for ty in schema.paths() {
            let path = ty.path();
            if !self.is_selected(path) {
                continue;
            }
            match self.default_for(ty) {
                Ok(Some(value)) => {
                    self.write(path, Some(value), ty.kind());
                    self.states.default(path);
                }
                Ok(None) => {}
                Err(e) => self.defer_error(e),
            }
        }
    }

    /// Declared default, or an empty array for array paths without one.
    fn default_for(&self, ty: &SchemaType) -> CastResult<Option<Value>> {
        let value = ty.get_default(self, self.constructing)?;
        if value.is_none() && ty.kind().is_array() {
            return Ok(Some(Value::Array(Vec::new())));
        }
        Ok(value)
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn set_is_new(&mut self, is_new: bool) {
        self.is_new = is_new;
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selected.as_ref()
    }

    pub fn states(&self) -> &PathStateSet {
        &self.states
    }

    /// Register a lifecycle listener.
    pub fn on<F>(&mut self, listener: F)
    where
        F: Fn(&DocumentEvent) + Send + Sync + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    // ---------------------------------------------------------------
    // Hydration
    // ---------------------------------------------------------------

    /// Populates the document from stored properties. Values are cast but
    /// setters do not run; every stored path is marked init.
    pub fn init(&mut self, raw: Value) {
        self.is_new = false;
        let count = match raw {
            Value::Object(map) => self.init_object("", map),
            _ => 0,
        };
        let count = count.to_string();
        log_event_with_fields(Event::DocumentInit, &[("paths", count.as_str())]);
        emit(&self.listeners, &DocumentEvent::Init);
    }

    fn init_object(&mut self, prefix: &str, map: Map) -> usize {
        let mut count = 0;
        for (key, value) in map {
            let path = join_path(prefix, &key);
            match self.schema.path_type(&path) {
                PathType::Nested => {
                    if let Value::Object(inner) = value {
                        count += self.init_object(&path, inner);
                        continue;
                    }
                    assign(&mut self.doc, &path, Some(value));
                }
                PathType::Real => {
                    if let Some(ty) = self.schema.path(&path).cloned() {
                        match ty.cast(value) {
                            Ok(cast) => self.write(&path, Some(cast), ty.kind()),
                            Err(e) => self.defer_error(e),
                        }
                    }
                }
                // computed, never stored
                PathType::Virtual => continue,
                PathType::AdhocOrUndefined => {
                    assign(&mut self.doc, &path, Some(value));
                }
            }
            self.states.init(path);
            count += 1;
        }
        count
    }

    // ---------------------------------------------------------------
    // Assignment
    // ---------------------------------------------------------------

    /// Assigns `value` to `path`. Object values assigned to a nested path
    /// are applied key by key.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> DocumentResult<()> {
        self.assign_path(path, Some(value.into()))
    }

    /// Assigns "undefined" to `path`.
    pub fn unset(&mut self, path: &str) -> DocumentResult<()> {
        self.assign_path(path, None)
    }

    /// Assigns every key of an object value.
    pub fn set_many(&mut self, values: Value) -> DocumentResult<()> {
        match values {
            Value::Object(map) => {
                for (key, value) in map {
                    self.assign_path(&key, Some(value))?;
                }
                Ok(())
            }
            other => Err(CastError::new("object", other).into()),
        }
    }

    /// Assigns through a type supplied for this path only. The type stays
    /// registered for later reads and validation.
    pub fn set_adhoc(
        &mut self,
        path: &str,
        value: impl Into<Value>,
        ty: SchemaType,
    ) -> DocumentResult<()> {
        let ty = Arc::new(ty.with_path(path));
        self.adhoc.insert(path.to_string(), Arc::clone(&ty));
        self.assign_typed(path, Some(value.into()), &ty);
        Ok(())
    }

    fn assign_path(&mut self, path: &str, value: Option<Value>) -> DocumentResult<()> {
        match self.schema.path_type(path) {
            PathType::Nested => match value {
                Some(Value::Object(map)) => {
                    for (key, inner) in map {
                        self.assign_path(&join_path(path, &key), Some(inner))?;
                    }
                    Ok(())
                }
                other => self.assign_undeclared(path, other),
            },
            PathType::Virtual => match self.schema.virtual_path(path).cloned() {
                Some(virt) => virt.apply_setters(value, self),
                None => Ok(()),
            },
            PathType::Real => {
                if let Some(ty) = self.schema.path(path).cloned() {
                    self.assign_typed(path, value, &ty);
                }
                Ok(())
            }
            PathType::AdhocOrUndefined => match self.adhoc.get(path).cloned() {
                Some(ty) => {
                    self.assign_typed(path, value, &ty);
                    Ok(())
                }
                None => self.assign_undeclared(path, value),
            },
        }
    }

    fn assign_typed(&mut self, path: &str, value: Option<Value>, ty: &Arc<SchemaType>) {
        let current = self.raw(path);
        let prior = if self.constructing {
            None
        } else {
            current.as_ref()
        };
        let value = match ty.apply_setters(value, self, self.constructing, prior) {
            Ok(value) => value,
            Err(e) => {
                self.defer_error(e);
                return;
            }
        };
        if self.should_modify(path, &value, &current, Some(ty)) {
            record_modified(&mut self.states, &self.listeners, path, current);
        }
        self.write(path, value, ty.kind());
    }

    fn assign_undeclared(&mut self, path: &str, value: Option<Value>) -> DocumentResult<()> {
        let under_mixed = self.schema.mixed_ancestor(path).is_some();
        if !under_mixed {
            match self.schema.options().strict {
                StrictMode::Off => {}
                StrictMode::Drop => {
                    log_event_with_fields(Event::StrictPathDropped, &[("path", path)]);
                    return Ok(());
                }
                StrictMode::Throw => {
                    log_event_with_fields(Event::StrictPathRejected, &[("path", path)]);
                    return Err(DocumentError::StrictModeViolation(path.to_string()));
                }
            }
        }
        let current = self.raw(path);
        if self.should_modify(path, &value, &current, None) {
            record_modified(&mut self.states, &self.listeners, path, current);
        }
        assign(&mut self.doc, path, value);
        Ok(())
    }

    /// Decides whether an assignment marks `path` modified.
    fn should_modify(
        &self,
        path: &str,
        value: &Option<Value>,
        current: &Option<Value>,
        ty: Option<&Arc<SchemaType>>,
    ) -> bool {
        if self.is_new {
            return true;
        }
        if self.states.contains(PathState::Modify, path) {
            return false;
        }
        if value.is_none() && !self.is_selected(path) {
            return true;
        }
        if value.is_none()
            && self.states.contains(PathState::Default, path)
            && !self.states.is_persisted_default(path)
        {
            return false;
        }
        if value != current {
            return true;
        }
        let non_null = value.as_ref().map_or(false, |v| !v.is_null());
        if !self.constructing && non_null && self.states.contains(PathState::Default, path) {
            if let Some(ty) = ty {
                let default = self.default_for(ty).ok().flatten();
                return default.as_ref() == value.as_ref();
            }
        }
        false
    }

    fn write(&mut self, path: &str, value: Option<Value>, kind: &SchemaKind) {
        if let SchemaKind::Array { element } = kind {
            match value {
                Some(Value::Array(items)) => {
                    assign(&mut self.doc, path, None);
                    self.arrays.insert(
                        path.to_string(),
                        AtomicCollection::new(path, (**element).clone(), items),
                    );
                }
                other => {
                    self.arrays.remove(path);
                    assign(&mut self.doc, path, other);
                }
            }
            return;
        }
        assign(&mut self.doc, path, value);
    }

    fn defer_error(&mut self, error: CastError) {
        let path = error.path.clone().unwrap_or_default();
        log_event_with_fields(
            Event::CastDeferred,
            &[("path", path.as_str()), ("kind", error.kind.as_str())],
        );
        self.save_error = Some(DocumentError::Cast(error));
    }

    /// Marks `path` modified regardless of its value.
    pub fn mark_modified(&mut self, path: &str) {
        let prior = self.raw(path);
        record_modified(&mut self.states, &self.listeners, path, prior);
    }

    // ---------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------

    /// Reads `path` through its getters. Virtual paths are computed.
    pub fn get(&self, path: &str) -> Option<Value> {
        match self.schema.path_type(path) {
            PathType::Virtual => self
                .schema
                .virtual_path(path)
                .and_then(|virt| virt.apply_getters(self)),
            PathType::Nested => self.raw(path),
            PathType::Real | PathType::AdhocOrUndefined => match self.schema_type_for(path) {
                Some(ty) => ty.apply_getters(self.raw(path), self),
                None => self.raw(path),
            },
        }
    }

    /// Reads `path` through the getters of a type supplied for it. The type
    /// stays registered for the path.
    pub fn get_adhoc(&mut self, path: &str, ty: SchemaType) -> Option<Value> {
        let ty = Arc::new(ty.with_path(path));
        self.adhoc.insert(path.to_string(), Arc::clone(&ty));
        ty.apply_getters(self.raw(path), self)
    }

    /// Stored value at `path` without getters. Nested paths are assembled
    /// with their collections.
    pub fn raw(&self, path: &str) -> Option<Value> {
        if let Some(collection) = self.arrays.get(path) {
            return Some(collection.to_value());
        }
        if let Some((parent, index)) = path.rsplit_once('.') {
            if let (Some(collection), Ok(index)) =
                (self.arrays.get(parent), index.parse::<usize>())
            {
                return collection.get(index).cloned();
            }
        }

        let mut base = lookup(&self.doc, path).cloned();
        let mut overlays = self
            .arrays
            .iter()
            .filter(|(p, _)| is_sub_path(p, path))
            .peekable();
        if overlays.peek().is_none() {
            return base;
        }
        if base.is_none() {
            base = Some(Value::Object(Map::new()));
        }
        if let Some(Value::Object(map)) = base.as_mut() {
            for (p, collection) in overlays {
                assign(map, &p[path.len() + 1..], Some(collection.to_value()));
            }
        }
        base
    }

    /// The whole property tree with collections merged in.
    pub(crate) fn materialize(&self) -> Map {
        let mut map = self.doc.clone();
        for (path, collection) in &self.arrays {
            assign(&mut map, path, Some(collection.to_value()));
        }
        map
    }

    /// Declared type for `path`, falling back to an adhoc type.
    pub fn schema_type_for(&self, path: &str) -> Option<Arc<SchemaType>> {
        self.schema
            .path(path)
            .or_else(|| self.adhoc.get(path))
            .cloned()
    }

    pub fn array(&self, path: &str) -> Option<&AtomicCollection> {
        self.arrays.get(path)
    }

    /// Mutable handle to the collection at an array path, creating an
    /// empty one if the path holds nothing. `None` for non-array paths.
    pub fn array_mut(&mut self, path: &str) -> Option<CollectionMut<'_>> {
        if !self.arrays.contains_key(path) {
            let element = self
                .schema_type_for(path)?
                .kind()
                .element()
                .cloned()?;
            assign(&mut self.doc, path, None);
            self.arrays
                .insert(path.to_string(), AtomicCollection::new(path, element, Vec::new()));
        }
        let collection = self.arrays.get_mut(path)?;
        Some(CollectionMut {
            collection,
            states: &mut self.states,
            listeners: &self.listeners,
        })
    }

    // ---------------------------------------------------------------
    // State queries
    // ---------------------------------------------------------------

    /// With no path: whether anything is modified. With a path: whether it
    /// or any path beneath it is modified.
    pub fn is_modified(&self, path: Option<&str>) -> bool {
        match path {
            None => self.states.some(PathState::Modify),
            Some(path) => self.modified_paths().iter().any(|p| p == path),
        }
    }

    /// Whether `path` itself was assigned or marked.
    pub fn is_direct_modified(&self, path: &str) -> bool {
        self.states.contains(PathState::Modify, path)
    }

    pub fn is_init(&self, path: &str) -> bool {
        self.states.contains(PathState::Init, path)
    }

    pub fn is_default(&self, path: &str) -> bool {
        self.states.contains(PathState::Default, path)
    }

    /// Whether `path` was fetched. Always true without a selection.
    pub fn is_selected(&self, path: &str) -> bool {
        self.selected
            .as_ref()
            .map_or(true, |selection| selection.is_selected(path))
    }

    /// Every modified path together with all of its ancestors, in order of
    /// first appearance.
    pub fn modified_paths(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for path in self.states.paths(PathState::Modify) {
            let prefixes = path
                .match_indices('.')
                .map(|(i, _)| &path[..i])
                .chain(std::iter::once(path));
            for prefix in prefixes {
                if seen.insert(prefix) {
                    out.push(prefix.to_string());
                }
            }
        }
        out
    }

    /// The minimal set of modified paths: a path whose ancestor is also
    /// modified is dropped. When a dropped path lies under a collection with
    /// queued operations and both carry values, the collection is switched
    /// to full replacement.
    pub fn dirty(&mut self) -> Vec<DirtyPath> {
        let paths: Vec<String> = self
            .states
            .paths(PathState::Modify)
            .into_iter()
            .map(String::from)
            .collect();

        let mut minimal: Vec<DirtyPath> = Vec::new();
        for path in paths {
            let value = self.raw(&path);
            if let Some(top) = minimal.iter_mut().rev().find(|t| is_sub_path(&path, &t.path)) {
                if has_value(&top.value) && has_value(&value) {
                    let queued = self
                        .arrays
                        .get_mut(&top.path)
                        .filter(|c| c.atomics().is_some());
                    if let Some(collection) = queued {
                        collection.collapse_to_set();
                        top.atomic = collection.atomics().cloned();
                    }
                }
                continue;
            }
            let atomic = self.arrays.get(&path).and_then(|c| c.atomics().cloned());
            minimal.push(DirtyPath {
                schema_type: self.schema_type_for(&path),
                path,
                value,
                atomic,
            });
        }
        minimal
    }

    // ---------------------------------------------------------------
    // Validation
    // ---------------------------------------------------------------

    /// Runs every validator of every candidate path concurrently and
    /// returns the aggregate error, if any path failed.
    ///
    /// Candidates are required paths that are selected or modified, plus
    /// every init and modified path. Paths without a type are skipped.
    pub async fn validate(&mut self) -> Result<(), ValidationError> {
        let mut candidates: Vec<&str> = self
            .states
            .paths(PathState::Require)
            .into_iter()
            .filter(|p| self.is_selected(p) || self.is_modified(Some(*p)))
            .collect();
        candidates.extend(self.states.paths(PathState::Init));
        candidates.extend(self.states.paths(PathState::Modify));
        candidates.sort_unstable();
        candidates.dedup();

        if candidates.is_empty() {
            return Ok(());
        }

        let jobs: Vec<(Arc<SchemaType>, Option<Value>)> = candidates
            .iter()
            .filter_map(|p| self.schema_type_for(p).map(|ty| (ty, self.raw(p))))
            .collect();

        let failures: Vec<ValidatorError> = {
            let scope: &Document = self;
            let mut pending: FuturesUnordered<_> = jobs
                .iter()
                .map(|(ty, value)| async move {
                    // every path completes asynchronously
                    tokio::task::yield_now().await;
                    ty.do_validate(value.clone(), scope).await
                })
                .collect();

            let mut outstanding = pending.len();
            let mut failures = Vec::new();
            while let Some(result) = pending.next().await {
                outstanding -= 1;
                if let Err(error) = result {
                    failures.push(error);
                }
            }
            debug_assert_eq!(outstanding, 0);
            failures
        };

        for error in failures {
            let path = error.path.clone();
            self.invalidate(&path, error);
        }

        match self.validation_error.take() {
            Some(error) => {
                let paths: Vec<String> = error.paths().into_iter().map(String::from).collect();
                let joined = paths.join(",");
                log_event_with_fields(Event::ValidationFailed, &[("paths", joined.as_str())]);
                emit(&self.listeners, &DocumentEvent::ValidationFailed(paths));
                Err(error)
            }
            None => {
                log_event(Event::ValidationPassed);
                Ok(())
            }
        }
    }

    /// Records a validation failure for `path` in the aggregate error.
    pub fn invalidate(&mut self, path: &str, reason: impl Into<Invalidation>) {
        let error = match reason.into() {
            Invalidation::Kind(kind) => ValidatorError::new(path, kind),
            Invalidation::Validator(error) => error,
        };
        self.validation_error
            .get_or_insert_with(ValidationError::new)
            .errors
            .insert(path.to_string(), error);
    }

    /// Failures recorded since the last validate() or reset().
    pub fn errors(&self) -> Option<&BTreeMap<String, ValidatorError>> {
        self.validation_error.as_ref().map(|e| &e.errors)
    }

    pub fn validation_error(&self) -> Option<&ValidationError> {
        self.validation_error.as_ref()
    }

    pub fn save_error(&self) -> Option<&DocumentError> {
        self.save_error.as_ref()
    }

    /// Removes and returns the pending save error.
    pub fn take_save_error(&mut self) -> Option<DocumentError> {
        self.save_error.take()
    }

    // ---------------------------------------------------------------
    // Persist bookkeeping
    // ---------------------------------------------------------------

    /// Clears modified state after a successful persist. Init and default
    /// history is kept; the require set is rebuilt from the schema. On a new
    /// document the defaults count as written from then on.
    pub fn reset(&mut self) {
        let dirty = self.dirty();
        for collection in self.arrays.values_mut() {
            let path = collection.path();
            if dirty
                .iter()
                .any(|d| d.path == path || is_sub_path(path, &d.path))
            {
                collection.clear_atomics();
            }
        }

        // a new document's first save writes its defaults too
        if self.is_new {
            self.states.persist_defaults();
        }
        self.states.clear(PathState::Modify);
        self.validation_error = None;
        self.states.clear(PathState::Require);
        self.seed_required();

        let count = dirty.len().to_string();
        log_event_with_fields(Event::DocumentReset, &[("paths", count.as_str())]);
        emit(&self.listeners, &DocumentEvent::Reset);
    }
}

fn has_value(value: &Option<Value>) -> bool {
    value.as_ref().map_or(false, |v| !v.is_null())
}
