//! Array-valued paths with pending atomic operations
//!
//! Each collection carries at most one pending operation descriptor. Calls
//! of the same kind merge; a call of a different kind collapses the
//! descriptor to a full replacement (`Set`) with the current contents.
//!
//! | call                              | descriptor         |
//! |-----------------------------------|--------------------|
//! | push                              | Push(items)        |
//! | atomic_pop / atomic_shift         | Pop(Last / First)  |
//! | pull / remove                     | Pull(items)        |
//! | add_to_set                        | AddToSet(items)    |
//! | pop, shift, splice, sort, unshift | Set                |
//!
//! Collections owned by a document are mutated through [`CollectionMut`],
//! which marks the path modified on every call.

use std::cmp::Ordering;

use super::engine::record_modified;
use super::events::Listener;
use super::state::{PathState, PathStateSet};
use crate::observability::{log_event_with_fields, Event};
use crate::schema::{CastResult, SchemaKind};
use crate::value::Value;

/// End of the array an atomic pop removes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopEnd {
    First,
    Last,
}

impl PopEnd {
    /// Wire direction: -1 for the first element, 1 for the last
    pub fn direction(&self) -> i8 {
        match self {
            PopEnd::First => -1,
            PopEnd::Last => 1,
        }
    }
}

/// Pending operation for one collection.
#[derive(Debug, Clone, PartialEq)]
pub enum AtomicOp {
    Push(Vec<Value>),
    Pop(PopEnd),
    Pull(Vec<Value>),
    AddToSet(Vec<Value>),
    /// Replace the stored array with the current contents
    Set,
}

impl AtomicOp {
    pub fn name(&self) -> &'static str {
        match self {
            AtomicOp::Push(_) => "push",
            AtomicOp::Pop(_) => "pop",
            AtomicOp::Pull(_) => "pull",
            AtomicOp::AddToSet(_) => "addToSet",
            AtomicOp::Set => "set",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AtomicCollection {
    path: String,
    element: SchemaKind,
    items: Vec<Value>,
    pending: Option<AtomicOp>,
    popped: bool,
    shifted: bool,
}

impl AtomicCollection {
    /// Wraps already-cast items.
    pub fn new(path: impl Into<String>, element: SchemaKind, items: Vec<Value>) -> Self {
        Self {
            path: path.into(),
            element,
            items,
            pending: None,
            popped: false,
            shifted: false,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn element_kind(&self) -> &SchemaKind {
        &self.element
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.items.iter()
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.items.clone()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.items.get(index)
    }

    /// Position of the first element equal to `value`.
    pub fn index_of(&self, value: &Value) -> Option<usize> {
        self.items.iter().position(|item| item.same_element(value))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn to_value(&self) -> Value {
        Value::Array(self.items.clone())
    }

    /// The pending operation descriptor, if any.
    pub fn atomics(&self) -> Option<&AtomicOp> {
        self.pending.as_ref()
    }

    /// Drops the pending descriptor and the once-per-generation pop flags.
    pub fn clear_atomics(&mut self) {
        self.pending = None;
        self.popped = false;
        self.shifted = false;
    }

    pub(crate) fn collapse_to_set(&mut self) {
        self.register(AtomicOp::Set);
    }

    fn cast_all(&self, values: Vec<Value>) -> CastResult<Vec<Value>> {
        values
            .into_iter()
            .map(|v| self.element.cast(v).map_err(|e| e.at(self.path.as_str())))
            .collect()
    }

    fn register(&mut self, op: AtomicOp) {
        let merged = match (self.pending.take(), op) {
            (None, op) => op,
            (Some(AtomicOp::Set), _) => AtomicOp::Set,
            (Some(AtomicOp::Push(mut list)), AtomicOp::Push(more)) => {
                list.extend(more);
                AtomicOp::Push(list)
            }
            (Some(AtomicOp::Pull(mut list)), AtomicOp::Pull(more)) => {
                list.extend(more);
                AtomicOp::Pull(list)
            }
            (Some(AtomicOp::AddToSet(mut list)), AtomicOp::AddToSet(more)) => {
                list.extend(more);
                AtomicOp::AddToSet(list)
            }
            (Some(AtomicOp::Pop(a)), AtomicOp::Pop(b)) if a == b => AtomicOp::Pop(a),
            (Some(previous), _) => {
                log_event_with_fields(
                    Event::AtomicCollapsed,
                    &[("path", self.path.as_str()), ("from", previous.name())],
                );
                AtomicOp::Set
            }
        };
        self.pending = Some(merged);
    }

    /// Appends cast values. Returns the new length.
    pub fn push(&mut self, values: Vec<Value>) -> CastResult<usize> {
        let values = self.cast_all(values)?;
        self.items.extend(values.iter().cloned());
        self.register(AtomicOp::Push(values));
        Ok(self.items.len())
    }

    /// Appends cast values as a full replacement.
    pub fn non_atomic_push(&mut self, values: Vec<Value>) -> CastResult<usize> {
        let values = self.cast_all(values)?;
        self.items.extend(values);
        self.register(AtomicOp::Set);
        Ok(self.items.len())
    }

    /// Removes the last element; only the first call per generation has an
    /// effect.
    pub fn atomic_pop(&mut self) -> Option<Value> {
        if self.popped {
            return None;
        }
        self.popped = true;
        self.register(AtomicOp::Pop(PopEnd::Last));
        self.items.pop()
    }

    /// Removes the first element; only the first call per generation has an
    /// effect.
    pub fn atomic_shift(&mut self) -> Option<Value> {
        if self.shifted {
            return None;
        }
        self.shifted = true;
        self.register(AtomicOp::Pop(PopEnd::First));
        if self.items.is_empty() {
            None
        } else {
            Some(self.items.remove(0))
        }
    }

    /// Removes every element equal to any of `values`. Returns how many
    /// elements were removed.
    pub fn pull(&mut self, values: Vec<Value>) -> CastResult<usize> {
        let values = self.cast_all(values)?;
        let before = self.items.len();
        self.items
            .retain(|item| !values.iter().any(|v| v.same_element(item)));
        let removed = before - self.items.len();
        self.register(AtomicOp::Pull(values));
        Ok(removed)
    }

    pub fn remove(&mut self, values: Vec<Value>) -> CastResult<usize> {
        self.pull(values)
    }

    /// Appends the values not already present. Returns the appended subset.
    pub fn add_to_set(&mut self, values: Vec<Value>) -> CastResult<Vec<Value>> {
        let values = self.cast_all(values)?;
        let mut added = Vec::new();
        for value in &values {
            let present = self.items.iter().any(|item| item.same_element(value))
                || added.iter().any(|item: &Value| item.same_element(value));
            if !present {
                added.push(value.clone());
            }
        }
        self.items.extend(added.iter().cloned());
        self.register(AtomicOp::AddToSet(values));
        Ok(added)
    }

    pub fn pop(&mut self) -> Option<Value> {
        let popped = self.items.pop();
        self.register(AtomicOp::Set);
        popped
    }

    pub fn shift(&mut self) -> Option<Value> {
        let shifted = if self.items.is_empty() {
            None
        } else {
            Some(self.items.remove(0))
        };
        self.register(AtomicOp::Set);
        shifted
    }

    /// Removes `delete_count` elements at `start` and inserts `insert` in
    /// their place. Returns the removed elements.
    pub fn splice(
        &mut self,
        start: usize,
        delete_count: usize,
        insert: Vec<Value>,
    ) -> CastResult<Vec<Value>> {
        let insert = self.cast_all(insert)?;
        let start = start.min(self.items.len());
        let end = start.saturating_add(delete_count).min(self.items.len());
        let removed = self.items.splice(start..end, insert).collect();
        self.register(AtomicOp::Set);
        Ok(removed)
    }

    pub fn unshift(&mut self, values: Vec<Value>) -> CastResult<usize> {
        let values = self.cast_all(values)?;
        self.items.splice(0..0, values);
        self.register(AtomicOp::Set);
        Ok(self.items.len())
    }

    pub fn sort_by<F>(&mut self, compare: F)
    where
        F: FnMut(&Value, &Value) -> Ordering,
    {
        self.items.sort_by(compare);
        self.register(AtomicOp::Set);
    }

    /// Replaces one element in place. The pending descriptor is untouched;
    /// the owning document tracks the element path instead.
    pub fn set_at(&mut self, index: usize, value: Value) -> CastResult<()> {
        let value = self
            .element
            .cast(value)
            .map_err(|e| e.at(format!("{}.{}", self.path, index)))?;
        if index < self.items.len() {
            self.items[index] = value;
        } else {
            self.items.resize(index, Value::Null);
            self.items.push(value);
        }
        Ok(())
    }
}

/// Mutable handle to a collection owned by a document. Every call marks
/// the collection's path modified on the document.
pub struct CollectionMut<'a> {
    pub(super) collection: &'a mut AtomicCollection,
    pub(super) states: &'a mut PathStateSet,
    pub(super) listeners: &'a [Listener],
}

impl<'a> CollectionMut<'a> {
    /// Contents before the first change of this generation, if not yet
    /// recorded.
    fn snapshot(&self) -> Option<Value> {
        let path = self.collection.path();
        if self.states.contains(PathState::Modify, path) {
            None
        } else {
            Some(self.collection.to_value())
        }
    }

    fn touch(&mut self, prior: Option<Value>) {
        record_modified(self.states, self.listeners, self.collection.path(), prior);
    }

    fn touched<R>(&mut self, f: impl FnOnce(&mut AtomicCollection) -> R) -> R {
        let prior = self.snapshot();
        let result = f(&mut *self.collection);
        self.touch(prior);
        result
    }

    fn touched_ok<T>(
        &mut self,
        f: impl FnOnce(&mut AtomicCollection) -> CastResult<T>,
    ) -> CastResult<T> {
        let prior = self.snapshot();
        let result = f(&mut *self.collection)?;
        self.touch(prior);
        Ok(result)
    }

    pub fn collection(&self) -> &AtomicCollection {
        &*self.collection
    }

    pub fn push(&mut self, values: Vec<Value>) -> CastResult<usize> {
        self.touched_ok(|c| c.push(values))
    }

    pub fn non_atomic_push(&mut self, values: Vec<Value>) -> CastResult<usize> {
        self.touched_ok(|c| c.non_atomic_push(values))
    }

    pub fn atomic_pop(&mut self) -> Option<Value> {
        self.touched(AtomicCollection::atomic_pop)
    }

    pub fn atomic_shift(&mut self) -> Option<Value> {
        self.touched(AtomicCollection::atomic_shift)
    }

    pub fn pull(&mut self, values: Vec<Value>) -> CastResult<usize> {
        self.touched_ok(|c| c.pull(values))
    }

    pub fn remove(&mut self, values: Vec<Value>) -> CastResult<usize> {
        self.touched_ok(|c| c.remove(values))
    }

    pub fn add_to_set(&mut self, values: Vec<Value>) -> CastResult<Vec<Value>> {
        self.touched_ok(|c| c.add_to_set(values))
    }

    pub fn pop(&mut self) -> Option<Value> {
        self.touched(AtomicCollection::pop)
    }

    pub fn shift(&mut self) -> Option<Value> {
        self.touched(AtomicCollection::shift)
    }

    pub fn splice(
        &mut self,
        start: usize,
        delete_count: usize,
        insert: Vec<Value>,
    ) -> CastResult<Vec<Value>> {
        self.touched_ok(|c| c.splice(start, delete_count, insert))
    }

    pub fn unshift(&mut self, values: Vec<Value>) -> CastResult<usize> {
        self.touched_ok(|c| c.unshift(values))
    }

    pub fn sort_by<F>(&mut self, compare: F)
    where
        F: FnMut(&Value, &Value) -> Ordering,
    {
        self.touched(|c| c.sort_by(compare))
    }

    /// Replaces one element and marks `path.index` modified.
    pub fn set_at(&mut self, index: usize, value: Value) -> CastResult<()> {
        let prior = self.collection.get(index).cloned();
        self.collection.set_at(index, value)?;
        let path = format!("{}.{}", self.collection.path(), index);
        record_modified(self.states, self.listeners, &path, prior);
        Ok(())
    }
}
