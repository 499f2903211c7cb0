//! Per-path state tracking
//!
//! Four named sets: `require`, `init`, `modify` and `default`. A path can sit
//! in several sets at once; the document keeps them apart by convention. The
//! only coupling: a path leaves `default` once it is initialized from storage
//! or modified, since its value is then no longer an unsaved default.
//!
//! Defaults written by a save stay in `default` but are flagged persisted,
//! so unsetting them is a real change.

use std::collections::{BTreeMap, BTreeSet};

use crate::value::Value;

/// Names of the tracked sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathState {
    Require,
    Init,
    Modify,
    Default,
}

impl PathState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PathState::Require => "require",
            PathState::Init => "init",
            PathState::Modify => "modify",
            PathState::Default => "default",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathStateSet {
    require: BTreeSet<String>,
    init: BTreeSet<String>,
    default: BTreeSet<String>,
    /// Modified paths with the value held before the first change
    modify: BTreeMap<String, Option<Value>>,
    /// Subset of `default` already written to storage
    persisted: BTreeSet<String>,
}

impl PathStateSet {
    pub fn new() -> Self {
        <Self as Default>::default()
    }

    pub fn require(&mut self, path: impl Into<String>) {
        self.require.insert(path.into());
    }

    pub fn init(&mut self, path: impl Into<String>) {
        let path = path.into();
        self.drop_default(&path);
        self.init.insert(path);
    }

    pub fn default(&mut self, path: impl Into<String>) {
        self.default.insert(path.into());
    }

    /// Adds `path` to `modify`. The prior value is recorded only on the
    /// first call of a generation. Returns true if the path was newly added.
    pub fn modify(&mut self, path: impl Into<String>, prior: Option<Value>) -> bool {
        let path = path.into();
        if self.modify.contains_key(&path) {
            return false;
        }
        self.drop_default(&path);
        self.modify.insert(path, prior);
        true
    }

    fn drop_default(&mut self, path: &str) {
        self.default.remove(path);
        self.persisted.remove(path);
    }

    /// Flags every current `default` path as written to storage.
    pub fn persist_defaults(&mut self) {
        self.persisted = self.default.clone();
    }

    /// Whether `path` holds a default that a save already wrote.
    pub fn is_persisted_default(&self, path: &str) -> bool {
        self.persisted.contains(path)
    }

    pub fn clear(&mut self, state: PathState) {
        match state {
            PathState::Require => self.require.clear(),
            PathState::Init => self.init.clear(),
            PathState::Modify => self.modify.clear(),
            PathState::Default => self.default.clear(),
        }
    }

    pub fn remove(&mut self, state: PathState, path: &str) -> bool {
        match state {
            PathState::Require => self.require.remove(path),
            PathState::Init => self.init.remove(path),
            PathState::Modify => self.modify.remove(path).is_some(),
            PathState::Default => {
                self.persisted.remove(path);
                self.default.remove(path)
            }
        }
    }

    pub fn contains(&self, state: PathState, path: &str) -> bool {
        match state {
            PathState::Require => self.require.contains(path),
            PathState::Init => self.init.contains(path),
            PathState::Modify => self.modify.contains_key(path),
            PathState::Default => self.default.contains(path),
        }
    }

    /// True if the named set is non-empty.
    pub fn some(&self, state: PathState) -> bool {
        match state {
            PathState::Require => !self.require.is_empty(),
            PathState::Init => !self.init.is_empty(),
            PathState::Modify => !self.modify.is_empty(),
            PathState::Default => !self.default.is_empty(),
        }
    }

    /// Paths in the named set, sorted.
    pub fn paths(&self, state: PathState) -> Vec<&str> {
        match state {
            PathState::Require => self.require.iter().map(String::as_str).collect(),
            PathState::Init => self.init.iter().map(String::as_str).collect(),
            PathState::Modify => self.modify.keys().map(String::as_str).collect(),
            PathState::Default => self.default.iter().map(String::as_str).collect(),
        }
    }

    pub fn map<T>(&self, state: PathState, f: impl FnMut(&str) -> T) -> Vec<T> {
        self.paths(state).into_iter().map(f).collect()
    }

    /// Value recorded when `path` was first marked modified.
    pub fn prior(&self, path: &str) -> Option<&Value> {
        self.modify.get(path).and_then(Option::as_ref)
    }
}
