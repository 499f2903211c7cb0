//! Field selection
//!
//! Records which paths were actually fetched when a document was loaded, so
//! "not fetched" can be told apart from "fetched and empty".

use std::collections::BTreeSet;

use crate::value::is_sub_path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Only these paths (and their sub-paths) were fetched
    Include(BTreeSet<String>),
    /// Everything except these paths was fetched
    Exclude(BTreeSet<String>),
}

impl Selection {
    pub fn include<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Selection::Include(paths.into_iter().map(Into::into).collect())
    }

    pub fn exclude<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Selection::Exclude(paths.into_iter().map(Into::into).collect())
    }

    /// Parses a projection object such as `{"name": 1, "age": 1}` or
    /// `{"bio": 0}`. The first entry decides whether it is inclusive.
    pub fn from_projection(projection: &serde_json::Map<String, serde_json::Value>) -> Option<Self> {
        let (_, first) = projection.iter().next()?;
        let inclusive = is_truthy(first);
        let paths = projection
            .iter()
            .filter(|(_, v)| is_truthy(v) == inclusive)
            .map(|(k, _)| k.clone());
        Some(if inclusive {
            Selection::include(paths)
        } else {
            Selection::exclude(paths)
        })
    }

    pub fn is_inclusive(&self) -> bool {
        matches!(self, Selection::Include(_))
    }

    /// True if `path` was fetched. A path counts as listed when it is named
    /// directly, lies under a named path, or has a named path under it.
    pub fn is_selected(&self, path: &str) -> bool {
        let (paths, inclusive) = match self {
            Selection::Include(paths) => (paths, true),
            Selection::Exclude(paths) => (paths, false),
        };
        let listed = paths
            .iter()
            .any(|p| p == path || is_sub_path(p, path) || is_sub_path(path, p));
        listed == inclusive
    }
}

fn is_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        serde_json::Value::Null => false,
        _ => true,
    }
}
