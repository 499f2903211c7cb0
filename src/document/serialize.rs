//! Plain-object snapshots of a document

use serde::{Deserialize, Serialize, Serializer};

use super::engine::Document;
use crate::value::{assign, lookup, Map, Value};

/// Options for [`Document::to_object`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToObjectOptions {
    /// Run path getters over stored values
    pub getters: bool,
    /// Include computed virtual paths
    pub virtuals: bool,
    /// Omit empty objects; `None` uses the schema option
    pub minimize: Option<bool>,
    /// Render dates as RFC 3339 strings
    pub json: bool,
}

impl ToObjectOptions {
    /// Getters and virtuals both applied
    pub fn computed() -> Self {
        Self {
            getters: true,
            virtuals: true,
            ..Self::default()
        }
    }
}

impl Document {
    /// Snapshot of the stored properties as an object value.
    pub fn to_object(&self, options: ToObjectOptions) -> Value {
        let mut map = self.materialize();

        if options.getters {
            let with_getters: Vec<String> = self
                .schema()
                .paths()
                .filter(|ty| ty.has_getters())
                .map(|ty| ty.path().to_string())
                .filter(|path| lookup(&map, path).is_some())
                .collect();
            for path in with_getters {
                if let Some(ty) = self.schema().path(&path) {
                    assign(&mut map, &path, ty.apply_getters(self.raw(&path), self));
                }
            }
        }

        if options.virtuals {
            for name in self.schema().virtual_names() {
                if let Some(virt) = self.schema().virtual_path(name) {
                    assign(&mut map, name, virt.apply_getters(self));
                }
            }
        }

        if options
            .minimize
            .unwrap_or(self.schema().options().minimize)
        {
            minimize(&mut map);
        }

        let mut value = Value::Object(map);
        if options.json {
            stringify_dates(&mut value);
        }
        value
    }

    /// Snapshot rendered as JSON. Dates become RFC 3339 strings.
    pub fn to_json(&self, options: ToObjectOptions) -> serde_json::Value {
        self.to_object(ToObjectOptions {
            json: true,
            ..options
        })
        .to_json()
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json(ToObjectOptions::default()).serialize(serializer)
    }
}

/// Drops empty objects, innermost first.
fn minimize(map: &mut Map) {
    map.retain(|_, value| match value {
        Value::Object(inner) => {
            minimize(inner);
            !inner.is_empty()
        }
        _ => true,
    });
}

fn stringify_dates(value: &mut Value) {
    match value {
        Value::Date(_) => *value = Value::from(value.to_json()),
        Value::Array(items) => items.iter_mut().for_each(stringify_dates),
        Value::Object(map) => map.values_mut().for_each(stringify_dates),
        _ => {}
    }
}
