//! Schema type definitions
//!
//! Supported kinds:
//! - string: UTF-8 string
//! - number: integer or float
//! - boolean
//! - date: UTC timestamp
//! - mixed: any value, stored as given
//! - array: homogeneous list with element kind

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::errors::{CastError, CastResult, ValidatorError};
use super::validator::Validator;
use crate::document::Document;
use crate::value::Value;

/// Declared kind of a path, as used for casting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SchemaKind {
    String,
    Number,
    Boolean,
    Date,
    Mixed,
    /// Homogeneous array (boxed to allow arrays of arrays)
    Array {
        #[serde(rename = "of")]
        element: Box<SchemaKind>,
    },
}

impl SchemaKind {
    /// Shorthand for an array kind
    pub fn array_of(element: SchemaKind) -> Self {
        SchemaKind::Array {
            element: Box::new(element),
        }
    }

    /// Returns the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            SchemaKind::String => "string",
            SchemaKind::Number => "number",
            SchemaKind::Boolean => "boolean",
            SchemaKind::Date => "date",
            SchemaKind::Mixed => "mixed",
            SchemaKind::Array { .. } => "array",
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, SchemaKind::Array { .. })
    }

    /// Element kind of an array, `None` for scalars.
    pub fn element(&self) -> Option<&SchemaKind> {
        match self {
            SchemaKind::Array { element } => Some(element),
            _ => None,
        }
    }

    /// Converts a raw value into this kind. Casting an already-typed value
    /// returns it unchanged.
    pub fn cast(&self, value: Value) -> CastResult<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        match self {
            SchemaKind::String => cast_string(value),
            SchemaKind::Number => cast_number(value),
            SchemaKind::Boolean => cast_boolean(value),
            SchemaKind::Date => cast_date(value),
            SchemaKind::Mixed => Ok(value),
            SchemaKind::Array { element } => match value {
                Value::Array(items) => items
                    .into_iter()
                    .map(|item| element.cast(item))
                    .collect::<CastResult<Vec<_>>>()
                    .map(Value::Array),
                single => Ok(Value::Array(vec![element.cast(single)?])),
            },
        }
    }

    /// Kind-aware presence check used by the `required` validator.
    pub fn check_required(&self, value: Option<&Value>) -> bool {
        match (self, value) {
            (_, None) | (_, Some(Value::Null)) => false,
            (SchemaKind::String, Some(Value::String(s))) => !s.is_empty(),
            (SchemaKind::Number, Some(Value::Number(_))) => true,
            (SchemaKind::Boolean, Some(Value::Bool(_))) => true,
            (SchemaKind::Date, Some(Value::Date(_))) => true,
            (SchemaKind::Array { .. }, Some(Value::Array(items))) => !items.is_empty(),
            (SchemaKind::Mixed, Some(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaKind::Array { element } => write!(f, "[{}]", element),
            other => write!(f, "{}", other.type_name()),
        }
    }
}

fn cast_string(value: Value) -> CastResult<Value> {
    match value {
        Value::String(_) => Ok(value),
        Value::Number(n) => Ok(Value::String(n.to_string())),
        Value::Bool(b) => Ok(Value::String(b.to_string())),
        Value::Date(d) => Ok(Value::String(
            d.to_rfc3339_opts(SecondsFormat::Millis, true),
        )),
        other => Err(CastError::new("string", other)),
    }
}

fn cast_number(value: Value) -> CastResult<Value> {
    let cast = match &value {
        Value::Number(_) => return Ok(value),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(Value::Null);
            }
            match trimmed.parse::<i64>() {
                Ok(n) => Some(Value::from(n)),
                Err(_) => trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(Value::from_f64),
            }
        }
        _ => None,
    };
    cast.ok_or_else(|| CastError::new("number", value))
}

fn cast_boolean(value: Value) -> CastResult<Value> {
    let cast = match &value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.as_str() {
            "true" | "1" => Some(true),
            "false" | "0" | "" => Some(false),
            _ => None,
        },
        Value::Number(n) => match n.as_f64() {
            Some(f) if f == 1.0 => Some(true),
            Some(f) if f == 0.0 => Some(false),
            _ => None,
        },
        _ => None,
    };
    cast.map(Value::Bool)
        .ok_or_else(|| CastError::new("boolean", value))
}

fn cast_date(value: Value) -> CastResult<Value> {
    let cast = match &value {
        Value::Date(_) => return Ok(value),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        Value::String(s) if s.is_empty() => return Ok(Value::Null),
        Value::String(s) => match DateTime::parse_from_rfc3339(s) {
            Ok(parsed) => Some(parsed.with_timezone(&Utc)),
            Err(_) => s
                .parse::<i64>()
                .ok()
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        },
        _ => None,
    };
    cast.map(Value::Date)
        .ok_or_else(|| CastError::new("date", value))
}

/// What a setter sees besides the incoming value.
pub struct SetterContext<'a> {
    /// Document being assigned
    pub document: &'a Document,
    /// Path being assigned
    pub path: &'a str,
    /// True while the document constructor is running
    pub constructing: bool,
    /// Value stored before this assignment (absent while constructing)
    pub prior: Option<&'a Value>,
}

/// Write-side transform. Receives the previous setter's output.
pub type Setter =
    Arc<dyn Fn(Option<Value>, &SetterContext<'_>) -> CastResult<Option<Value>> + Send + Sync>;

/// Read-side transform.
pub type Getter = Arc<dyn Fn(Option<Value>, &Document) -> Option<Value> + Send + Sync>;

/// Factory producing a default value for a document.
pub type DefaultFactory = Arc<dyn Fn(&Document) -> Option<Value> + Send + Sync>;

/// Default for a path: a literal or a factory bound to the owning document.
#[derive(Clone)]
pub enum DefaultValue {
    Literal(Value),
    Factory(DefaultFactory),
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Literal(v) => f.debug_tuple("Literal").field(v).finish(),
            DefaultValue::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// Index declaration on a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    Plain,
    Unique,
}

/// The type/behavior contract bound to one path.
#[derive(Clone)]
pub struct SchemaType {
    path: String,
    kind: SchemaKind,
    setters: Vec<Setter>,
    getters: Vec<Getter>,
    validators: Vec<Validator>,
    default: Option<DefaultValue>,
    required: bool,
    index: Option<IndexKind>,
}

impl fmt::Debug for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaType")
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("setters", &self.setters.len())
            .field("getters", &self.getters.len())
            .field("validators", &self.validators)
            .field("default", &self.default)
            .field("required", &self.required)
            .field("index", &self.index)
            .finish()
    }
}

impl SchemaType {
    /// Create a type of the given kind. The path is bound when the type is
    /// added to a schema.
    pub fn new(kind: SchemaKind) -> Self {
        Self {
            path: String::new(),
            kind,
            setters: Vec::new(),
            getters: Vec::new(),
            validators: Vec::new(),
            default: None,
            required: false,
            index: None,
        }
    }

    pub fn string() -> Self {
        Self::new(SchemaKind::String)
    }

    pub fn number() -> Self {
        Self::new(SchemaKind::Number)
    }

    pub fn boolean() -> Self {
        Self::new(SchemaKind::Boolean)
    }

    pub fn date() -> Self {
        Self::new(SchemaKind::Date)
    }

    pub fn mixed() -> Self {
        Self::new(SchemaKind::Mixed)
    }

    pub fn array(element: SchemaKind) -> Self {
        Self::new(SchemaKind::array_of(element))
    }

    pub(crate) fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Mark the path required. The presence check runs before any other
    /// validator.
    pub fn required(mut self) -> Self {
        if !self.required {
            self.required = true;
            self.validators.insert(0, Validator::required(self.kind.clone()));
        }
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Literal(value.into()));
        self
    }

    pub fn default_fn<F>(mut self, factory: F) -> Self
    where
        F: Fn(&Document) -> Option<Value> + Send + Sync + 'static,
    {
        self.default = Some(DefaultValue::Factory(Arc::new(factory)));
        self
    }

    /// Register a setter; setters run in registration order.
    pub fn set<F>(mut self, setter: F) -> Self
    where
        F: Fn(Option<Value>, &SetterContext<'_>) -> CastResult<Option<Value>>
            + Send
            + Sync
            + 'static,
    {
        self.setters.push(Arc::new(setter));
        self
    }

    /// Register a getter; getters run in registration order.
    pub fn get<F>(mut self, getter: F) -> Self
    where
        F: Fn(Option<Value>, &Document) -> Option<Value> + Send + Sync + 'static,
    {
        self.getters.push(Arc::new(getter));
        self
    }

    /// Register a validator.
    pub fn validate(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn min(self, min: f64) -> Self {
        self.validate(Validator::min(min))
    }

    pub fn max(self, max: f64) -> Self {
        self.validate(Validator::max(max))
    }

    pub fn enum_values<I, S>(self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.validate(Validator::one_of(values))
    }

    pub fn matches(self, pattern: regex::Regex) -> Self {
        self.validate(Validator::matches(pattern))
    }

    pub fn lowercase(self) -> Self {
        self.set(|v, _| Ok(map_string(v, |s| s.to_lowercase())))
    }

    pub fn uppercase(self) -> Self {
        self.set(|v, _| Ok(map_string(v, |s| s.to_uppercase())))
    }

    pub fn trim(self) -> Self {
        self.set(|v, _| Ok(map_string(v, |s| s.trim().to_string())))
    }

    pub fn index(mut self) -> Self {
        self.index = Some(IndexKind::Plain);
        self
    }

    pub fn unique(mut self) -> Self {
        self.index = Some(IndexKind::Unique);
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn kind(&self) -> &SchemaKind {
        &self.kind
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn index_kind(&self) -> Option<IndexKind> {
        self.index
    }

    pub fn default(&self) -> Option<&DefaultValue> {
        self.default.as_ref()
    }

    pub fn has_getters(&self) -> bool {
        !self.getters.is_empty()
    }

    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    /// Casts a raw value, attaching this path to any error.
    pub fn cast(&self, value: Value) -> CastResult<Value> {
        self.kind.cast(value).map_err(|e| e.at(self.path.as_str()))
    }

    /// Runs the setter chain and casts the result.
    pub fn apply_setters(
        &self,
        value: Option<Value>,
        document: &Document,
        constructing: bool,
        prior: Option<&Value>,
    ) -> CastResult<Option<Value>> {
        let ctx = SetterContext {
            document,
            path: &self.path,
            constructing,
            prior,
        };
        let mut current = value;
        for setter in &self.setters {
            current = setter(current, &ctx).map_err(|e| {
                if e.path.is_some() {
                    e
                } else {
                    e.at(self.path.as_str())
                }
            })?;
        }
        current.map(|v| self.cast(v)).transpose()
    }

    /// Runs the getter chain.
    pub fn apply_getters(&self, value: Option<Value>, document: &Document) -> Option<Value> {
        self.getters
            .iter()
            .fold(value, |current, getter| getter(current, document))
    }

    /// Evaluates the default for `document`. Non-null defaults are cast.
    pub fn get_default(
        &self,
        document: &Document,
        _constructing: bool,
    ) -> CastResult<Option<Value>> {
        let raw = match &self.default {
            None => return Ok(None),
            Some(DefaultValue::Literal(v)) => Some(v.clone()),
            Some(DefaultValue::Factory(f)) => f(document),
        };
        match raw {
            Some(v) if !v.is_null() => self.cast(v).map(Some),
            other => Ok(other),
        }
    }

    /// Runs validators in order, stopping at the first rejection.
    pub async fn do_validate(
        &self,
        value: Option<Value>,
        scope: &Document,
    ) -> Result<(), ValidatorError> {
        for validator in &self.validators {
            if !validator.check(value.clone(), scope).await {
                return Err(ValidatorError::new(self.path.as_str(), validator.kind()));
            }
        }
        Ok(())
    }
}

fn map_string(value: Option<Value>, f: impl Fn(&str) -> String) -> Option<Value> {
    match value {
        Some(Value::String(s)) => Some(Value::String(f(&s))),
        other => other,
    }
}
