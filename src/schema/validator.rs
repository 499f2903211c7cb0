//! Path validators
//!
//! A validator is either synchronous (returns a bool right away) or
//! asynchronous (returns a future of bool, e.g. a uniqueness lookup against
//! storage). Both receive the candidate value and the owning document.
//!
//! Built-ins:
//! - required: kind-aware presence
//! - min / max: numeric bounds, null and undefined pass
//! - enum: string membership, null and undefined pass
//! - regexp: string pattern, null, undefined and "" pass

use futures_util::future::BoxFuture;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

use super::types::SchemaKind;
use crate::document::Document;
use crate::value::Value;

/// Synchronous check.
pub type SyncCheck = Arc<dyn Fn(Option<&Value>, &Document) -> bool + Send + Sync>;

/// Asynchronous check. The future may borrow the document.
pub type AsyncCheck =
    Arc<dyn for<'a> Fn(Option<Value>, &'a Document) -> BoxFuture<'a, bool> + Send + Sync>;

#[derive(Clone)]
enum Check {
    Sync(SyncCheck),
    Async(AsyncCheck),
}

/// A named constraint on one path.
#[derive(Clone)]
pub struct Validator {
    kind: String,
    check: Check,
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.check {
            Check::Sync(_) => "sync",
            Check::Async(_) => "async",
        };
        write!(f, "Validator({}, {})", self.kind, mode)
    }
}

impl Validator {
    /// Create a synchronous validator reported as `kind` on failure.
    pub fn sync<F>(kind: impl Into<String>, check: F) -> Self
    where
        F: Fn(Option<&Value>, &Document) -> bool + Send + Sync + 'static,
    {
        Self {
            kind: kind.into(),
            check: Check::Sync(Arc::new(check)),
        }
    }

    /// Create an asynchronous validator reported as `kind` on failure.
    pub fn with_async<F>(kind: impl Into<String>, check: F) -> Self
    where
        F: for<'a> Fn(Option<Value>, &'a Document) -> BoxFuture<'a, bool>
            + Send
            + Sync
            + 'static,
    {
        Self {
            kind: kind.into(),
            check: Check::Async(Arc::new(check)),
        }
    }

    pub fn required(kind: SchemaKind) -> Self {
        Self::sync("required", move |v, _| kind.check_required(v))
    }

    pub fn min(min: f64) -> Self {
        Self::sync("min", move |v, _| match v {
            None | Some(Value::Null) => true,
            Some(value) => value.as_f64().map_or(false, |n| n >= min),
        })
    }

    pub fn max(max: f64) -> Self {
        Self::sync("max", move |v, _| match v {
            None | Some(Value::Null) => true,
            Some(value) => value.as_f64().map_or(false, |n| n <= max),
        })
    }

    pub fn one_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let allowed: Vec<String> = values.into_iter().map(Into::into).collect();
        Self::sync("enum", move |v, _| match v {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => allowed.iter().any(|a| a == s),
            Some(_) => false,
        })
    }

    pub fn matches(pattern: Regex) -> Self {
        Self::sync("regexp", move |v, _| match v {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) if s.is_empty() => true,
            Some(Value::String(s)) => pattern.is_match(s),
            Some(_) => false,
        })
    }

    /// Failure kind reported in `ValidatorError`.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn is_async(&self) -> bool {
        matches!(self.check, Check::Async(_))
    }

    /// Evaluates the check against `value`.
    pub async fn check(&self, value: Option<Value>, scope: &Document) -> bool {
        match &self.check {
            Check::Sync(f) => f(value.as_ref(), scope),
            Check::Async(f) => f(value, scope).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passes(validator: &Validator, value: Option<Value>) -> bool {
        let schema = crate::schema::Schema::builder().build().unwrap();
        let doc = Document::new(std::sync::Arc::new(schema));
        futures_util::FutureExt::now_or_never(validator.check(value, &doc)).unwrap()
    }

    #[test]
    fn test_min_max() {
        let min = Validator::min(18.0);
        assert!(passes(&min, Some(Value::from(18))));
        assert!(!passes(&min, Some(Value::from(17))));
        assert!(passes(&min, None));
        assert!(passes(&min, Some(Value::Null)));

        let max = Validator::max(10.0);
        assert!(passes(&max, Some(Value::from(9.5))));
        assert!(!passes(&max, Some(Value::from(11))));
    }

    #[test]
    fn test_enum() {
        let v = Validator::one_of(["admin", "member"]);
        assert!(passes(&v, Some(Value::from("admin"))));
        assert!(!passes(&v, Some(Value::from("guest"))));
        assert!(passes(&v, None));
        assert_eq!(v.kind(), "enum");
    }

    #[test]
    fn test_match() {
        let v = Validator::matches(Regex::new(r"^[a-z]+@[a-z]+\.[a-z]+$").unwrap());
        assert!(passes(&v, Some(Value::from("a@b.io"))));
        assert!(!passes(&v, Some(Value::from("not-an-email"))));
        assert!(passes(&v, Some(Value::from(""))));
    }

    #[test]
    fn test_async_validator() {
        let v = Validator::with_async("slow", |value, _doc| {
            Box::pin(async move { value.is_some() })
        });
        assert!(v.is_async());
        assert!(passes(&v, Some(Value::from(1))));
        assert!(!passes(&v, None));
    }
}
