//! Models
//!
//! A [`Model`] binds a name and a schema to a hook pipeline. It creates new
//! documents, hydrates stored ones, and brackets a persistence write:
//!
//! 1. `pre_save`: replay the pending save error, run pre-validate hooks,
//!    validate, run pre-save hooks
//! 2. the caller persists `doc.dirty()`
//! 3. `complete_save`: reset, mark not new, run post-save hooks

mod hooks;

pub use hooks::{FnHook, Hook, HookFuture, Hooks, Phase};

use std::sync::Arc;

use crate::document::{Document, DocumentError, DocumentResult, Selection};
use crate::observability::{log_event_with_fields, Event};
use crate::schema::{IndexSpec, Schema, SchemaLoader};
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct Model {
    name: String,
    schema: Arc<Schema>,
    hooks: Hooks,
}

impl Model {
    pub fn new(name: impl Into<String>, schema: Arc<Schema>) -> Self {
        Self {
            name: name.into(),
            schema,
            hooks: Hooks::new(),
        }
    }

    /// Model for a schema registered with `loader`.
    pub fn from_loader(loader: &SchemaLoader, name: &str) -> Option<Self> {
        loader.get(name).map(|schema| Self::new(name, schema))
    }

    /// Append a hook to a phase
    pub fn hook(mut self, phase: Phase, hook: impl Hook + 'static) -> Self {
        self.hooks.register(phase, hook);
        self
    }

    /// Append a synchronous closure hook to a phase
    pub fn hook_fn<F>(self, phase: Phase, name: &str, f: F) -> Self
    where
        F: Fn(&mut Document) -> DocumentResult<()> + Send + Sync + 'static,
    {
        self.hook(phase, FnHook::new(name, f))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    pub fn indexes(&self) -> Vec<IndexSpec> {
        self.schema.indexes()
    }

    /// A new document, optionally assigned from an object value.
    pub fn create(&self, values: Option<Value>) -> DocumentResult<Document> {
        match values {
            Some(values) => Document::with_values(Arc::clone(&self.schema), values),
            None => Ok(Document::new(Arc::clone(&self.schema))),
        }
    }

    /// A document for stored properties. `selection` records which paths
    /// the query fetched.
    pub fn hydrate(&self, raw: Value, selection: Option<Selection>) -> Document {
        let mut doc = Document::existing(Arc::clone(&self.schema), selection);
        doc.init(raw);
        doc
    }

    /// Checks the document before a write. Fails with the pending save
    /// error first (clearing it), then with validation or hook errors.
    pub async fn pre_save(&self, doc: &mut Document) -> DocumentResult<()> {
        if let Some(err) = doc.take_save_error() {
            log_event_with_fields(
                Event::SaveErrorReplayed,
                &[("code", err.code()), ("model", self.name.as_str())],
            );
            return Err(err);
        }
        self.hooks.run(Phase::PreValidate, doc).await?;
        doc.validate().await.map_err(DocumentError::Validation)?;
        self.hooks.run(Phase::PreSave, doc).await
    }

    /// Bookkeeping after a successful write.
    pub async fn complete_save(&self, doc: &mut Document) -> DocumentResult<()> {
        doc.reset();
        doc.set_is_new(false);
        self.hooks.run(Phase::PostSave, doc).await
    }
}
