//! Lifecycle hooks
//!
//! Ordered per-phase chains of async hooks. A hook receives the document
//! mutably and may reject the save by returning an error; the first error
//! stops the chain.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::document::{Document, DocumentResult};
use crate::observability::{log_event_with_fields, Event};

/// Future returned by a hook
pub type HookFuture<'a> = Pin<Box<dyn Future<Output = DocumentResult<()>> + Send + 'a>>;

/// Point in the save lifecycle a hook runs at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    /// Before validation
    PreValidate,
    /// After validation passed, before the write
    PreSave,
    /// After the write completed and the document was reset
    PostSave,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::PreValidate => "pre-validate",
            Phase::PreSave => "pre-save",
            Phase::PostSave => "post-save",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A lifecycle hook
pub trait Hook: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Run against the document
    fn run<'a>(&'a self, doc: &'a mut Document) -> HookFuture<'a>;
}

/// Adapts a synchronous closure into a hook.
pub struct FnHook<F> {
    name: String,
    f: F,
}

impl<F> FnHook<F>
where
    F: Fn(&mut Document) -> DocumentResult<()> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> Hook for FnHook<F>
where
    F: Fn(&mut Document) -> DocumentResult<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run<'a>(&'a self, doc: &'a mut Document) -> HookFuture<'a> {
        let result = (self.f)(doc);
        Box::pin(std::future::ready(result))
    }
}

/// Hook chains keyed by phase.
#[derive(Clone, Default)]
pub struct Hooks {
    chains: BTreeMap<Phase, Vec<Arc<dyn Hook>>>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (phase, chain) in &self.chains {
            let names: Vec<&str> = chain.iter().map(|h| h.name()).collect();
            map.entry(phase, &names);
        }
        map.finish()
    }
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a hook to a phase
    pub fn register(&mut self, phase: Phase, hook: impl Hook + 'static) {
        self.chains.entry(phase).or_default().push(Arc::new(hook));
    }

    /// Number of hooks in a phase
    pub fn count(&self, phase: Phase) -> usize {
        self.chains.get(&phase).map_or(0, Vec::len)
    }

    /// Run a phase's hooks in registration order
    pub async fn run(&self, phase: Phase, doc: &mut Document) -> DocumentResult<()> {
        let Some(chain) = self.chains.get(&phase) else {
            return Ok(());
        };
        for hook in chain {
            if let Err(err) = hook.run(doc).await {
                log_event_with_fields(
                    Event::HookFailed,
                    &[
                        ("code", err.code()),
                        ("hook", hook.name()),
                        ("phase", phase.as_str()),
                    ],
                );
                return Err(err);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentError;
    use crate::schema::Schema;
    use std::sync::Mutex;

    fn empty_doc() -> Document {
        Document::new(Arc::new(Schema::builder().build().unwrap()))
    }

    #[tokio::test]
    async fn test_hooks_run_in_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut hooks = Hooks::new();
        for name in ["first", "second"] {
            let order = Arc::clone(&order);
            hooks.register(
                Phase::PreSave,
                FnHook::new(name, move |_| {
                    order.lock().unwrap().push(name);
                    Ok(())
                }),
            );
        }

        let mut doc = empty_doc();
        hooks.run(Phase::PreSave, &mut doc).await.unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
        assert_eq!(hooks.count(Phase::PreSave), 2);
        assert_eq!(hooks.count(Phase::PostSave), 0);
    }

    #[tokio::test]
    async fn test_first_failure_stops_chain() {
        let ran = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&ran);
        let mut hooks = Hooks::new();
        hooks.register(
            Phase::PreSave,
            FnHook::new("reject", |_| Err(DocumentError::hook("pre-save", "reject", "no"))),
        );
        hooks.register(
            Phase::PreSave,
            FnHook::new("after", move |_| {
                *flag.lock().unwrap() = true;
                Ok(())
            }),
        );

        let mut doc = empty_doc();
        let err = hooks.run(Phase::PreSave, &mut doc).await.unwrap_err();
        assert_eq!(err.code(), "GRAPHDOC_HOOK_FAILED");
        assert!(!*ran.lock().unwrap());
    }

    #[tokio::test]
    async fn test_empty_phase_is_ok() {
        let mut doc = empty_doc();
        assert!(Hooks::new().run(Phase::PostSave, &mut doc).await.is_ok());
    }
}
