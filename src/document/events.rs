//! Document lifecycle notifications
//!
//! Listeners are called synchronously, in registration order, from the
//! operation that raised the event.

use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentEvent {
    /// The document was hydrated from stored properties
    Init,
    /// A path entered the modified set
    Modified(String),
    /// Modified state was cleared after a persist
    Reset,
    /// validate() failed for these paths
    ValidationFailed(Vec<String>),
}

impl DocumentEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DocumentEvent::Init => "init",
            DocumentEvent::Modified(_) => "modified",
            DocumentEvent::Reset => "reset",
            DocumentEvent::ValidationFailed(_) => "validation_failed",
        }
    }
}

pub type Listener = Arc<dyn Fn(&DocumentEvent) + Send + Sync>;

pub(crate) fn emit(listeners: &[Listener], event: &DocumentEvent) {
    for listener in listeners {
        listener(event);
    }
}
