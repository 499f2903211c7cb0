//! Observable events
//!
//! Every log line names one of these events.

use std::fmt;

use super::logger::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Schema definitions loaded from disk
    SchemasLoaded,
    /// Document hydrated from stored properties
    DocumentInit,
    /// A cast or setter failure was stored as the pending save error
    CastDeferred,
    /// A pending save error failed a pre-save
    SaveErrorReplayed,
    /// An undeclared path was ignored under strict mode
    StrictPathDropped,
    /// An undeclared path was rejected under strict mode
    StrictPathRejected,
    /// validate() found no failing path
    ValidationPassed,
    /// validate() produced an aggregate error
    ValidationFailed,
    /// A collection's pending operation collapsed to a full replacement
    AtomicCollapsed,
    /// Modified state cleared after a persist
    DocumentReset,
    /// A model hook returned an error
    HookFailed,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::SchemasLoaded => "SCHEMAS_LOADED",
            Event::DocumentInit => "DOCUMENT_INIT",
            Event::CastDeferred => "CAST_DEFERRED",
            Event::SaveErrorReplayed => "SAVE_ERROR_REPLAYED",
            Event::StrictPathDropped => "STRICT_PATH_DROPPED",
            Event::StrictPathRejected => "STRICT_PATH_REJECTED",
            Event::ValidationPassed => "VALIDATION_PASSED",
            Event::ValidationFailed => "VALIDATION_FAILED",
            Event::AtomicCollapsed => "ATOMIC_COLLAPSED",
            Event::DocumentReset => "DOCUMENT_RESET",
            Event::HookFailed => "HOOK_FAILED",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::SchemasLoaded | Event::ValidationFailed => Severity::Info,
            Event::CastDeferred | Event::SaveErrorReplayed | Event::StrictPathRejected => {
                Severity::Warn
            }
            Event::HookFailed => Severity::Error,
            Event::DocumentInit
            | Event::StrictPathDropped
            | Event::ValidationPassed
            | Event::AtomicCollapsed
            | Event::DocumentReset => Severity::Trace,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
