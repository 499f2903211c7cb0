//! Document subsystem
//!
//! A [`Document`] wraps one record's property tree and tracks, per path,
//! whether the value was required, loaded from storage, defaulted or
//! modified. From that state it produces the minimal change set a persister
//! needs ([`Document::dirty`]) and validates only the paths that matter.
//!
//! Array-valued paths are held as [`AtomicCollection`]s so that in-place
//! edits can be persisted as push/pull/pop operations instead of full
//! rewrites.

mod atomic;
mod engine;
mod errors;
mod events;
mod selection;
mod serialize;
mod state;

pub use atomic::{AtomicCollection, AtomicOp, CollectionMut, PopEnd};
pub use engine::{DirtyPath, Document, Invalidation};
pub use errors::{DocumentError, DocumentResult, ValidationError};
pub use events::{DocumentEvent, Listener};
pub use selection::Selection;
pub use serialize::ToObjectOptions;
pub use state::{PathState, PathStateSet};
