//! Schema subsystem
//!
//! A schema maps dotted paths to [`SchemaType`]s. Each type owns the cast for
//! its kind plus user-registered setters, getters, validators and a default.
//! Schemas are built once and shared read-only by every document.

mod definition;
mod errors;
mod loader;
mod types;
mod validator;

pub use definition::{
    IndexSpec, PathType, Schema, SchemaBuilder, SchemaOptions, StrictMode, VirtualGetter,
    VirtualSetter, VirtualType, RESERVED_PATHS,
};
pub use errors::{CastError, CastResult, SchemaError, SchemaResult, ValidatorError};
pub use loader::{PathDefinition, SchemaDefinition, SchemaLoader};
pub use types::{
    DefaultFactory, DefaultValue, Getter, IndexKind, SchemaKind, SchemaType, Setter,
    SetterContext,
};
pub use validator::{AsyncCheck, SyncCheck, Validator};
