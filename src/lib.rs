//! graphdoc - typed, change-tracked documents over graph database property bags
//!
//! - `schema`: path types, casting, setters/getters, validators, JSON loader
//! - `document`: per-path state, atomic collections, validation, dirty paths
//! - `model`: document factory and save lifecycle hooks
//! - `observability`: structured JSON-lines logging

pub mod document;
pub mod model;
pub mod observability;
pub mod schema;
pub mod value;

pub use document::{Document, DocumentError, DocumentResult, ValidationError};
pub use model::Model;
pub use schema::{Schema, SchemaKind, SchemaType};
pub use value::Value;
