//! bibstash-core: file-backed reference store for the bibstash
//! bibliography manager
//!
//! This crate implements the store that backs every higher-level
//! feature (CLI, HTTP, MCP): the record model and codec, identity
//! normalization, the reference entity, and the `Library` collection
//! with its five secondary indices and hash-based external-change
//! detection. Transports and formatting live elsewhere; they consume
//! this crate through the `Library` API and never mutate record
//! identity themselves.

pub mod codec;
pub mod error;
pub mod identity;
pub mod library;
pub mod record;
pub mod reference;

pub use error::LibraryError;
pub use library::{IdType, Library, OnIdCollision, UpdateOutcome};
pub use record::{CustomMeta, DateVariable, Name, Record};
pub use reference::Reference;
