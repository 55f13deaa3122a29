//! # entimap Store
//!
//! Entity store contract and reference implementation for entimap.
//!
//! This crate is the lowest layer of entimap. It defines the vocabulary the
//! mapping engine speaks to a hierarchical key-value entity store:
//!
//! - [`Key`] - kind, identifier and optional parent key
//! - [`Value`] and [`Entity`] - an ordered property bag with per-property
//!   index exclusion
//! - [`Query`] - filters, sort directives, projection, distinct-on, cursor
//!   and limit
//! - [`DatastoreBackend`] - the four store primitives (lookup, query, save,
//!   delete)
//!
//! ## Design Principles
//!
//! - Backends are dumb entity stores: no validation, hooks or models
//! - Identifiers are assigned by the store on write
//! - Cursors are opaque to callers
//! - Backends must be `Send + Sync` so one handle can serve many threads
//!
//! ## Available Backends
//!
//! - [`InMemoryDatastore`] - reference store for tests and local use
//! - [`FlakyDatastore`] - wrapper that injects retryable failures
//!
//! ## Example
//!
//! ```rust
//! use entimap_store::{DatastoreBackend, Entity, InMemoryDatastore, Key};
//!
//! let store = InMemoryDatastore::new();
//! let mut entity = Entity::new(Key::new("User"));
//! entity.set("name", "Alice");
//! let keys = store.save_entities(vec![entity]).unwrap();
//! assert!(keys[0].is_complete());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod entity;
mod error;
mod flaky;
mod key;
mod memory;
mod query;
mod value;

pub use backend::DatastoreBackend;
pub use entity::{Entity, Property};
pub use error::{StoreError, StoreResult};
pub use flaky::FlakyDatastore;
pub use key::{Key, KeyId, KEY_PROPERTY};
pub use memory::InMemoryDatastore;
pub use query::{Cursor, Direction, Operator, PropertyFilter, PropertyOrder, Query, QueryResults};
pub use value::Value;
