//! # entimap Core
//!
//! Maps typed models onto a hierarchical key-value entity store.
//!
//! This crate provides:
//! - A per-type attribute table ([`Schema`]) and the [`Model`] trait
//! - Entity <-> model translation ([`to_entity`], [`from_entity`])
//! - Query construction from options ([`QueryOptions`], [`build_query`])
//! - Bounded exponential retry around store calls ([`RetryPolicy`])
//! - Validation-gated save/update/destroy with lifecycle hooks ([`Dataset`])
//! - Dirty tracking against a load-time baseline ([`ModelExt::values_changed`])
//! - Batch commits in slices of up to [`MAX_BATCH_SIZE`] models
//!
//! ## Consistency
//!
//! The store is strongly consistent only inside an entity group (entities
//! sharing a root key) and for lookups by key. Queries without an ancestor
//! are eventually consistent and, without a sort directive, return results
//! in store-defined order.
//!
//! ## Example
//!
//! ```rust,ignore
//! use entimap_core::{Config, Dataset, ModelExt, QueryOptions};
//!
//! let dataset = Dataset::with_backend(Config::new().project_id("demo"), backend);
//! let mut user = User::build([("name", "Alice".into())])?;
//! dataset.save(&mut user, None)?;
//!
//! let page = dataset.all::<User>(&QueryOptions::new().limit(10))?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod config;
mod connection;
mod dataset;
mod error;
mod keys;
mod model;
mod query;
mod retry;
mod translate;

#[cfg(test)]
mod test_models;

pub use batch::MAX_BATCH_SIZE;
pub use config::{Config, Credentials};
pub use connection::{BackendHandle, ConnectionProvider};
pub use dataset::{Dataset, Page};
pub use error::{CoreError, CoreResult};
pub use keys::{build_key, derive_ancestor_key, PARENT_KIND_PREFIX};
pub use model::{
    assign, remove_unmodified_children, Attribute, ChangeTracker, Errors, FromValue, Getter,
    Lifecycle, Model, ModelExt, ModelState, Schema, Setter, TypeMismatch, BASE,
};
pub use query::{build_query, FilterTriple, QueryOptions};
pub use retry::RetryPolicy;
pub use translate::{from_entities, from_entity, to_entity};

pub use entimap_store::{
    Cursor, DatastoreBackend, Direction, Entity, Key, KeyId, Operator, Query, StoreError, Value,
};
