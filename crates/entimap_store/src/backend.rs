//! Store backend trait definition.

use crate::entity::Entity;
use crate::error::StoreResult;
use crate::key::Key;
use crate::query::{Query, QueryResults};

/// A hierarchical key-value entity store.
///
/// Backends are the remote side of entimap. They know keys, property bags
/// and queries; they know nothing about models, validation or hooks.
///
/// # Invariants
///
/// - `save_entities` completes incomplete keys and returns one key per input
///   entity, in input order
/// - `lookup` returns found entities in request order and silently omits
///   missing keys
/// - `delete` of a missing key succeeds
/// - queries scoped to an ancestor see every write to that entity group that
///   returned before the query started
/// - backends must be `Send + Sync` so one handle can serve many threads
///
/// Any call may fail with a retryable [`crate::StoreError`]; callers decide
/// whether to repeat it.
///
/// # Implementors
///
/// - [`super::InMemoryDatastore`] - reference store
/// - [`super::FlakyDatastore`] - failure-injecting wrapper
pub trait DatastoreBackend: Send + Sync {
    /// Looks up entities by complete key.
    ///
    /// # Errors
    ///
    /// Returns an error if a key is incomplete or the call fails.
    fn lookup(&self, keys: &[Key]) -> StoreResult<Vec<Entity>>;

    /// Runs a query and returns one page of results.
    ///
    /// # Errors
    ///
    /// Returns an error if the query is malformed, the cursor is invalid or
    /// the call fails.
    fn run_query(&self, query: &Query) -> StoreResult<QueryResults>;

    /// Upserts entities, completing incomplete keys.
    ///
    /// Returns the final key of each entity, positionally.
    ///
    /// # Errors
    ///
    /// Returns an error if a key has an incomplete ancestor or the call
    /// fails. On error no entity of the call is written.
    fn save_entities(&self, entities: Vec<Entity>) -> StoreResult<Vec<Key>>;

    /// Deletes entities by complete key.
    ///
    /// # Errors
    ///
    /// Returns an error if a key is incomplete or the call fails.
    fn delete(&self, keys: &[Key]) -> StoreResult<()>;

    /// Reserves `count` numeric ids for incomplete keys like `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if `key` has an incomplete ancestor or the call
    /// fails.
    fn allocate_ids(&self, key: &Key, count: usize) -> StoreResult<Vec<Key>>;
}
