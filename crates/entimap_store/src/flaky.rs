//! Failure-injecting store wrapper.

use crate::backend::DatastoreBackend;
use crate::entity::Entity;
use crate::error::{StoreError, StoreResult};
use crate::key::Key;
use crate::query::{Query, QueryResults};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Wraps a backend and fails calls on demand.
///
/// Injected failures are [`StoreError::Unavailable`], which is retryable.
/// Every call is counted whether or not it fails, so tests can assert the
/// exact number of attempts a retry loop made.
///
/// # Example
///
/// ```rust
/// use entimap_store::{DatastoreBackend, Entity, FlakyDatastore, InMemoryDatastore, Key};
///
/// let store = FlakyDatastore::new(InMemoryDatastore::new());
/// store.fail_next(1);
/// assert!(store.save_entities(vec![Entity::new(Key::new("User"))]).is_err());
/// assert!(store.save_entities(vec![Entity::new(Key::new("User"))]).is_ok());
/// assert_eq!(store.save_attempts(), 2);
/// ```
#[derive(Debug, Default)]
pub struct FlakyDatastore<B> {
    inner: B,
    fail_remaining: AtomicUsize,
    fail_always: AtomicBool,
    save_attempts: AtomicUsize,
    lookup_attempts: AtomicUsize,
    query_attempts: AtomicUsize,
    delete_attempts: AtomicUsize,
}

impl<B: DatastoreBackend> FlakyDatastore<B> {
    /// Wraps a backend. No failures are injected until requested.
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            fail_remaining: AtomicUsize::new(0),
            fail_always: AtomicBool::new(false),
            save_attempts: AtomicUsize::new(0),
            lookup_attempts: AtomicUsize::new(0),
            query_attempts: AtomicUsize::new(0),
            delete_attempts: AtomicUsize::new(0),
        }
    }

    /// Returns the wrapped backend.
    pub fn inner(&self) -> &B {
        &self.inner
    }

    /// Fails the next `count` calls of any operation.
    pub fn fail_next(&self, count: usize) {
        self.fail_remaining.store(count, Ordering::SeqCst);
    }

    /// Fails every call until [`Self::heal`].
    pub fn fail_always(&self) {
        self.fail_always.store(true, Ordering::SeqCst);
    }

    /// Stops injecting failures.
    pub fn heal(&self) {
        self.fail_always.store(false, Ordering::SeqCst);
        self.fail_remaining.store(0, Ordering::SeqCst);
    }

    /// Number of `save_entities` calls seen.
    pub fn save_attempts(&self) -> usize {
        self.save_attempts.load(Ordering::SeqCst)
    }

    /// Number of `lookup` calls seen.
    pub fn lookup_attempts(&self) -> usize {
        self.lookup_attempts.load(Ordering::SeqCst)
    }

    /// Number of `run_query` calls seen.
    pub fn query_attempts(&self) -> usize {
        self.query_attempts.load(Ordering::SeqCst)
    }

    /// Number of `delete` calls seen.
    pub fn delete_attempts(&self) -> usize {
        self.delete_attempts.load(Ordering::SeqCst)
    }

    fn inject(&self, counter: &AtomicUsize, operation: &str) -> StoreResult<()> {
        counter.fetch_add(1, Ordering::SeqCst);
        if self.fail_always.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable(format!("injected {operation} failure")));
        }
        let consumed = self
            .fail_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if consumed.is_ok() {
            return Err(StoreError::unavailable(format!("injected {operation} failure")));
        }
        Ok(())
    }
}

impl<B: DatastoreBackend> DatastoreBackend for FlakyDatastore<B> {
    fn lookup(&self, keys: &[Key]) -> StoreResult<Vec<Entity>> {
        self.inject(&self.lookup_attempts, "lookup")?;
        self.inner.lookup(keys)
    }

    fn run_query(&self, query: &Query) -> StoreResult<QueryResults> {
        self.inject(&self.query_attempts, "query")?;
        self.inner.run_query(query)
    }

    fn save_entities(&self, entities: Vec<Entity>) -> StoreResult<Vec<Key>> {
        self.inject(&self.save_attempts, "save")?;
        self.inner.save_entities(entities)
    }

    fn delete(&self, keys: &[Key]) -> StoreResult<()> {
        self.inject(&self.delete_attempts, "delete")?;
        self.inner.delete(keys)
    }

    fn allocate_ids(&self, key: &Key, count: usize) -> StoreResult<Vec<Key>> {
        self.inner.allocate_ids(key, count)
    }
}
