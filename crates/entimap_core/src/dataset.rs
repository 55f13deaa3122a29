//! Persistence operations.

use crate::config::Config;
use crate::connection::{BackendHandle, ConnectionProvider};
use crate::error::{CoreError, CoreResult};
use crate::keys::build_key;
use crate::model::{Model, ModelExt};
use crate::query::{build_query, FilterTriple, QueryOptions};
use crate::retry::RetryPolicy;
use crate::translate::{from_entities, from_entity, to_entity};
use entimap_store::{Cursor, Entity, Key, KeyId, Query, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// One page of models from [`Dataset::all`].
#[derive(Debug)]
pub struct Page<M> {
    /// Models in result order.
    pub models: Vec<M>,
    /// Cursor for the next page, `None` once results are exhausted.
    pub cursor: Option<Cursor>,
}

/// Entry point for reading and writing models.
///
/// Writes come in two flavours. Soft operations ([`save`](Self::save),
/// [`update`](Self::update), [`destroy`](Self::destroy)) return `Ok(false)`
/// when validation fails or the store call never succeeds. The strict
/// [`strict_save`](Self::strict_save) turns both into errors. Reads always
/// propagate store errors once retries are spent.
///
/// Each call blocks until the store answers, retrying transient failures
/// per the configured [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct Dataset {
    connection: Arc<ConnectionProvider>,
    retry: RetryPolicy,
}

impl Dataset {
    /// Creates a dataset over a connection provider.
    pub fn new(connection: Arc<ConnectionProvider>) -> Self {
        let retry = connection.config().retry.clone();
        Self { connection, retry }
    }

    /// Creates a dataset that always talks to `backend`.
    pub fn with_backend(config: Config, backend: BackendHandle) -> Self {
        Self::new(Arc::new(ConnectionProvider::with_backend(config, backend)))
    }

    /// Returns the connection provider.
    pub fn connection(&self) -> &Arc<ConnectionProvider> {
        &self.connection
    }

    /// Returns the retry policy applied to store calls.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub(crate) fn backend(&self) -> CoreResult<BackendHandle> {
        self.connection.handle()
    }

    /// Validates and writes a model, creating it if new.
    ///
    /// On success the model carries its store id, and its parent when the
    /// key has one. `Ok(false)` means validation failed (nothing was
    /// written, messages are in [`ModelExt::errors`]) or the write never
    /// succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidParent`] for an incomplete `parent` and
    /// [`CoreError::InvalidOperation`] for a destroyed model or for a
    /// persisted model given a different `parent`.
    pub fn save<M: Model>(&self, model: &mut M, parent: Option<&Key>) -> CoreResult<bool> {
        ensure_writable(model)?;
        check_parent(parent)?;
        ensure_same_parent(model, parent)?;
        let backend = self.backend()?;

        if !model.is_valid() {
            debug!(kind = M::KIND, errors = model.errors().len(), "save skipped, model invalid");
            return Ok(false);
        }

        model.before_save();
        let entity = to_entity(model, parent)?;
        let saved = self
            .retry
            .run_soft("save", || backend.save_entities(vec![entity.clone()]))
            .and_then(|keys| keys.into_iter().next());

        match saved {
            Some(key) => {
                debug!(kind = M::KIND, key = %key, "saved");
                apply_key(model, &key);
                model.after_save();
                Ok(true)
            }
            None => {
                warn!(kind = M::KIND, "save failed after retries");
                Ok(false)
            }
        }
    }

    /// Like [`save`](Self::save) but fails instead of returning `false`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EntityNotSaved`] with the validation messages
    /// when the model is invalid, and [`CoreError::Store`] when the write
    /// fails after retries. Misuse errors are the same as for
    /// [`save`](Self::save).
    pub fn strict_save<M: Model>(&self, model: &mut M, parent: Option<&Key>) -> CoreResult<()> {
        ensure_writable(model)?;
        check_parent(parent)?;
        ensure_same_parent(model, parent)?;
        let backend = self.backend()?;

        if !model.is_valid() {
            return Err(CoreError::entity_not_saved(
                M::KIND,
                model.errors().full_messages(),
            ));
        }

        model.before_save();
        let entity = to_entity(model, parent)?;
        let keys = self
            .retry
            .run_strict("save", || backend.save_entities(vec![entity.clone()]))?;
        let key = keys
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::entity_not_saved(M::KIND, Vec::new()))?;

        debug!(kind = M::KIND, key = %key, "saved");
        apply_key(model, &key);
        model.after_save();
        Ok(())
    }

    /// Assigns attributes and overwrites the stored entity.
    ///
    /// The whole property bag is rewritten, not just the assigned
    /// attributes, so the model should hold the full stored state (for
    /// example because it was loaded with [`find`](Self::find)).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`] for a new or destroyed model,
    /// and attribute errors from assignment.
    pub fn update<M, I, K>(&self, model: &mut M, attributes: I) -> CoreResult<bool>
    where
        M: Model,
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        ensure_writable(model)?;
        if model.id().is_none() {
            return Err(CoreError::invalid_operation(format!(
                "cannot update a {} that was never saved",
                M::KIND
            )));
        }
        let backend = self.backend()?;

        model.assign_attributes(attributes)?;
        if !model.is_valid() {
            debug!(kind = M::KIND, "update skipped, model invalid");
            return Ok(false);
        }

        model.before_update();
        let entity = to_entity(model, None)?;
        let written = self
            .retry
            .run_soft("update", || backend.save_entities(vec![entity.clone()]));

        if written.is_none() {
            warn!(kind = M::KIND, key = %model.key(), "update failed after retries");
            return Ok(false);
        }
        debug!(kind = M::KIND, key = %model.key(), "updated");
        model.after_update();
        Ok(true)
    }

    /// Deletes the model's entity.
    ///
    /// On success the model is [`Destroyed`](crate::Lifecycle::Destroyed):
    /// it keeps its id but refuses further writes.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`] for a new or already destroyed
    /// model.
    pub fn destroy<M: Model>(&self, model: &mut M) -> CoreResult<bool> {
        ensure_writable(model)?;
        if model.id().is_none() {
            return Err(CoreError::invalid_operation(format!(
                "cannot destroy a {} that was never saved",
                M::KIND
            )));
        }
        let backend = self.backend()?;

        model.before_destroy();
        let key = model.key();
        let deleted = self
            .retry
            .run_soft("destroy", || backend.delete(std::slice::from_ref(&key)));

        if deleted.is_none() {
            warn!(kind = M::KIND, key = %key, "destroy failed after retries");
            return Ok(false);
        }
        debug!(kind = M::KIND, key = %key, "destroyed");
        model.state_mut().destroyed = true;
        model.after_destroy();
        Ok(true)
    }

    /// Looks up the raw entity of kind `M` with `id`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidParent`] for an incomplete `parent` and
    /// [`CoreError::Store`] when the lookup fails after retries.
    pub fn find_entity<M: Model>(
        &self,
        id: impl Into<KeyId>,
        parent: Option<&Key>,
    ) -> CoreResult<Option<Entity>> {
        Ok(self.find_entities::<M, _, _>([id], parent)?.into_iter().next())
    }

    /// Looks up raw entities of kind `M`. Missing ids are omitted; found
    /// entities come back in request order.
    ///
    /// # Errors
    ///
    /// Same as [`find_entity`](Self::find_entity).
    pub fn find_entities<M, I, T>(&self, ids: I, parent: Option<&Key>) -> CoreResult<Vec<Entity>>
    where
        M: Model,
        I: IntoIterator<Item = T>,
        T: Into<KeyId>,
    {
        check_parent(parent)?;
        let keys: Vec<Key> = ids
            .into_iter()
            .map(|id| build_key(M::KIND, Some(id.into()), parent.cloned()))
            .collect();
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let backend = self.backend()?;
        let entities = self.retry.run_strict("lookup", || backend.lookup(&keys))?;
        debug!(
            kind = M::KIND,
            requested = keys.len(),
            found = entities.len(),
            "lookup"
        );
        Ok(entities)
    }

    /// Loads the model with `id`.
    ///
    /// # Errors
    ///
    /// Same as [`find_entity`](Self::find_entity), plus translation errors.
    pub fn find<M: Model>(
        &self,
        id: impl Into<KeyId>,
        parent: Option<&Key>,
    ) -> CoreResult<Option<M>> {
        from_entity(self.find_entity::<M>(id, parent)?)
    }

    /// Loads several models by id. Missing ids are omitted.
    ///
    /// # Errors
    ///
    /// Same as [`find`](Self::find).
    pub fn find_many<M, I, T>(&self, ids: I, parent: Option<&Key>) -> CoreResult<Vec<M>>
    where
        M: Model,
        I: IntoIterator<Item = T>,
        T: Into<KeyId>,
    {
        from_entities(self.find_entities::<M, _, _>(ids, parent)?)
    }

    /// Loads the first model whose properties equal every given value.
    ///
    /// Without an ancestor the query is eventually consistent.
    ///
    /// # Errors
    ///
    /// Query construction errors, and [`CoreError::Store`] when the query
    /// fails after retries.
    pub fn find_by<M, I, K>(&self, criteria: I, ancestor: Option<&Key>) -> CoreResult<Option<M>>
    where
        M: Model,
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut options = QueryOptions::new()
            .filters(
                criteria
                    .into_iter()
                    .map(|(property, value)| FilterTriple::new(property, "=", value)),
            )
            .limit(1);
        if let Some(ancestor) = ancestor {
            options = options.ancestor(ancestor.clone());
        }

        let query = build_query::<M>(&options)?;
        let backend = self.backend()?;
        let results = self.retry.run_strict("query", || backend.run_query(&query))?;
        from_entity(results.entities.into_iter().next())
    }

    /// Queries models of kind `M`.
    ///
    /// With a limit, returns one page and a cursor when more results exist.
    /// Without one, follows cursors until the results are exhausted.
    ///
    /// # Errors
    ///
    /// Query construction errors, store errors after retries, and
    /// translation errors.
    pub fn all<M: Model>(&self, options: &QueryOptions) -> CoreResult<Page<M>> {
        let mut query = build_query::<M>(options)?;
        let backend = self.backend()?;

        if options.limit.is_some() {
            let results = self.retry.run_strict("query", || backend.run_query(&query))?;
            debug!(
                kind = M::KIND,
                returned = results.entities.len(),
                more = results.more_results,
                "query page"
            );
            let cursor = results.end_cursor.filter(|_| results.more_results);
            return Ok(Page {
                models: from_entities(results.entities)?,
                cursor,
            });
        }

        let mut entities = Vec::new();
        loop {
            let results = self.retry.run_strict("query", || backend.run_query(&query))?;
            entities.extend(results.entities);
            match results.end_cursor {
                Some(cursor) if results.more_results => query.start_cursor = Some(cursor),
                _ => break,
            }
        }
        debug!(kind = M::KIND, returned = entities.len(), "query");
        Ok(Page {
            models: from_entities(entities)?,
            cursor: None,
        })
    }

    /// Builds the store query [`all`](Self::all) would run.
    ///
    /// # Errors
    ///
    /// Same as [`build_query`].
    pub fn build_query<M: Model>(&self, options: &QueryOptions) -> CoreResult<Query> {
        build_query::<M>(options)
    }
}

/// Copies a store-assigned key back onto the model.
pub(crate) fn apply_key<M: Model>(model: &mut M, key: &Key) {
    let state = model.state_mut();
    state.id = key.id().cloned();
    if let Some(parent) = key.parent() {
        state.parent = Some(parent.clone());
    }
}

pub(crate) fn ensure_writable<M: Model>(model: &M) -> CoreResult<()> {
    if model.is_destroyed() {
        return Err(CoreError::invalid_operation(format!(
            "{} {} was destroyed",
            M::KIND,
            model.key()
        )));
    }
    Ok(())
}

/// A persisted model stays under the parent it was written with. Moving it
/// means destroying it and saving a new one.
pub(crate) fn ensure_same_parent<M: Model>(model: &M, parent: Option<&Key>) -> CoreResult<()> {
    match parent {
        Some(parent) if model.id().is_some() && model.parent_key() != Some(parent) => {
            Err(CoreError::invalid_operation(format!(
                "{} {} cannot move under {parent}",
                M::KIND,
                model.key()
            )))
        }
        _ => Ok(()),
    }
}

pub(crate) fn check_parent(parent: Option<&Key>) -> CoreResult<()> {
    match parent {
        Some(parent) if !parent.is_complete() => Err(CoreError::invalid_parent(format!(
            "parent {parent} has no identifier"
        ))),
        _ => Ok(()),
    }
}
