//! Batch commits.
//!
//! A batch is split into slices of at most [`MAX_BATCH_SIZE`] models. Each
//! slice is validated as a whole, then written with a single store call.
//! `after_save` hooks run in reverse order once the write has returned, so
//! the last model prepared is the first to observe its id.

use crate::dataset::{apply_key, check_parent, ensure_same_parent, ensure_writable, Dataset};
use crate::error::CoreResult;
use crate::model::{Model, ModelExt};
use crate::translate::to_entity;
use entimap_store::Key;
use tracing::{debug, warn};

/// Largest number of entities written by one store call.
pub const MAX_BATCH_SIZE: usize = 500;

/// A model waiting for its key: position in the slice and index of its
/// entity in the write request.
#[derive(Debug, Clone, Copy)]
struct Pending {
    position: usize,
    entity_index: usize,
}

impl Dataset {
    /// Saves many models, [`MAX_BATCH_SIZE`] per store call.
    ///
    /// Per slice: if any model fails validation, nothing in the slice is
    /// written and no hooks run. Models whose change check found nothing to
    /// write ([`ModelExt::is_excluded_from_save`]) are checked again and
    /// passed through untouched if still unchanged. The rest get `before_save`, one shared write, then
    /// their key and `after_save`. A slice whose write fails after retries
    /// leaves its models without ids; later slices still run.
    ///
    /// Returns the models in input order.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidParent`](crate::CoreError::InvalidParent)
    /// for an incomplete `parent` and
    /// [`CoreError::InvalidOperation`](crate::CoreError::InvalidOperation)
    /// if any model was destroyed or is persisted under a different parent.
    /// These are checked before any I/O.
    pub fn batch_save<M: Model>(
        &self,
        mut models: Vec<M>,
        parent: Option<&Key>,
    ) -> CoreResult<Vec<M>> {
        check_parent(parent)?;
        for model in &models {
            ensure_writable(model)?;
            ensure_same_parent(model, parent)?;
        }
        if models.is_empty() {
            return Ok(models);
        }

        let backend = self.backend()?;
        let retry = self.retry_policy();

        for (slice_index, slice) in models.chunks_mut(MAX_BATCH_SIZE).enumerate() {
            let invalid = slice.iter_mut().map(|m| !m.is_valid()).filter(|&b| b).count();
            if invalid > 0 {
                warn!(
                    kind = M::KIND,
                    slice = slice_index,
                    invalid,
                    "batch slice skipped, validation failed"
                );
                continue;
            }

            let mut stack: Vec<Pending> = Vec::with_capacity(slice.len());
            let mut entities = Vec::with_capacity(slice.len());
            for (position, model) in slice.iter_mut().enumerate() {
                if model.is_excluded_from_save() && !model.values_changed()? {
                    continue;
                }
                model.before_save();
                entities.push(to_entity(&*model, parent)?);
                stack.push(Pending {
                    position,
                    entity_index: entities.len() - 1,
                });
            }
            if entities.is_empty() {
                continue;
            }

            let count = entities.len();
            let written = retry.run_soft("batch_save", || backend.save_entities(entities.clone()));
            let Some(keys) = written else {
                warn!(
                    kind = M::KIND,
                    slice = slice_index,
                    count,
                    "batch slice not written"
                );
                continue;
            };
            debug!(kind = M::KIND, slice = slice_index, count, "batch slice written");

            while let Some(Pending {
                position,
                entity_index,
            }) = stack.pop()
            {
                let model = &mut slice[position];
                if let Some(key) = keys.get(entity_index) {
                    apply_key(model, key);
                }
                model.after_save();
            }
        }

        Ok(models)
    }
}
