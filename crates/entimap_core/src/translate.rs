//! Translation between models and store entities.

use crate::error::{CoreError, CoreResult};
use crate::keys::build_key;
use crate::model::{Model, ModelExt};
use entimap_store::{Entity, Key};
use tracing::{debug, trace};

/// Builds the entity for `model`.
///
/// Attributes are copied in declaration order with their index flags. The
/// key's parent is `parent` when given, else the model's stored parent.
///
/// # Errors
///
/// Returns [`CoreError::InvalidParent`] when `parent` is incomplete.
pub fn to_entity<M: Model>(model: &M, parent: Option<&Key>) -> CoreResult<Entity> {
    let parent = match parent {
        Some(parent) if !parent.is_complete() => {
            return Err(CoreError::invalid_parent(format!(
                "parent {parent} of {} has no identifier",
                M::KIND
            )));
        }
        Some(parent) => Some(parent.clone()),
        None => model.parent_key().cloned(),
    };

    let mut entity = Entity::new(build_key(M::KIND, model.id().cloned(), parent));
    for attribute in M::schema().attributes() {
        let value = attribute.get(model);
        if attribute.is_indexed() {
            entity.set(attribute.name(), value);
        } else {
            entity.set_unindexed(attribute.name(), value);
        }
    }
    Ok(entity)
}

/// Builds a model from a loaded entity. `None` in gives `None` out.
///
/// Properties without a matching attribute are kept in the model's
/// `entity_property_values` snapshot but otherwise ignored. The loaded
/// values become the tracking baseline.
///
/// # Errors
///
/// Returns [`CoreError::AttributeType`] when a stored value has the wrong
/// type for its attribute.
pub fn from_entity<M: Model>(entity: Option<Entity>) -> CoreResult<Option<M>> {
    let Some(entity) = entity else {
        return Ok(None);
    };

    let snapshot = entity.to_property_values();
    let (key, properties) = entity.into_parts();

    let mut model = M::default();
    {
        let state = model.state_mut();
        state.id = key.id().cloned();
        state.parent = key.parent().cloned();
        state.entity_property_values = Some(snapshot);
    }

    let schema = M::schema();
    for property in properties {
        match schema.attribute(&property.name) {
            Some(attribute) => attribute
                .set(&mut model, property.value)
                .map_err(|m| CoreError::attribute_type(M::KIND, property.name.as_str(), m))?,
            None => trace!(kind = M::KIND, property = %property.name, "skipping unknown property"),
        }
    }

    model.reload();
    debug!(kind = M::KIND, key = %key, "entity loaded");
    Ok(Some(model))
}

/// Builds models from loaded entities, preserving order.
///
/// # Errors
///
/// Fails on the first entity [`from_entity`] rejects.
pub fn from_entities<M, I>(entities: I) -> CoreResult<Vec<M>>
where
    M: Model,
    I: IntoIterator<Item = Entity>,
{
    entities
        .into_iter()
        .filter_map(|entity| from_entity::<M>(Some(entity)).transpose())
        .collect()
}
