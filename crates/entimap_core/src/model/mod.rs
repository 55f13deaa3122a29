//! Typed models and their per-type attribute tables.
//!
//! A model is a plain struct that implements [`Model`]: it names its kind,
//! exposes a static [`Schema`] listing its persisted attributes, and embeds
//! a [`ModelState`] that holds identity, validation errors and change
//! tracking. Everything else (attribute access by name, validation, dirty
//! checks) comes from the blanket [`ModelExt`] implementation.
//!
//! ```rust
//! use entimap_core::{assign, Attribute, Errors, Model, ModelExt, ModelState, Schema, Value};
//! use std::sync::LazyLock;
//!
//! #[derive(Debug, Default)]
//! struct User {
//!     name: String,
//!     state: ModelState,
//! }
//!
//! static USER: LazyLock<Schema<User>> = LazyLock::new(|| {
//!     Schema::new(vec![Attribute::new(
//!         "name",
//!         |u: &User| Value::from(u.name.clone()),
//!         |u: &mut User, v| assign(&mut u.name, v),
//!     )
//!     .tracked()])
//! });
//!
//! impl Model for User {
//!     const KIND: &'static str = "User";
//!
//!     fn schema() -> &'static Schema<Self> {
//!         &USER
//!     }
//!
//!     fn state(&self) -> &ModelState {
//!         &self.state
//!     }
//!
//!     fn state_mut(&mut self) -> &mut ModelState {
//!         &mut self.state
//!     }
//!
//!     fn validate(&self, errors: &mut Errors) {
//!         if self.name.is_empty() {
//!             errors.add("name", "can't be blank");
//!         }
//!     }
//! }
//!
//! let mut user = User::build([("name", Value::from("Alice"))]).unwrap();
//! assert!(user.is_valid());
//! assert!(!user.values_changed().unwrap());
//! ```

mod attribute;
mod errors;
pub(crate) mod tracking;

pub use attribute::{assign, Attribute, FromValue, Getter, Schema, Setter, TypeMismatch};
pub use errors::{Errors, BASE};
pub use tracking::{remove_unmodified_children, ChangeTracker};

use crate::error::{CoreError, CoreResult};
use crate::keys::{build_key, derive_ancestor_key};
use entimap_store::{Key, KeyId, Value};

/// Where a model is in its persistence lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Never written; has no id.
    New,
    /// Written and addressable by id.
    Persisted,
    /// Deleted from the store. The id is kept but writes are refused.
    Destroyed,
}

/// Identity, validation and tracking state embedded in every model.
#[derive(Debug, Clone, Default)]
pub struct ModelState {
    pub(crate) id: Option<KeyId>,
    pub(crate) parent: Option<Key>,
    pub(crate) entity_property_values: Option<Vec<(String, Value)>>,
    pub(crate) errors: Errors,
    pub(crate) tracker: ChangeTracker,
    pub(crate) marked_for_destruction: bool,
    pub(crate) exclude_from_save: bool,
    pub(crate) destroyed: bool,
}

impl ModelState {
    /// Returns the change tracker.
    pub fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    /// Result of the last [`ModelExt::values_changed`] call, inverted.
    pub fn exclude_from_save(&self) -> bool {
        self.exclude_from_save
    }
}

/// A typed object persisted as an entity of kind [`Model::KIND`].
///
/// Hooks default to no-ops. `before_*` hooks run after validation passes
/// and before the entity is built; `after_*` hooks run only when the store
/// call succeeded.
pub trait Model: Default + Sized + 'static {
    /// Entity kind.
    const KIND: &'static str;

    /// Persisted attributes of this type.
    fn schema() -> &'static Schema<Self>;

    /// Embedded state.
    fn state(&self) -> &ModelState;

    /// Embedded state, mutably.
    fn state_mut(&mut self) -> &mut ModelState;

    /// Adds validation messages to `errors`. A model with no messages is
    /// valid.
    fn validate(&self, _errors: &mut Errors) {}

    /// Runs before an insert or save.
    fn before_save(&mut self) {}

    /// Runs after a successful save; the id is already set.
    fn after_save(&mut self) {}

    /// Runs before an update write.
    fn before_update(&mut self) {}

    /// Runs after a successful update.
    fn after_update(&mut self) {}

    /// Runs before a delete.
    fn before_destroy(&mut self) {}

    /// Runs after a successful delete.
    fn after_destroy(&mut self) {}

    /// Prunes nested child collections down to modified children.
    ///
    /// # Errors
    ///
    /// Implementations forward [`remove_unmodified_children`] errors.
    fn remove_unmodified_children(&mut self) -> CoreResult<()> {
        Ok(())
    }
}

/// Operations available on every [`Model`].
pub trait ModelExt: Model {
    /// Builds a new model from attribute values. The values become the
    /// tracking baseline.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownAttribute`] or
    /// [`CoreError::AttributeType`] for a bad pair.
    fn build<I, K>(attributes: I) -> CoreResult<Self>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let mut model = Self::default();
        model.assign_attributes(attributes)?;
        model.reload();
        Ok(model)
    }

    /// Store identifier, `None` until saved.
    fn id(&self) -> Option<&KeyId> {
        self.state().id.as_ref()
    }

    /// Parent key, if the model lives under one.
    fn parent_key(&self) -> Option<&Key> {
        self.state().parent.as_ref()
    }

    /// Identifier of the parent key.
    fn parent_id(&self) -> Option<&KeyId> {
        self.parent_key().and_then(Key::id)
    }

    /// Places a new model under the derived ancestor key for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`] on a persisted model; moving
    /// an entity takes a delete and a re-create.
    fn set_parent_id(&mut self, id: impl Into<KeyId>) -> CoreResult<()> {
        self.set_parent_key(derive_ancestor_key(Self::KIND, id))
    }

    /// Places a new model under `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`] on a persisted model and
    /// [`CoreError::InvalidParent`] for an incomplete key.
    fn set_parent_key(&mut self, parent: Key) -> CoreResult<()> {
        if self.id().is_some() && self.parent_key() != Some(&parent) {
            return Err(CoreError::invalid_operation(format!(
                "cannot move persisted {} to a new parent",
                Self::KIND
            )));
        }
        if !parent.is_complete() {
            return Err(CoreError::invalid_parent(format!(
                "parent {parent} is incomplete"
            )));
        }
        self.state_mut().parent = Some(parent);
        Ok(())
    }

    /// Key addressing this model. Incomplete while the model is new.
    fn key(&self) -> Key {
        build_key(Self::KIND, self.id().cloned(), self.parent_key().cloned())
    }

    /// Lifecycle stage.
    fn lifecycle(&self) -> Lifecycle {
        let state = self.state();
        if state.destroyed {
            Lifecycle::Destroyed
        } else if state.id.is_some() {
            Lifecycle::Persisted
        } else {
            Lifecycle::New
        }
    }

    /// Returns true if the model has been saved and not destroyed.
    fn is_persisted(&self) -> bool {
        self.lifecycle() == Lifecycle::Persisted
    }

    /// Returns true if the model has been destroyed.
    fn is_destroyed(&self) -> bool {
        self.lifecycle() == Lifecycle::Destroyed
    }

    /// Reads an attribute by name.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownAttribute`] for names outside the schema.
    fn get_attribute(&self, name: &str) -> CoreResult<Value> {
        Self::schema()
            .attribute(name)
            .map(|a| a.get(self))
            .ok_or_else(|| CoreError::unknown_attribute(Self::KIND, name))
    }

    /// Writes an attribute by name, marking tracked attributes dirty when
    /// the value changes.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownAttribute`] or [`CoreError::AttributeType`].
    fn set_attribute(&mut self, name: &str, value: Value) -> CoreResult<()> {
        let attribute = Self::schema()
            .attribute(name)
            .ok_or_else(|| CoreError::unknown_attribute(Self::KIND, name))?;

        if !attribute.is_tracked() {
            return attribute
                .set(self, value)
                .map_err(|m| CoreError::attribute_type(Self::KIND, name, m));
        }

        let before = attribute.get(self);
        attribute
            .set(self, value)
            .map_err(|m| CoreError::attribute_type(Self::KIND, name, m))?;
        if !tracking::same_value(&attribute.get(self), &before) {
            self.state_mut().tracker.mark_dirty(attribute.name());
        }
        Ok(())
    }

    /// Writes several attributes in order, stopping at the first error.
    ///
    /// # Errors
    ///
    /// Same as [`Self::set_attribute`].
    fn assign_attributes<I, K>(&mut self, attributes: I) -> CoreResult<()>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        for (name, value) in attributes {
            self.set_attribute(name.as_ref(), value)?;
        }
        Ok(())
    }

    /// Runs validation, replacing any previous messages.
    fn is_valid(&mut self) -> bool {
        let mut errors = Errors::new();
        self.validate(&mut errors);
        let valid = errors.is_empty();
        self.state_mut().errors = errors;
        valid
    }

    /// Messages from the last validation.
    fn errors(&self) -> &Errors {
        &self.state().errors
    }

    /// Returns true if the model needs writing: marked for destruction, or
    /// any tracked attribute dirty or different from its baseline. Records
    /// the inverse as the model's `exclude_from_save` flag.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TrackingMisuse`] if the type tracks nothing.
    fn values_changed(&mut self) -> CoreResult<bool> {
        tracking::values_changed(self)
    }

    /// Returns true if the tracked attribute changed since the baseline.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TrackingMisuse`] for untracked names.
    fn attribute_changed(&self, name: &str) -> CoreResult<bool> {
        tracking::attribute_changed(self, name)
    }

    /// Baseline value of a tracked attribute.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TrackingMisuse`] for untracked names.
    fn attribute_was(&self, name: &str) -> CoreResult<Option<Value>> {
        let name = tracking::ensure_tracked::<Self>(name)?;
        Ok(self.state().tracker.baseline(name).cloned())
    }

    /// Makes current values the new baseline and clears dirty flags.
    fn reload(&mut self) {
        tracking::reload(self);
    }

    /// Flags the model so change detection always reports it modified.
    fn mark_for_destruction(&mut self) {
        self.state_mut().marked_for_destruction = true;
    }

    /// Returns true if [`Self::mark_for_destruction`] was called.
    fn is_marked_for_destruction(&self) -> bool {
        self.state().marked_for_destruction
    }

    /// Returns true if the last change check found nothing to write.
    fn is_excluded_from_save(&self) -> bool {
        self.state().exclude_from_save
    }

    /// Raw property values captured when the model was loaded. `None` for
    /// models that were not loaded from the store.
    fn entity_property_values(&self) -> Option<&[(String, Value)]> {
        self.state().entity_property_values.as_deref()
    }
}

impl<M: Model> ModelExt for M {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_models::{Ingredient, Note};

    #[test]
    fn build_assigns_attributes() {
        let note = Note::build([
            ("title", Value::from("Groceries")),
            ("body", Value::from("milk, eggs")),
        ])
        .unwrap();

        assert_eq!(note.title, "Groceries");
        assert_eq!(note.body, "milk, eggs");
        assert_eq!(note.lifecycle(), Lifecycle::New);
        assert!(note.id().is_none());
        assert!(note.entity_property_values().is_none());
    }

    #[test]
    fn build_rejects_unknown_attribute() {
        let err = Note::build([("hooks", Value::from("x"))]).unwrap_err();
        assert!(matches!(err, CoreError::UnknownAttribute { .. }));
    }

    #[test]
    fn build_rejects_wrong_type() {
        let err = Note::build([("title", Value::Integer(4))]).unwrap_err();
        assert!(matches!(
            err,
            CoreError::AttributeType {
                expected: "text",
                found: "integer",
                ..
            }
        ));
    }

    #[test]
    fn get_attribute_by_name() {
        let note = Note::build([("title", Value::from("a"))]).unwrap();
        assert_eq!(note.get_attribute("title").unwrap(), Value::from("a"));
        assert!(note.get_attribute("missing").is_err());
    }

    #[test]
    fn validation_collects_messages() {
        let mut note = Note::default();
        assert!(!note.is_valid());
        assert_eq!(note.errors().full_messages(), vec!["title can't be blank"]);

        note.title = "ok".into();
        assert!(note.is_valid());
        assert!(note.errors().is_empty());
    }

    #[test]
    fn parent_id_derives_key() {
        let mut note = Note::default();
        note.set_parent_id(42).unwrap();

        assert_eq!(note.parent_id(), Some(&KeyId::Id(42)));
        assert_eq!(note.parent_key().unwrap().kind(), "ParentNote");
        assert_eq!(note.key().parent().unwrap().kind(), "ParentNote");
        assert!(!note.key().is_complete());
    }

    #[test]
    fn persisted_model_cannot_move() {
        let mut note = Note::default();
        note.state_mut().id = Some(KeyId::Id(1));

        assert!(matches!(
            note.set_parent_id(5),
            Err(CoreError::InvalidOperation { .. })
        ));
        assert!(note.parent_key().is_none());
    }

    #[test]
    fn incomplete_parent_rejected() {
        let mut note = Note::default();
        assert!(matches!(
            note.set_parent_key(Key::new("Folder")),
            Err(CoreError::InvalidParent { .. })
        ));
    }

    #[test]
    fn lifecycle_transitions() {
        let mut note = Note::default();
        assert_eq!(note.lifecycle(), Lifecycle::New);

        note.state_mut().id = Some(KeyId::Id(3));
        assert!(note.is_persisted());

        note.state_mut().destroyed = true;
        assert!(note.is_destroyed());
        assert_eq!(note.id(), Some(&KeyId::Id(3)));
    }

    #[test]
    fn tracked_set_marks_dirty_only_on_change() {
        let mut ingredient = Ingredient::build([("name", Value::from("flour"))]).unwrap();

        ingredient.set_attribute("name", "flour".into()).unwrap();
        assert!(!ingredient.state().tracker().is_dirty("name"));

        ingredient.set_attribute("name", "rye".into()).unwrap();
        assert!(ingredient.state().tracker().is_dirty("name"));
        assert_eq!(
            ingredient.attribute_was("name").unwrap(),
            Some(Value::from("flour"))
        );
    }

    #[test]
    fn untracked_set_never_marks_dirty() {
        let mut ingredient = Ingredient::build([("name", Value::from("flour"))]).unwrap();
        ingredient.set_attribute("position", Value::Integer(4)).unwrap();
        assert!(!ingredient.state().tracker().any_dirty());
        assert_eq!(ingredient.position, 4);
    }
}
