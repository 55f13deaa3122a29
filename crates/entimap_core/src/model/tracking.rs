//! Change tracking against a load-time baseline.
//!
//! Each tracked attribute has a baseline value captured when the model is
//! built or reloaded. Setting a tracked attribute through
//! [`ModelExt::set_attribute`](super::ModelExt::set_attribute) to a value
//! different from its current one marks it dirty; the flag stays set until
//! the next reload, even if the value is later set back. Fields mutated
//! directly are still detected by comparing against the baseline.

use super::{Model, ModelExt};
use crate::error::{CoreError, CoreResult};
use entimap_store::Value;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tracing::trace;

/// Baselines and dirty flags for a model's tracked attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeTracker {
    baselines: HashMap<&'static str, Value>,
    dirty: HashSet<&'static str>,
}

impl ChangeTracker {
    /// Baseline of `name`, if one was captured.
    pub fn baseline(&self, name: &str) -> Option<&Value> {
        self.baselines.get(name)
    }

    /// Returns true if `name` has been flagged dirty since the last reload.
    pub fn is_dirty(&self, name: &str) -> bool {
        self.dirty.contains(name)
    }

    /// Returns true if any attribute is flagged dirty.
    pub fn any_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub(crate) fn mark_dirty(&mut self, name: &'static str) {
        self.dirty.insert(name);
    }

    pub(crate) fn rebaseline(&mut self, baselines: HashMap<&'static str, Value>) {
        self.baselines = baselines;
        self.dirty.clear();
    }
}

/// Fails unless `M` tracks at least one attribute.
pub(crate) fn ensure_tracking<M: Model>() -> CoreResult<()> {
    if M::schema().has_tracked() {
        Ok(())
    } else {
        Err(CoreError::tracking_misuse(M::KIND, "*"))
    }
}

/// Fails unless `name` is a tracked attribute of `M`.
pub(crate) fn ensure_tracked<M: Model>(name: &str) -> CoreResult<&'static str> {
    match M::schema().attribute(name) {
        Some(attribute) if attribute.is_tracked() => Ok(attribute.name()),
        _ => Err(CoreError::tracking_misuse(M::KIND, name)),
    }
}

/// Captures current values as baselines and clears dirty flags.
pub(crate) fn reload<M: Model>(model: &mut M) {
    let baselines = M::schema()
        .tracked()
        .map(|a| (a.name(), a.get(model)))
        .collect();
    model.state_mut().tracker.rebaseline(baselines);
}

/// Returns true if the tracked attribute `name` is dirty or differs from
/// its baseline.
pub(crate) fn attribute_changed<M: Model>(model: &M, name: &str) -> CoreResult<bool> {
    let name = ensure_tracked::<M>(name)?;
    Ok(changed(model, name))
}

fn changed<M: Model>(model: &M, name: &'static str) -> bool {
    let tracker = &model.state().tracker;
    if tracker.is_dirty(name) {
        return true;
    }
    let current = M::schema().attribute(name).map(|a| a.get(model));
    match (tracker.baseline(name), current) {
        (Some(baseline), Some(current)) => !same_value(baseline, &current),
        _ => true,
    }
}

/// Value equality for change detection. NaN equals NaN.
pub(crate) fn same_value(a: &Value, b: &Value) -> bool {
    a.cmp_for_query(b) == Ordering::Equal
}

/// Decides whether the model needs writing and records the answer in its
/// `exclude_from_save` flag.
pub(crate) fn values_changed<M: Model>(model: &mut M) -> CoreResult<bool> {
    ensure_tracking::<M>()?;

    let changed = model.is_marked_for_destruction()
        || M::schema().tracked().any(|a| changed(&*model, a.name()));

    model.state_mut().exclude_from_save = !changed;
    trace!(kind = M::KIND, changed, "change detection");
    Ok(changed)
}

/// Drops children whose tracked values are unchanged since load.
///
/// Parent models call this from
/// [`Model::remove_unmodified_children`] on each child collection before a
/// save, so untouched nested records are not rewritten.
///
/// # Errors
///
/// Returns [`CoreError::TrackingMisuse`] if `C` tracks no attributes.
pub fn remove_unmodified_children<C: Model>(children: &mut Vec<C>) -> CoreResult<()> {
    ensure_tracking::<C>()?;

    let keep = children
        .iter_mut()
        .map(|child| child.values_changed())
        .collect::<CoreResult<Vec<bool>>>()?;
    let mut keep = keep.into_iter();
    children.retain(|_| keep.next().unwrap_or(false));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_models::{Ingredient, Note, Recipe};

    fn ingredient(name: &str) -> Ingredient {
        Ingredient::build([("name", Value::from(name))]).unwrap()
    }

    #[test]
    fn fresh_model_is_unchanged() {
        let mut ingredient = ingredient("flour");
        assert!(!ingredient.values_changed().unwrap());
        assert!(ingredient.state().exclude_from_save);
    }

    #[test]
    fn setting_same_value_is_not_a_change() {
        let mut ingredient = ingredient("flour");
        ingredient.set_attribute("name", "flour".into()).unwrap();
        assert!(!ingredient.values_changed().unwrap());
    }

    #[test]
    fn dirty_flag_is_sticky_until_reload() {
        let mut ingredient = ingredient("flour");

        ingredient.set_attribute("name", "sugar".into()).unwrap();
        ingredient.set_attribute("name", "flour".into()).unwrap();
        assert!(ingredient.values_changed().unwrap());
        assert!(!ingredient.state().exclude_from_save);

        ingredient.reload();
        assert!(!ingredient.values_changed().unwrap());
    }

    #[test]
    fn direct_mutation_is_detected() {
        let mut ingredient = ingredient("flour");
        ingredient.amount = Some(2.5);
        assert!(ingredient.attribute_changed("amount").unwrap());
        assert!(ingredient.values_changed().unwrap());
        assert_eq!(ingredient.attribute_was("amount").unwrap(), Some(Value::Null));
    }

    #[test]
    fn nan_amount_is_stable() {
        let mut ingredient = Ingredient::build([
            ("name", Value::from("salt")),
            ("amount", Value::Double(f64::NAN)),
        ])
        .unwrap();
        ingredient.reload();
        assert!(!ingredient.values_changed().unwrap());

        ingredient.set_attribute("amount", Value::Double(f64::NAN)).unwrap();
        assert!(!ingredient.state().tracker.is_dirty("amount"));
        assert!(!ingredient.attribute_changed("amount").unwrap());
    }

    #[test]
    fn marked_for_destruction_counts_as_change() {
        let mut ingredient = ingredient("flour");
        ingredient.mark_for_destruction();
        assert!(ingredient.values_changed().unwrap());
    }

    #[test]
    fn untracked_attribute_is_misuse() {
        let ingredient = ingredient("flour");
        assert!(matches!(
            ingredient.attribute_changed("position"),
            Err(CoreError::TrackingMisuse { .. })
        ));
        assert!(matches!(
            ingredient.attribute_was("nope"),
            Err(CoreError::TrackingMisuse { .. })
        ));
    }

    #[test]
    fn type_without_tracking_is_misuse() {
        let mut note = Note::build([("title", Value::from("x"))]).unwrap();
        assert!(matches!(
            note.values_changed(),
            Err(CoreError::TrackingMisuse { .. })
        ));
    }

    #[test]
    fn removes_unmodified_children() {
        let mut recipe =
            Recipe::with_ingredients(vec![ingredient("flour"), ingredient("eggs"), ingredient("milk")]);
        recipe.ingredients[1]
            .set_attribute("amount", Value::Double(3.0))
            .unwrap();
        recipe.ingredients[2].mark_for_destruction();

        recipe.remove_unmodified_children().unwrap();

        let names: Vec<_> = recipe.ingredients.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["eggs", "milk"]);
    }

    #[test]
    fn removing_children_without_tracking_fails() {
        let mut notes = vec![Note::default()];
        assert!(remove_unmodified_children(&mut notes).is_err());
        assert_eq!(notes.len(), 1);
    }
}
