//! Models shared by unit tests.

use crate::config::Config;
use crate::dataset::Dataset;
use crate::model::{assign, Attribute, Errors, Model, ModelExt, ModelState, Schema};
use crate::retry::RetryPolicy;
use crate::CoreResult;
use entimap_store::{FlakyDatastore, InMemoryDatastore, KeyId, Value};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

/// Dataset over a fault-injecting in-memory store with instant retries.
pub(crate) fn test_dataset() -> (Dataset, Arc<FlakyDatastore<InMemoryDatastore>>) {
    let store = Arc::new(FlakyDatastore::new(InMemoryDatastore::new()));
    let config = Config::new()
        .project_id("test")
        .retry(RetryPolicy::new(5).with_initial_delay(Duration::ZERO));
    (Dataset::with_backend(config, store.clone()), store)
}

#[derive(Debug, Default)]
pub(crate) struct Note {
    pub(crate) title: String,
    pub(crate) body: String,
    pub(crate) pinned: bool,
    pub(crate) priority: i64,
    pub(crate) hooks: Vec<&'static str>,
    pub(crate) seen_id: Option<KeyId>,
    state: ModelState,
}

static NOTE: LazyLock<Schema<Note>> = LazyLock::new(|| {
    Schema::new(vec![
        Attribute::new(
            "title",
            |n: &Note| Value::from(n.title.clone()),
            |n: &mut Note, v| assign(&mut n.title, v),
        ),
        Attribute::new(
            "body",
            |n: &Note| Value::from(n.body.clone()),
            |n: &mut Note, v| assign(&mut n.body, v),
        )
        .unindexed(),
        Attribute::new(
            "pinned",
            |n: &Note| Value::Bool(n.pinned),
            |n: &mut Note, v| assign(&mut n.pinned, v),
        ),
        Attribute::new(
            "priority",
            |n: &Note| Value::Integer(n.priority),
            |n: &mut Note, v| assign(&mut n.priority, v),
        ),
    ])
});

impl Model for Note {
    const KIND: &'static str = "Note";

    fn schema() -> &'static Schema<Self> {
        &NOTE
    }

    fn state(&self) -> &ModelState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ModelState {
        &mut self.state
    }

    fn validate(&self, errors: &mut Errors) {
        if self.title.trim().is_empty() {
            errors.add("title", "can't be blank");
        }
    }

    fn before_save(&mut self) {
        self.hooks.push("before_save");
    }

    fn after_save(&mut self) {
        self.hooks.push("after_save");
        self.seen_id = self.id().cloned();
    }

    fn before_update(&mut self) {
        self.hooks.push("before_update");
    }

    fn after_update(&mut self) {
        self.hooks.push("after_update");
    }

    fn before_destroy(&mut self) {
        self.hooks.push("before_destroy");
    }

    fn after_destroy(&mut self) {
        self.hooks.push("after_destroy");
    }
}

#[derive(Debug, Default)]
pub(crate) struct Ingredient {
    pub(crate) name: String,
    pub(crate) amount: Option<f64>,
    pub(crate) position: i64,
    state: ModelState,
}

static INGREDIENT: LazyLock<Schema<Ingredient>> = LazyLock::new(|| {
    Schema::new(vec![
        Attribute::new(
            "name",
            |i: &Ingredient| Value::from(i.name.clone()),
            |i: &mut Ingredient, v| assign(&mut i.name, v),
        )
        .tracked(),
        Attribute::new(
            "amount",
            |i: &Ingredient| Value::from(i.amount),
            |i: &mut Ingredient, v| assign(&mut i.amount, v),
        )
        .tracked(),
        Attribute::new(
            "position",
            |i: &Ingredient| Value::Integer(i.position),
            |i: &mut Ingredient, v| assign(&mut i.position, v),
        ),
    ])
});

impl Model for Ingredient {
    const KIND: &'static str = "Ingredient";

    fn schema() -> &'static Schema<Self> {
        &INGREDIENT
    }

    fn state(&self) -> &ModelState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ModelState {
        &mut self.state
    }

    fn validate(&self, errors: &mut Errors) {
        if self.name.is_empty() {
            errors.add("name", "can't be blank");
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Recipe {
    pub(crate) title: String,
    pub(crate) ingredients: Vec<Ingredient>,
    state: ModelState,
}

static RECIPE: LazyLock<Schema<Recipe>> = LazyLock::new(|| {
    Schema::new(vec![Attribute::new(
        "title",
        |r: &Recipe| Value::from(r.title.clone()),
        |r: &mut Recipe, v| assign(&mut r.title, v),
    )
    .tracked()])
});

impl Recipe {
    pub(crate) fn with_ingredients(ingredients: Vec<Ingredient>) -> Self {
        Self {
            ingredients,
            ..Self::default()
        }
    }
}

impl Model for Recipe {
    const KIND: &'static str = "Recipe";

    fn schema() -> &'static Schema<Self> {
        &RECIPE
    }

    fn state(&self) -> &ModelState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ModelState {
        &mut self.state
    }

    fn remove_unmodified_children(&mut self) -> CoreResult<()> {
        crate::model::remove_unmodified_children(&mut self.ingredients)
    }
}
