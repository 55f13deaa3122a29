//! Fixture models and datasets.
//!
//! [`User`] exercises every attribute flavour (tracked, untracked,
//! unindexed, optional, array). [`TestDataset`] wires a [`Dataset`] to a
//! fault-injecting in-memory store with instant retries.

use entimap_core::{
    assign, Attribute, Config, Dataset, Errors, KeyId, Model, ModelExt, ModelState,
    RetryPolicy, Schema, Value,
};
use entimap_store::{FlakyDatastore, InMemoryDatastore};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tempfile::TempDir;

/// A user record.
#[derive(Debug, Clone, Default)]
pub struct User {
    /// Display name. Tracked, required.
    pub name: String,
    /// E-mail address. Tracked.
    pub email: String,
    /// Age in years. Must not be negative.
    pub age: i64,
    /// Free text, excluded from indexes.
    pub bio: Option<String>,
    /// Labels.
    pub tags: Vec<String>,
    /// Id seen by the last `after_save` hook. Transient.
    pub saved_id: Option<KeyId>,
    /// Hook names in call order. Transient.
    pub hooks: Vec<&'static str>,
    state: ModelState,
}

static USER: LazyLock<Schema<User>> = LazyLock::new(|| {
    Schema::new(vec![
        Attribute::new(
            "name",
            |u: &User| Value::from(u.name.clone()),
            |u: &mut User, v| assign(&mut u.name, v),
        )
        .tracked(),
        Attribute::new(
            "email",
            |u: &User| Value::from(u.email.clone()),
            |u: &mut User, v| assign(&mut u.email, v),
        )
        .tracked(),
        Attribute::new(
            "age",
            |u: &User| Value::Integer(u.age),
            |u: &mut User, v| assign(&mut u.age, v),
        ),
        Attribute::new(
            "bio",
            |u: &User| Value::from(u.bio.clone()),
            |u: &mut User, v| assign(&mut u.bio, v),
        )
        .unindexed(),
        Attribute::new(
            "tags",
            |u: &User| Value::Array(u.tags.iter().cloned().map(Value::from).collect()),
            |u: &mut User, v| assign(&mut u.tags, v),
        ),
    ])
});

impl Model for User {
    const KIND: &'static str = "User";

    fn schema() -> &'static Schema<Self> {
        &USER
    }

    fn state(&self) -> &ModelState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ModelState {
        &mut self.state
    }

    fn validate(&self, errors: &mut Errors) {
        if self.name.trim().is_empty() {
            errors.add("name", "can't be blank");
        }
        if self.age < 0 {
            errors.add("age", "must not be negative");
        }
    }

    fn before_save(&mut self) {
        self.hooks.push("before_save");
    }

    fn after_save(&mut self) {
        self.hooks.push("after_save");
        self.saved_id = self.id().cloned();
    }
}

impl User {
    /// Persisted attribute values, for comparing two users.
    pub fn persisted_values(&self) -> Vec<(&'static str, Value)> {
        User::schema()
            .attributes()
            .iter()
            .map(|a| (a.name(), a.get(self)))
            .collect()
    }
}

/// Builds a valid user.
pub fn user(name: &str, age: i64) -> User {
    User::build([
        ("name", Value::from(name)),
        ("email", Value::from(format!("{}@example.test", name.to_lowercase()))),
        ("age", Value::Integer(age)),
    ])
    .expect("fixture attributes match the schema")
}

/// Builds `count` valid users named `user0`, `user1`, ...
pub fn users(count: usize) -> Vec<User> {
    (0..count)
        .map(|i| user(&format!("user{i}"), i64::try_from(i).unwrap_or(i64::MAX)))
        .collect()
}

/// A dataset over a fault-injecting in-memory store.
pub struct TestDataset {
    /// The dataset under test.
    pub dataset: Dataset,
    store: Arc<FlakyDatastore<InMemoryDatastore>>,
}

impl TestDataset {
    /// Creates a dataset with the default retry count and no delays.
    pub fn new() -> Self {
        Self::with_retries(RetryPolicy::default().max_retries)
    }

    /// Creates a dataset that retries `max_retries` times without delays.
    pub fn with_retries(max_retries: u32) -> Self {
        Self::over(InMemoryDatastore::new(), max_retries)
    }

    /// Creates a dataset over an existing store.
    pub fn over(store: InMemoryDatastore, max_retries: u32) -> Self {
        let store = Arc::new(FlakyDatastore::new(store));
        let config = Config::new()
            .project_id("entimap-test")
            .retry(RetryPolicy::new(max_retries).with_initial_delay(Duration::ZERO));
        Self {
            dataset: Dataset::with_backend(config, store.clone()),
            store,
        }
    }

    /// Returns the fault-injecting store.
    pub fn store(&self) -> &FlakyDatastore<InMemoryDatastore> {
        &self.store
    }

    /// Number of stored entities of `kind`.
    pub fn stored(&self, kind: &str) -> usize {
        self.store.inner().count_kind(kind)
    }
}

impl Default for TestDataset {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestDataset {
    type Target = Dataset;

    fn deref(&self) -> &Self::Target {
        &self.dataset
    }
}

/// A temporary directory for store snapshots, removed on drop.
pub struct SnapshotDir {
    dir: TempDir,
}

impl SnapshotDir {
    /// Creates the directory.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Directory path.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of the snapshot file inside the directory.
    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.path().join("store.cbor")
    }
}

impl Default for SnapshotDir {
    fn default() -> Self {
        Self::new()
    }
}
