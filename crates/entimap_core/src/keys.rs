//! Key derivation for models.

use entimap_store::{Key, KeyId};

/// Prefix of the kind used for derived ancestor keys.
pub const PARENT_KIND_PREFIX: &str = "Parent";

/// Derives the ancestor key for `kind` from a parent identifier.
///
/// The result has kind `"Parent" + kind`, so `derive_ancestor_key("User", 7)`
/// is `ParentUser:7`. Deterministic, no I/O.
pub fn derive_ancestor_key(kind: &str, id: impl Into<KeyId>) -> Key {
    Key::new(format!("{PARENT_KIND_PREFIX}{kind}")).identified(id.into())
}

/// Builds a model key.
///
/// With `id` the key addresses an existing entity (update); without it the
/// key is incomplete and the store assigns an identifier on write.
pub fn build_key(kind: &str, id: Option<KeyId>, parent: Option<Key>) -> Key {
    let mut key = Key::new(kind);
    if let Some(id) = id {
        key = key.identified(id);
    }
    if let Some(parent) = parent {
        key = key.child_of(parent);
    }
    key
}
