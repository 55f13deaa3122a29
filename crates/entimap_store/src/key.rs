//! Entity keys and ancestor paths.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reserved property name that addresses an entity's key in filters.
pub const KEY_PROPERTY: &str = "__key__";

/// Identifier part of a key.
///
/// Integer ids are assigned by the store when an incomplete key is written.
/// String names are chosen by the caller.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum KeyId {
    /// Store-assigned numeric id.
    Id(i64),
    /// Caller-chosen name.
    Name(String),
}

impl KeyId {
    /// Returns the numeric id, if this is one.
    pub fn as_id(&self) -> Option<i64> {
        match self {
            KeyId::Id(id) => Some(*id),
            KeyId::Name(_) => None,
        }
    }

    /// Returns the name, if this is one.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            KeyId::Id(_) => None,
            KeyId::Name(name) => Some(name),
        }
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyId::Id(id) => write!(f, "{id}"),
            KeyId::Name(name) => write!(f, "{name:?}"),
        }
    }
}

impl From<i64> for KeyId {
    fn from(id: i64) -> Self {
        KeyId::Id(id)
    }
}

impl From<&str> for KeyId {
    fn from(name: &str) -> Self {
        KeyId::Name(name.to_string())
    }
}

impl From<String> for KeyId {
    fn from(name: String) -> Self {
        KeyId::Name(name)
    }
}

/// Key of an entity: kind, optional identifier and optional parent.
///
/// A key without identifier is *incomplete*. The store completes it on
/// write. Keys that share a root form an entity group; reads scoped to an
/// ancestor are strongly consistent within the group.
///
/// The parent of a persisted entity never changes. Moving an entity to
/// another parent means deleting it and writing it again under a new key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Key {
    kind: String,
    id: Option<KeyId>,
    parent: Option<Box<Key>>,
}

impl Key {
    /// Creates an incomplete key of the given kind.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: None,
            parent: None,
        }
    }

    /// Creates a complete key with a numeric id.
    pub fn with_id(kind: impl Into<String>, id: i64) -> Self {
        Self::new(kind).identified(KeyId::Id(id))
    }

    /// Creates a complete key with a caller-chosen name.
    pub fn with_name(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(kind).identified(KeyId::Name(name.into()))
    }

    /// Sets the identifier.
    #[must_use]
    pub fn identified(mut self, id: KeyId) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets the parent key.
    #[must_use]
    pub fn child_of(mut self, parent: Key) -> Self {
        self.parent = Some(Box::new(parent));
        self
    }

    /// Returns the kind.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Returns the identifier, if assigned.
    pub fn id(&self) -> Option<&KeyId> {
        self.id.as_ref()
    }

    /// Returns the parent key, if any.
    pub fn parent(&self) -> Option<&Key> {
        self.parent.as_deref()
    }

    /// Returns true if this key and all of its ancestors have identifiers.
    pub fn is_complete(&self) -> bool {
        self.id.is_some() && self.parent().map_or(true, Key::is_complete)
    }

    /// Returns true if every ancestor has an identifier.
    ///
    /// This is the condition for the store to complete the key on write.
    pub fn has_complete_ancestors(&self) -> bool {
        self.parent().map_or(true, Key::is_complete)
    }

    /// Returns the chain of keys from the root down to this key.
    pub fn path(&self) -> Vec<&Key> {
        let mut path = Vec::new();
        let mut current = Some(self);
        while let Some(key) = current {
            path.push(key);
            current = key.parent();
        }
        path.reverse();
        path
    }

    /// Returns the root of this key's entity group.
    pub fn root(&self) -> &Key {
        let mut current = self;
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    /// Returns true if `ancestor` is this key or one of its ancestors.
    pub fn has_ancestor(&self, ancestor: &Key) -> bool {
        self.path().into_iter().any(|key| key == ancestor)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(parent) = self.parent() {
            write!(f, "{parent}/")?;
        }
        match &self.id {
            Some(id) => write!(f, "{}:{id}", self.kind),
            None => write!(f, "{}:?", self.kind),
        }
    }
}
