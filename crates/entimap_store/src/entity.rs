//! Entities: a key plus an ordered property bag.

use crate::key::Key;
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// A single named property of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    /// Property name.
    pub name: String,
    /// Property value.
    pub value: Value,
    /// When set, the store does not index the property. It can be read
    /// back but never matches a filter or sort.
    pub exclude_from_indexes: bool,
}

/// A stored record: key plus ordered properties.
///
/// Property order is the order of first insertion. Setting an existing
/// property replaces its value in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    key: Key,
    properties: Vec<Property>,
}

impl Entity {
    /// Creates an entity with no properties.
    pub fn new(key: Key) -> Self {
        Self {
            key,
            properties: Vec::new(),
        }
    }

    /// Returns the key.
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Replaces the key.
    ///
    /// Used by stores to complete a key on write.
    pub fn set_key(&mut self, key: Key) {
        self.key = key;
    }

    /// Sets an indexed property.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.set_property(name.into(), value.into(), false);
    }

    /// Sets a property that is excluded from indexes.
    pub fn set_unindexed(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.set_property(name.into(), value.into(), true);
    }

    fn set_property(&mut self, name: String, value: Value, exclude_from_indexes: bool) {
        if let Some(existing) = self.properties.iter_mut().find(|p| p.name == name) {
            existing.value = value;
            existing.exclude_from_indexes = exclude_from_indexes;
        } else {
            self.properties.push(Property {
                name,
                value,
                exclude_from_indexes,
            });
        }
    }

    /// Returns a property value by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.property(name).map(|p| &p.value)
    }

    /// Returns a property by name.
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Returns true if the property exists and is excluded from indexes.
    pub fn is_excluded_from_indexes(&self, name: &str) -> bool {
        self.property(name).is_some_and(|p| p.exclude_from_indexes)
    }

    /// Returns all properties in order.
    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    /// Keeps only the named properties, in their existing order.
    pub fn retain_properties(&mut self, names: &[String]) {
        self.properties.retain(|p| names.contains(&p.name));
    }

    /// Returns the property names and values in order.
    pub fn to_property_values(&self) -> Vec<(String, Value)> {
        self.properties
            .iter()
            .map(|p| (p.name.clone(), p.value.clone()))
            .collect()
    }

    /// Splits the entity into key and properties.
    pub fn into_parts(self) -> (Key, Vec<Property>) {
        (self.key, self.properties)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn properties_keep_insertion_order() {
        let mut entity = Entity::new(Key::new("User"));
        entity.set("name", "Alice");
        entity.set("age", 30i64);
        entity.set_unindexed("bio", "long text");

        let names: Vec<&str> = entity.properties().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["name", "age", "bio"]);
    }

    #[test]
    fn set_replaces_in_place() {
        let mut entity = Entity::new(Key::new("User"));
        entity.set("name", "Alice");
        entity.set("age", 30i64);
        entity.set("name", "Bob");

        assert_eq!(entity.properties().len(), 2);
        assert_eq!(entity.properties()[0].name, "name");
        assert_eq!(entity.get("name"), Some(&Value::from("Bob")));
    }

    #[test]
    fn index_exclusion_flag() {
        let mut entity = Entity::new(Key::new("User"));
        entity.set("name", "Alice");
        entity.set_unindexed("bio", "text");

        assert!(!entity.is_excluded_from_indexes("name"));
        assert!(entity.is_excluded_from_indexes("bio"));
        assert!(!entity.is_excluded_from_indexes("missing"));
    }

    #[test]
    fn retain_properties_projects() {
        let mut entity = Entity::new(Key::new("User"));
        entity.set("name", "Alice");
        entity.set("age", 30i64);
        entity.set("email", "a@example.com");

        entity.retain_properties(&["email".to_string(), "name".to_string()]);
        let names: Vec<&str> = entity.properties().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["name", "email"]);
    }
}
