//! Validation messages collected on a model.

/// Attribute name used for messages that concern the whole model.
pub const BASE: &str = "base";

/// Validation messages keyed by attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Errors {
    messages: Vec<(String, String)>,
}

impl Errors {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a message for `attribute`. Use [`BASE`] for model-wide messages.
    pub fn add(&mut self, attribute: impl Into<String>, message: impl Into<String>) {
        self.messages.push((attribute.into(), message.into()));
    }

    /// Returns true if no messages were added.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Messages for one attribute, in insertion order.
    pub fn on(&self, attribute: &str) -> Vec<&str> {
        self.messages
            .iter()
            .filter(|(a, _)| a == attribute)
            .map(|(_, m)| m.as_str())
            .collect()
    }

    /// Messages prefixed with their attribute name, `base` messages bare.
    pub fn full_messages(&self) -> Vec<String> {
        self.messages
            .iter()
            .map(|(attribute, message)| {
                if attribute == BASE {
                    message.clone()
                } else {
                    format!("{attribute} {message}")
                }
            })
            .collect()
    }

    /// Iterates over `(attribute, message)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.messages.iter().map(|(a, m)| (a.as_str(), m.as_str()))
    }

    /// Removes all messages.
    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
