//! Per-type attribute tables.

use entimap_store::{Key, Value};
use std::fmt;

/// A value did not have the type an attribute setter expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeMismatch {
    /// Type the setter accepts.
    pub expected: &'static str,
    /// Type it was given.
    pub found: &'static str,
}

impl TypeMismatch {
    /// Creates a mismatch report for `value`.
    pub fn new(expected: &'static str, value: &Value) -> Self {
        Self {
            expected,
            found: value.type_name(),
        }
    }
}

impl fmt::Display for TypeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected {}, found {}", self.expected, self.found)
    }
}

/// Conversion from a store value into a model field type.
pub trait FromValue: Sized {
    /// Converts the value or reports the mismatch.
    fn from_value(value: Value) -> Result<Self, TypeMismatch>;
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, TypeMismatch> {
        Ok(value)
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, TypeMismatch> {
        match value {
            Value::Text(s) => Ok(s),
            other => Err(TypeMismatch::new("text", &other)),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self, TypeMismatch> {
        match value {
            Value::Integer(n) => Ok(n),
            other => Err(TypeMismatch::new("integer", &other)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, TypeMismatch> {
        value
            .as_double()
            .ok_or_else(|| TypeMismatch::new("double", &value))
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, TypeMismatch> {
        value
            .as_bool()
            .ok_or_else(|| TypeMismatch::new("bool", &value))
    }
}

impl FromValue for Key {
    fn from_value(value: Value) -> Result<Self, TypeMismatch> {
        match value {
            Value::Key(k) => Ok(k),
            other => Err(TypeMismatch::new("key", &other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, TypeMismatch> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self, TypeMismatch> {
        match value {
            Value::Array(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(TypeMismatch::new("array", &other)),
        }
    }
}

/// Converts `value` and stores it in `slot`.
///
/// The usual body of an attribute setter:
///
/// ```rust
/// use entimap_core::{Attribute, Value};
///
/// #[derive(Default)]
/// struct Note {
///     title: String,
/// }
///
/// let title = Attribute::new(
///     "title",
///     |n: &Note| Value::from(n.title.clone()),
///     |n: &mut Note, v| entimap_core::assign(&mut n.title, v),
/// );
/// let mut note = Note::default();
/// (title.setter())(&mut note, "hello".into()).unwrap();
/// assert_eq!(note.title, "hello");
/// ```
pub fn assign<T: FromValue>(slot: &mut T, value: Value) -> Result<(), TypeMismatch> {
    *slot = T::from_value(value)?;
    Ok(())
}

/// Reads an attribute's current value from a model.
pub type Getter<M> = fn(&M) -> Value;

/// Writes a value into a model's field.
pub type Setter<M> = fn(&mut M, Value) -> Result<(), TypeMismatch>;

/// One persisted attribute of a model type.
pub struct Attribute<M> {
    name: &'static str,
    get: Getter<M>,
    set: Setter<M>,
    indexed: bool,
    tracked: bool,
}

impl<M> Attribute<M> {
    /// Creates an indexed, untracked attribute.
    pub fn new(name: &'static str, get: Getter<M>, set: Setter<M>) -> Self {
        Self {
            name,
            get,
            set,
            indexed: true,
            tracked: false,
        }
    }

    /// Excludes the attribute from store indexes.
    #[must_use]
    pub fn unindexed(mut self) -> Self {
        self.indexed = false;
        self
    }

    /// Enables change tracking for the attribute.
    #[must_use]
    pub fn tracked(mut self) -> Self {
        self.tracked = true;
        self
    }

    /// Attribute name, also the entity property name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns true unless the attribute is excluded from indexes.
    pub fn is_indexed(&self) -> bool {
        self.indexed
    }

    /// Returns true if the attribute is change-tracked.
    pub fn is_tracked(&self) -> bool {
        self.tracked
    }

    /// Reads the attribute from `model`.
    pub fn get(&self, model: &M) -> Value {
        (self.get)(model)
    }

    /// Writes the attribute on `model`.
    ///
    /// # Errors
    ///
    /// Returns the setter's [`TypeMismatch`].
    pub fn set(&self, model: &mut M, value: Value) -> Result<(), TypeMismatch> {
        (self.set)(model, value)
    }

    /// Returns the raw setter.
    pub fn setter(&self) -> Setter<M> {
        self.set
    }
}

impl<M> fmt::Debug for Attribute<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("indexed", &self.indexed)
            .field("tracked", &self.tracked)
            .finish()
    }
}

/// The persisted attributes of a model type, in declaration order.
///
/// Fields of the model that are not listed here are transient: they are
/// never written to or read from the store.
#[derive(Debug)]
pub struct Schema<M> {
    attributes: Vec<Attribute<M>>,
}

impl<M> Schema<M> {
    /// Creates a schema from attributes in declaration order.
    pub fn new(attributes: Vec<Attribute<M>>) -> Self {
        Self { attributes }
    }

    /// Returns all attributes in declaration order.
    pub fn attributes(&self) -> &[Attribute<M>] {
        &self.attributes
    }

    /// Looks up an attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&Attribute<M>> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Returns true if `name` is a persisted attribute.
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// Returns the change-tracked attributes.
    pub fn tracked(&self) -> impl Iterator<Item = &Attribute<M>> {
        self.attributes.iter().filter(|a| a.tracked)
    }

    /// Returns true if any attribute is change-tracked.
    pub fn has_tracked(&self) -> bool {
        self.tracked().next().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Sample {
        name: String,
        score: Option<i64>,
        tags: Vec<String>,
    }

    fn schema() -> Schema<Sample> {
        Schema::new(vec![
            Attribute::new(
                "name",
                |s: &Sample| Value::from(s.name.clone()),
                |s: &mut Sample, v| assign(&mut s.name, v),
            )
            .tracked(),
            Attribute::new(
                "score",
                |s: &Sample| Value::from(s.score),
                |s: &mut Sample, v| assign(&mut s.score, v),
            ),
            Attribute::new(
                "tags",
                |s: &Sample| Value::Array(s.tags.iter().cloned().map(Value::from).collect()),
                |s: &mut Sample, v| assign(&mut s.tags, v),
            )
            .unindexed(),
        ])
    }

    #[test]
    fn lookup_by_name() {
        let schema = schema();
        assert!(schema.has_attribute("name"));
        assert!(!schema.has_attribute("password"));
        assert!(!schema.attribute("tags").unwrap().is_indexed());
        assert_eq!(
            schema.tracked().map(Attribute::name).collect::<Vec<_>>(),
            vec!["name"]
        );
    }

    #[test]
    fn get_and_set() {
        let schema = schema();
        let mut sample = Sample::default();

        schema
            .attribute("score")
            .unwrap()
            .set(&mut sample, Value::Integer(9))
            .unwrap();
        schema
            .attribute("tags")
            .unwrap()
            .set(&mut sample, Value::Array(vec!["a".into(), "b".into()]))
            .unwrap();

        assert_eq!(sample.score, Some(9));
        assert_eq!(sample.tags, vec!["a", "b"]);
        assert_eq!(
            schema.attribute("score").unwrap().get(&sample),
            Value::Integer(9)
        );
    }

    #[test]
    fn null_clears_optional() {
        let schema = schema();
        let mut sample = Sample {
            score: Some(3),
            ..Sample::default()
        };
        schema
            .attribute("score")
            .unwrap()
            .set(&mut sample, Value::Null)
            .unwrap();
        assert_eq!(sample.score, None);
    }

    #[test]
    fn mismatch_is_reported() {
        let schema = schema();
        let mut sample = Sample::default();

        let err = schema
            .attribute("name")
            .unwrap()
            .set(&mut sample, Value::Integer(1))
            .unwrap_err();
        assert_eq!(err.expected, "text");
        assert_eq!(err.found, "integer");

        let err = schema
            .attribute("tags")
            .unwrap()
            .set(&mut sample, Value::Array(vec![Value::Bool(true)]))
            .unwrap_err();
        assert_eq!(err.expected, "text");
    }

    #[test]
    fn doubles_accept_integers() {
        assert_eq!(f64::from_value(Value::Integer(2)).unwrap(), 2.0);
        assert!(i64::from_value(Value::Double(2.0)).is_err());
    }
}
