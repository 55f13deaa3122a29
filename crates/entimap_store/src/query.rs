//! Query wire types.

use crate::entity::Entity;
use crate::error::{StoreError, StoreResult};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Comparison operator of a property filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `=`
    Equal,
    /// `!=`
    NotEqual,
    /// `<`
    LessThan,
    /// `<=`
    LessThanOrEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanOrEqual,
    /// Property equals any element of an array value.
    In,
    /// Property equals no element of an array value.
    NotIn,
    /// Key has the filter key as ancestor (or is that key).
    HasAncestor,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operator::Equal => "=",
            Operator::NotEqual => "!=",
            Operator::LessThan => "<",
            Operator::LessThanOrEqual => "<=",
            Operator::GreaterThan => ">",
            Operator::GreaterThanOrEqual => ">=",
            Operator::In => "IN",
            Operator::NotIn => "NOT_IN",
            Operator::HasAncestor => "HAS_ANCESTOR",
        };
        f.write_str(s)
    }
}

/// A `(property, operator, value)` filter triple.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyFilter {
    /// Property name, or [`crate::KEY_PROPERTY`] for the entity key.
    pub property: String,
    /// Comparison operator.
    pub operator: Operator,
    /// Value compared against.
    pub value: Value,
}

impl PropertyFilter {
    /// Creates a filter triple.
    pub fn new(property: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            property: property.into(),
            operator,
            value: value.into(),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

/// A single sort directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyOrder {
    /// Property sorted on.
    pub property: String,
    /// Sort direction.
    pub direction: Direction,
}

/// Opaque continuation token for a paginated query.
///
/// Cursors are only meaningful to the store that produced them. The
/// token form ([`Cursor::to_token`]) is safe to embed in URLs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cursor(Vec<u8>);

#[derive(Serialize, Deserialize)]
struct CursorPayload {
    offset: u64,
}

impl Cursor {
    /// Creates a cursor from raw bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Encodes the cursor as a lowercase hex token.
    pub fn to_token(&self) -> String {
        hex::encode(&self.0)
    }

    /// Decodes a token produced by [`Cursor::to_token`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidCursor`] for odd-length or non-hex input.
    pub fn from_token(token: &str) -> StoreResult<Self> {
        hex::decode(token)
            .map(Self)
            .map_err(|e| StoreError::InvalidCursor(e.to_string()))
    }

    /// Creates an offset cursor (used by [`crate::InMemoryDatastore`]).
    pub(crate) fn at_offset(offset: u64) -> StoreResult<Self> {
        let mut bytes = Vec::new();
        ciborium::into_writer(&CursorPayload { offset }, &mut bytes)
            .map_err(|e| StoreError::Codec(e.to_string()))?;
        Ok(Self(bytes))
    }

    /// Reads back an offset cursor.
    pub(crate) fn offset(&self) -> StoreResult<u64> {
        let payload: CursorPayload = ciborium::from_reader(self.0.as_slice())
            .map_err(|e| StoreError::InvalidCursor(e.to_string()))?;
        Ok(payload.offset)
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_token())
    }
}

/// A query over one kind.
///
/// All filters are ANDed. Without sort directives, result order is
/// defined by the store and may differ between calls.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Kind queried.
    pub kind: String,
    /// Filters, ANDed.
    pub filters: Vec<PropertyFilter>,
    /// Sort directives, most significant first.
    pub order: Vec<PropertyOrder>,
    /// Properties returned; empty means all.
    pub projection: Vec<String>,
    /// Properties whose value combination must be unique in the results.
    pub distinct_on: Vec<String>,
    /// Resume position.
    pub start_cursor: Option<Cursor>,
    /// Maximum number of results.
    pub limit: Option<usize>,
}

impl Query {
    /// Creates an unfiltered query for a kind.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            filters: Vec::new(),
            order: Vec::new(),
            projection: Vec::new(),
            distinct_on: Vec::new(),
            start_cursor: None,
            limit: None,
        }
    }

    /// Adds a filter.
    #[must_use]
    pub fn filter(mut self, filter: PropertyFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Adds a sort directive.
    #[must_use]
    pub fn order_by(mut self, property: impl Into<String>, direction: Direction) -> Self {
        self.order.push(PropertyOrder {
            property: property.into(),
            direction,
        });
        self
    }

    /// Sets the limit.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the start cursor.
    #[must_use]
    pub fn start(mut self, cursor: Cursor) -> Self {
        self.start_cursor = Some(cursor);
        self
    }
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResults {
    /// Entities in result order.
    pub entities: Vec<Entity>,
    /// Position after the last returned entity.
    pub end_cursor: Option<Cursor>,
    /// True if resuming from `end_cursor` can return more entities.
    pub more_results: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn token_roundtrip() {
        let cursor = Cursor::at_offset(300).unwrap();
        let token = cursor.to_token();
        let decoded = Cursor::from_token(&token).unwrap();
        assert_eq!(decoded, cursor);
        assert_eq!(decoded.offset().unwrap(), 300);
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        assert!(matches!(
            Cursor::from_token("abc"),
            Err(StoreError::InvalidCursor(_))
        ));
        assert!(matches!(
            Cursor::from_token("zz"),
            Err(StoreError::InvalidCursor(_))
        ));
        assert!(matches!(
            Cursor::from_token("+f"),
            Err(StoreError::InvalidCursor(_))
        ));
    }

    #[test]
    fn garbage_bytes_are_not_an_offset() {
        let cursor = Cursor::from_bytes(vec![0xff, 0x00]);
        assert!(matches!(cursor.offset(), Err(StoreError::InvalidCursor(_))));
    }

    #[test]
    fn query_builder_methods() {
        let query = Query::new("User")
            .filter(PropertyFilter::new("age", Operator::GreaterThan, 18i64))
            .order_by("age", Direction::Descending)
            .limit(10);

        assert_eq!(query.kind, "User");
        assert_eq!(query.filters.len(), 1);
        assert_eq!(query.order[0].direction, Direction::Descending);
        assert_eq!(query.limit, Some(10));
    }

    #[test]
    fn operator_display() {
        assert_eq!(Operator::HasAncestor.to_string(), "HAS_ANCESTOR");
        assert_eq!(Operator::GreaterThanOrEqual.to_string(), ">=");
    }

    proptest! {
        #[test]
        fn offsets_survive_tokens(offset in any::<u64>()) {
            let token = Cursor::at_offset(offset).unwrap().to_token();
            prop_assert_eq!(Cursor::from_token(&token).unwrap().offset().unwrap(), offset);
        }
    }
}
