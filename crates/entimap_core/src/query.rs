//! Query construction from options.

use crate::error::{CoreError, CoreResult};
use crate::model::Model;
use entimap_store::{
    Cursor, Direction, Key, Operator, PropertyFilter, Query, Value, KEY_PROPERTY,
};

/// A `where` condition: property, operator string and value.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterTriple {
    /// Property name.
    pub property: String,
    /// One of `=`, `<`, `<=`, `>`, `>=`, `!=`, `in`, `not_in`.
    pub operator: String,
    /// Value compared against. `in` and `not_in` take an array.
    pub value: Value,
}

impl FilterTriple {
    /// Creates a condition.
    pub fn new(
        property: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            property: property.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }
}

/// Options for [`build_query`] and [`Dataset::all`](crate::Dataset::all).
///
/// Ascending sort properties apply before descending ones. All `where`
/// conditions are ANDed.
///
/// ```rust
/// use entimap_core::{Key, QueryOptions, Value};
///
/// let options = QueryOptions::new()
///     .ancestor(Key::with_id("ParentUser", 1))
///     .filter("age", ">=", 18)
///     .desc_order("created_at")
///     .limit(20);
/// assert_eq!(options.filters.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    /// Restricts results to descendants of this key.
    pub ancestor: Option<Key>,
    /// Resume position from a previous page.
    pub cursor: Option<Cursor>,
    /// Page size.
    pub limit: Option<usize>,
    /// Ascending sort properties.
    pub order: Vec<String>,
    /// Descending sort properties.
    pub desc_order: Vec<String>,
    /// Projected properties; empty for all.
    pub select: Vec<String>,
    /// Distinct-on properties.
    pub distinct_on: Vec<String>,
    /// `where` conditions.
    pub filters: Vec<FilterTriple>,
}

impl QueryOptions {
    /// Creates empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the ancestor.
    #[must_use]
    pub fn ancestor(mut self, key: Key) -> Self {
        self.ancestor = Some(key);
        self
    }

    /// Sets the start cursor.
    #[must_use]
    pub fn cursor(mut self, cursor: Cursor) -> Self {
        self.cursor = Some(cursor);
        self
    }

    /// Sets the page size.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Adds an ascending sort property.
    #[must_use]
    pub fn order(mut self, property: impl Into<String>) -> Self {
        self.order.push(property.into());
        self
    }

    /// Adds a descending sort property.
    #[must_use]
    pub fn desc_order(mut self, property: impl Into<String>) -> Self {
        self.desc_order.push(property.into());
        self
    }

    /// Adds a projected property.
    #[must_use]
    pub fn select(mut self, property: impl Into<String>) -> Self {
        self.select.push(property.into());
        self
    }

    /// Adds a distinct-on property.
    #[must_use]
    pub fn distinct_on(mut self, property: impl Into<String>) -> Self {
        self.distinct_on.push(property.into());
        self
    }

    /// Adds a `where` condition.
    #[must_use]
    pub fn filter(
        mut self,
        property: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.filters.push(FilterTriple::new(property, operator, value));
        self
    }

    /// Adds several `where` conditions.
    #[must_use]
    pub fn filters(mut self, triples: impl IntoIterator<Item = FilterTriple>) -> Self {
        self.filters.extend(triples);
        self
    }
}

fn parse_operator(op: &str) -> CoreResult<Operator> {
    let operator = match op.trim() {
        "=" | "==" => Operator::Equal,
        "!=" => Operator::NotEqual,
        "<" => Operator::LessThan,
        "<=" => Operator::LessThanOrEqual,
        ">" => Operator::GreaterThan,
        ">=" => Operator::GreaterThanOrEqual,
        other if other.eq_ignore_ascii_case("in") => Operator::In,
        other if other.eq_ignore_ascii_case("not_in") => Operator::NotIn,
        other => {
            return Err(CoreError::malformed_query(format!(
                "unknown operator {other:?}"
            )))
        }
    };
    Ok(operator)
}

fn check_property(role: &str, property: &str) -> CoreResult<()> {
    if property.trim().is_empty() {
        return Err(CoreError::malformed_query(format!(
            "{role} property name is empty"
        )));
    }
    Ok(())
}

fn compile_filter(triple: &FilterTriple) -> CoreResult<PropertyFilter> {
    check_property("filter", &triple.property)?;
    if triple.property == KEY_PROPERTY {
        return Err(CoreError::malformed_query(format!(
            "{KEY_PROPERTY} cannot be filtered directly; use the ancestor option"
        )));
    }

    let operator = parse_operator(&triple.operator)?;
    if matches!(operator, Operator::In | Operator::NotIn) && triple.value.as_array().is_none() {
        return Err(CoreError::malformed_query(format!(
            "{operator} on {} needs an array, got {}",
            triple.property,
            triple.value.type_name()
        )));
    }

    Ok(PropertyFilter::new(
        triple.property.clone(),
        operator,
        triple.value.clone(),
    ))
}

/// Builds a store query for `M` from options.
///
/// The ancestor option becomes a `HAS_ANCESTOR` filter on `__key__`.
/// Without sort properties the store decides the result order.
///
/// # Errors
///
/// Returns [`CoreError::MalformedQuery`] for an empty property name, an
/// unknown operator, a `__key__` condition, a non-array `in`/`not_in`
/// value, or a zero limit. Returns [`CoreError::InvalidParent`] for an
/// incomplete ancestor.
pub fn build_query<M: Model>(options: &QueryOptions) -> CoreResult<Query> {
    let mut query = Query::new(M::KIND);

    if let Some(ancestor) = &options.ancestor {
        if !ancestor.is_complete() {
            return Err(CoreError::invalid_parent(format!(
                "ancestor {ancestor} is incomplete"
            )));
        }
        query = query.filter(PropertyFilter::new(
            KEY_PROPERTY,
            Operator::HasAncestor,
            ancestor.clone(),
        ));
    }

    for triple in &options.filters {
        query = query.filter(compile_filter(triple)?);
    }

    for property in &options.order {
        check_property("order", property)?;
        query = query.order_by(property.clone(), Direction::Ascending);
    }
    for property in &options.desc_order {
        check_property("order", property)?;
        query = query.order_by(property.clone(), Direction::Descending);
    }

    for property in &options.select {
        check_property("select", property)?;
    }
    query.projection = options.select.clone();

    for property in &options.distinct_on {
        check_property("distinct_on", property)?;
    }
    query.distinct_on = options.distinct_on.clone();

    if let Some(cursor) = &options.cursor {
        query = query.start(cursor.clone());
    }

    match options.limit {
        Some(0) => return Err(CoreError::malformed_query("limit must be positive")),
        Some(limit) => query = query.limit(limit),
        None => {}
    }

    Ok(query)
}
