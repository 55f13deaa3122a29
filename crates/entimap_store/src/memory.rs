//! In-memory reference store.

use crate::backend::DatastoreBackend;
use crate::entity::Entity;
use crate::error::{StoreError, StoreResult};
use crate::key::{Key, KeyId, KEY_PROPERTY};
use crate::query::{Cursor, Direction, Operator, PropertyFilter, PropertyOrder, Query, QueryResults};
use crate::value::Value;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// An in-memory entity store.
///
/// This store honors the [`DatastoreBackend`] contract and is suitable for:
/// - Unit and integration tests
/// - Local development without a remote service
///
/// Every read is strongly consistent. Without sort directives, results are
/// returned in key order. Entities lacking a sorted property, or holding it
/// unindexed, are left out of sorted results, as are entities that lack a
/// filtered property.
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use entimap_store::{DatastoreBackend, Entity, InMemoryDatastore, Key, Query};
///
/// let store = InMemoryDatastore::new();
/// let mut entity = Entity::new(Key::new("Task"));
/// entity.set("done", false);
/// store.save_entities(vec![entity]).unwrap();
///
/// let results = store.run_query(&Query::new("Task")).unwrap();
/// assert_eq!(results.entities.len(), 1);
/// ```
#[derive(Debug)]
pub struct InMemoryDatastore {
    tables: RwLock<Tables>,
}

#[derive(Debug)]
struct Tables {
    entities: BTreeMap<Key, Entity>,
    next_id: i64,
}

impl Default for Tables {
    fn default() -> Self {
        Self {
            entities: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl Tables {
    /// Keeps the id counter above every numeric id in use.
    fn reserve(&mut self, key: &Key) {
        if let Some(id) = key.id().and_then(KeyId::as_id) {
            self.next_id = self.next_id.max(id.saturating_add(1));
        }
    }
}

/// On-disk form of the store.
#[derive(Serialize, Deserialize)]
struct Snapshot {
    next_id: i64,
    entities: Vec<Entity>,
}

impl Default for InMemoryDatastore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDatastore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
        }
    }

    /// Opens a store from a snapshot written by [`Self::snapshot_to`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or decoded.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        let snapshot: Snapshot =
            ciborium::from_reader(reader).map_err(|e| StoreError::Codec(e.to_string()))?;

        let entities = snapshot
            .entities
            .into_iter()
            .map(|entity| (entity.key().clone(), entity))
            .collect::<BTreeMap<_, _>>();
        debug!(
            path = %path.as_ref().display(),
            entities = entities.len(),
            "opened store snapshot"
        );

        let mut tables = Tables {
            entities,
            next_id: snapshot.next_id,
        };
        let keys: Vec<Key> = tables.entities.keys().cloned().collect();
        for key in &keys {
            tables.reserve(key);
        }

        Ok(Self {
            tables: RwLock::new(tables),
        })
    }

    /// Writes every entity and the id counter to `path` as CBOR.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn snapshot_to(&self, path: impl AsRef<Path>) -> StoreResult<()> {
        let snapshot = {
            let tables = self.tables.read();
            Snapshot {
                next_id: tables.next_id,
                entities: tables.entities.values().cloned().collect(),
            }
        };

        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        ciborium::into_writer(&snapshot, &mut writer)
            .map_err(|e| StoreError::Codec(e.to_string()))?;
        writer.flush()?;
        Ok(())
    }

    /// Returns the number of stored entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.read().entities.len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of stored entities of one kind.
    #[must_use]
    pub fn count_kind(&self, kind: &str) -> usize {
        self.tables
            .read()
            .entities
            .keys()
            .filter(|key| key.kind() == kind)
            .count()
    }

    /// Removes every entity. The id counter is kept.
    pub fn clear(&self) {
        self.tables.write().entities.clear();
    }

    fn require_complete(key: &Key) -> StoreResult<()> {
        if key.is_complete() {
            Ok(())
        } else {
            Err(StoreError::incomplete_key(key.kind()))
        }
    }
}

impl DatastoreBackend for InMemoryDatastore {
    fn lookup(&self, keys: &[Key]) -> StoreResult<Vec<Entity>> {
        keys.iter().try_for_each(Self::require_complete)?;
        let tables = self.tables.read();
        Ok(keys
            .iter()
            .filter_map(|key| tables.entities.get(key).cloned())
            .collect())
    }

    fn run_query(&self, query: &Query) -> StoreResult<QueryResults> {
        query.filters.iter().try_for_each(check_filter)?;
        let offset = match &query.start_cursor {
            Some(cursor) => usize::try_from(cursor.offset()?)
                .map_err(|_| StoreError::InvalidCursor("offset out of range".into()))?,
            None => 0,
        };

        let tables = self.tables.read();
        let mut matched: Vec<&Entity> = tables
            .entities
            .values()
            .filter(|entity| entity.key().kind() == query.kind)
            .filter(|entity| query.filters.iter().all(|f| matches_filter(entity, f)))
            .filter(|entity| {
                query
                    .order
                    .iter()
                    .all(|o| indexed_value(entity, &o.property).is_some())
            })
            .collect();

        // Stable sort: ties keep key order.
        if !query.order.is_empty() {
            matched.sort_by(|a, b| compare_by_order(a, b, &query.order));
        }

        if !query.distinct_on.is_empty() {
            let mut seen: Vec<Vec<Option<Value>>> = Vec::new();
            matched.retain(|entity| {
                let tuple: Vec<Option<Value>> = query
                    .distinct_on
                    .iter()
                    .map(|name| indexed_value(entity, name))
                    .collect();
                if seen.contains(&tuple) {
                    false
                } else {
                    seen.push(tuple);
                    true
                }
            });
        }

        let total = matched.len();
        let entities: Vec<Entity> = matched
            .into_iter()
            .skip(offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|entity| {
                let mut entity = entity.clone();
                if !query.projection.is_empty() {
                    entity.retain_properties(&query.projection);
                }
                entity
            })
            .collect();

        let end = offset.saturating_add(entities.len());
        debug!(
            kind = %query.kind,
            filters = query.filters.len(),
            returned = entities.len(),
            total,
            "ran query"
        );

        Ok(QueryResults {
            entities,
            end_cursor: Some(Cursor::at_offset(end as u64)?),
            more_results: end < total,
        })
    }

    fn save_entities(&self, entities: Vec<Entity>) -> StoreResult<Vec<Key>> {
        for entity in &entities {
            if !entity.key().has_complete_ancestors() {
                return Err(StoreError::incomplete_key(entity.key().kind()));
            }
        }

        let mut tables = self.tables.write();
        let mut keys = Vec::with_capacity(entities.len());
        for mut entity in entities {
            if entity.key().id().is_none() {
                let id = tables.next_id;
                tables.next_id += 1;
                let key = entity.key().clone().identified(KeyId::Id(id));
                entity.set_key(key);
            }
            let key = entity.key().clone();
            tables.reserve(&key);
            tables.entities.insert(key.clone(), entity);
            keys.push(key);
        }

        debug!(count = keys.len(), "saved entities");
        Ok(keys)
    }

    fn delete(&self, keys: &[Key]) -> StoreResult<()> {
        keys.iter().try_for_each(Self::require_complete)?;
        let mut tables = self.tables.write();
        for key in keys {
            tables.entities.remove(key);
        }
        debug!(count = keys.len(), "deleted entities");
        Ok(())
    }

    fn allocate_ids(&self, key: &Key, count: usize) -> StoreResult<Vec<Key>> {
        if !key.has_complete_ancestors() {
            return Err(StoreError::incomplete_key(key.kind()));
        }
        let mut tables = self.tables.write();
        let keys = (0..count)
            .map(|_| {
                let id = tables.next_id;
                tables.next_id += 1;
                key.clone().identified(KeyId::Id(id))
            })
            .collect();
        Ok(keys)
    }
}

/// Rejects filters the store cannot evaluate.
fn check_filter(filter: &PropertyFilter) -> StoreResult<()> {
    let is_key = filter.property == KEY_PROPERTY;
    match filter.operator {
        Operator::HasAncestor if !is_key => Err(StoreError::invalid_argument(format!(
            "HAS_ANCESTOR requires {KEY_PROPERTY}, got {}",
            filter.property
        ))),
        Operator::HasAncestor | Operator::Equal if is_key => match filter.value {
            Value::Key(_) => Ok(()),
            ref other => Err(StoreError::invalid_argument(format!(
                "{KEY_PROPERTY} filter needs a key, got {}",
                other.type_name()
            ))),
        },
        Operator::In | Operator::NotIn => match filter.value {
            Value::Array(_) => Ok(()),
            ref other => Err(StoreError::invalid_argument(format!(
                "{} needs an array, got {}",
                filter.operator,
                other.type_name()
            ))),
        },
        op if is_key => Err(StoreError::invalid_argument(format!(
            "operator {op} is not supported on {KEY_PROPERTY}"
        ))),
        _ => Ok(()),
    }
}

/// Value of a property as seen by the index, `None` if not indexed.
fn indexed_value(entity: &Entity, name: &str) -> Option<Value> {
    if name == KEY_PROPERTY {
        return Some(Value::Key(entity.key().clone()));
    }
    entity
        .property(name)
        .filter(|p| !p.exclude_from_indexes)
        .map(|p| p.value.clone())
}

fn matches_filter(entity: &Entity, filter: &PropertyFilter) -> bool {
    if filter.property == KEY_PROPERTY {
        let Value::Key(key) = &filter.value else {
            return false;
        };
        return match filter.operator {
            Operator::HasAncestor => entity.key().has_ancestor(key),
            Operator::Equal => entity.key() == key,
            _ => false,
        };
    }

    let Some(value) = indexed_value(entity, &filter.property) else {
        return false;
    };
    // Array properties match if any element matches.
    let candidates: Vec<&Value> = match &value {
        Value::Array(items) => items.iter().collect(),
        single => vec![single],
    };
    let eq = |a: &Value, b: &Value| a.cmp_for_query(b) == Ordering::Equal;

    match filter.operator {
        Operator::In | Operator::NotIn => {
            let list = filter.value.as_array().unwrap_or_default();
            let any_in = candidates
                .iter()
                .any(|c| list.iter().any(|item| eq(c, item)));
            if filter.operator == Operator::In {
                any_in
            } else {
                !any_in
            }
        }
        op => candidates.iter().any(|c| {
            let ord = c.cmp_for_query(&filter.value);
            match op {
                Operator::Equal => ord == Ordering::Equal,
                Operator::NotEqual => ord != Ordering::Equal,
                Operator::LessThan => ord == Ordering::Less,
                Operator::LessThanOrEqual => ord != Ordering::Greater,
                Operator::GreaterThan => ord == Ordering::Greater,
                Operator::GreaterThanOrEqual => ord != Ordering::Less,
                _ => false,
            }
        }),
    }
}

fn compare_by_order(a: &Entity, b: &Entity, order: &[PropertyOrder]) -> Ordering {
    for directive in order {
        let (Some(av), Some(bv)) = (
            indexed_value(a, &directive.property),
            indexed_value(b, &directive.property),
        ) else {
            continue;
        };
        let ord = av.cmp_for_query(&bv);
        let ord = match directive.direction {
            Direction::Ascending => ord,
            Direction::Descending => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}
