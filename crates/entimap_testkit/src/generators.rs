//! Property-based test generators using proptest.
//!
//! Provides strategies for generating keys, values and fixture models that
//! satisfy the constraints the store and the fixtures place on them.

use crate::fixtures::User;
use entimap_core::{ModelExt, Value};
use entimap_store::{Key, KeyId};
use proptest::prelude::*;

/// Strategy for generating kind names.
pub fn kind_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][a-zA-Z0-9]{0,15}").expect("Invalid regex")
}

/// Strategy for generating key identifiers. Numeric ids are positive.
pub fn key_id_strategy() -> impl Strategy<Value = KeyId> {
    prop_oneof![
        (1..i64::MAX).prop_map(KeyId::Id),
        prop::string::string_regex("[a-z0-9_-]{1,24}")
            .expect("Invalid regex")
            .prop_map(KeyId::Name),
    ]
}

/// Strategy for generating complete keys up to three levels deep.
pub fn key_strategy() -> impl Strategy<Value = Key> {
    prop::collection::vec((kind_strategy(), key_id_strategy()), 1..=3).prop_map(|path| {
        let mut key: Option<Key> = None;
        for (kind, id) in path {
            let next = Key::new(kind).identified(id);
            key = Some(match key {
                Some(parent) => next.child_of(parent),
                None => next,
            });
        }
        key.expect("path has at least one element")
    })
}

/// Strategy for generating scalar values. Doubles are finite so values
/// compare equal to themselves.
pub fn scalar_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        (-1.0e12..1.0e12f64).prop_map(Value::Double),
        any::<i64>().prop_map(Value::Timestamp),
        ".{0,32}".prop_map(Value::Text),
        prop::collection::vec(any::<u8>(), 0..64).prop_map(Value::Blob),
        key_strategy().prop_map(Value::Key),
    ]
}

/// Strategy for generating values, including arrays and nested entities.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    scalar_value_strategy().prop_recursive(3, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::vec(("[a-z]{1,8}", inner), 0..6).prop_map(Value::Entity),
        ]
    })
}

/// Strategy for generating valid fixture users.
pub fn user_strategy() -> impl Strategy<Value = User> {
    (
        "[A-Za-z][A-Za-z ]{0,23}",
        "[a-z]{1,12}@[a-z]{1,12}\\.test",
        0..130i64,
        prop::option::of(".{0,64}"),
        prop::collection::vec("[a-z]{1,10}", 0..5),
    )
        .prop_map(|(name, email, age, bio, tags)| {
            User::build([
                ("name", Value::from(name)),
                ("email", Value::from(email)),
                ("age", Value::Integer(age)),
                ("bio", Value::from(bio)),
                (
                    "tags",
                    Value::Array(tags.into_iter().map(Value::from).collect()),
                ),
            ])
            .expect("generated attributes match the schema")
        })
}
