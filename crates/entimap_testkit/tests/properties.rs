//! End-to-end properties of the model mapper over the in-memory store.

use entimap_core::{
    derive_ancestor_key, from_entity, to_entity, CoreError, MAX_BATCH_SIZE,
};
use entimap_testkit::prelude::*;
use proptest::prelude::*;
use std::collections::HashSet;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn translation_round_trips(user in user_strategy()) {
        let entity = to_entity(&user, None).unwrap();
        let loaded: User = from_entity(Some(entity)).unwrap().unwrap();

        prop_assert_eq!(loaded.persisted_values(), user.persisted_values());
    }

    #[test]
    fn translation_round_trips_under_parent(user in user_strategy(), parent in key_strategy()) {
        let entity = to_entity(&user, Some(&parent)).unwrap();
        let loaded: User = from_entity(Some(entity)).unwrap().unwrap();

        prop_assert_eq!(loaded.parent_key(), Some(&parent));
        prop_assert_eq!(loaded.persisted_values(), user.persisted_values());
    }

    #[test]
    fn saved_users_load_back(user in user_strategy()) {
        let ds = TestDataset::new();
        let mut user = user;
        prop_assert!(ds.save(&mut user, None).unwrap());

        let id = user.id().cloned().unwrap();
        let loaded: User = ds.find(id, None).unwrap().unwrap();
        prop_assert_eq!(loaded.persisted_values(), user.persisted_values());
    }
}

#[test]
fn ancestor_query_returns_whole_group() {
    init_tracing();
    let ds = TestDataset::new();
    let parent = derive_ancestor_key("User", "acme");

    for mut user in users(5) {
        assert!(ds.save(&mut user, Some(&parent)).unwrap());
    }
    let mut outsider = user("outsider", 50);
    assert!(ds.save(&mut outsider, None).unwrap());

    let page = ds
        .all::<User>(&QueryOptions::new().ancestor(parent.clone()))
        .unwrap();

    assert_eq!(page.models.len(), 5);
    assert!(page.cursor.is_none());
    for user in &page.models {
        assert_eq!(user.parent_key(), Some(&parent));
        assert_eq!(user.parent_id(), Some(&KeyId::Name("acme".into())));
    }
}

#[test]
fn invalid_save_leaves_store_unchanged() {
    init_tracing();
    let ds = TestDataset::new();
    let mut valid = user("valid", 20);
    ds.save(&mut valid, None).unwrap();

    let mut invalid = user("", 20);
    invalid.age = -1;

    assert!(!ds.save(&mut invalid, None).unwrap());
    assert_eq!(ds.stored("User"), 1);
    assert_eq!(invalid.errors().len(), 2);
    assert!(invalid.hooks.is_empty());
    assert_eq!(ds.store().save_attempts(), 1);
}

#[test]
fn dirty_tracking_is_idempotent() {
    init_tracing();
    let mut user = user("Carol", 33);

    user.set_attribute("name", Value::from("Carol")).unwrap();
    assert!(!user.values_changed().unwrap());
    assert!(user.is_excluded_from_save());

    user.set_attribute("name", Value::from("Caroline")).unwrap();
    user.set_attribute("name", Value::from("Carol")).unwrap();
    assert!(user.values_changed().unwrap());
    assert!(user.values_changed().unwrap());

    user.reload();
    assert!(!user.values_changed().unwrap());
}

#[test]
fn untracked_attribute_change_is_misuse() {
    let user = user("Dan", 20);
    assert!(matches!(
        user.attribute_changed("age"),
        Err(CoreError::TrackingMisuse { .. })
    ));
}

#[test]
fn batch_keeps_order_and_each_hook_sees_its_id() {
    init_tracing();
    let ds = TestDataset::new();

    let saved = ds.batch_save(users(12), None).unwrap();

    let names: Vec<_> = saved.iter().map(|u| u.name.clone()).collect();
    let expected: Vec<_> = (0..12).map(|i| format!("user{i}")).collect();
    assert_eq!(names, expected);

    let ids: HashSet<_> = saved.iter().map(|u| u.id().cloned().unwrap()).collect();
    assert_eq!(ids.len(), 12);
    for user in &saved {
        assert_eq!(user.saved_id.as_ref(), user.id());
        assert_eq!(user.hooks, vec!["before_save", "after_save"]);

        let stored: User = ds.find(user.id().cloned().unwrap(), None).unwrap().unwrap();
        assert_eq!(stored.name, user.name);
    }
}

#[test]
fn invalid_model_blocks_its_slice() {
    init_tracing();
    let ds = TestDataset::new();
    let mut batch = users(4);
    batch[2].name = String::new();

    let saved = ds.batch_save(batch, None).unwrap();

    assert_eq!(ds.stored("User"), 0);
    assert!(saved.iter().all(|u| u.id().is_none() && u.hooks.is_empty()));
}

#[test]
fn large_batch_is_sliced() {
    let ds = TestDataset::new();
    let count = MAX_BATCH_SIZE * 2 + 1;

    let saved = ds.batch_save(users(count), None).unwrap();

    assert_eq!(ds.store().save_attempts(), 3);
    assert_eq!(ds.stored("User"), count);
    assert_eq!(saved.len(), count);
}

#[test]
fn soft_save_gives_up_after_retry_budget() {
    init_tracing();
    let ds = TestDataset::with_retries(5);
    ds.store().fail_always();
    let mut user = user("Erin", 25);

    assert!(!ds.save(&mut user, None).unwrap());

    assert_eq!(ds.store().save_attempts(), 6);
    assert!(user.id().is_none());
    assert_eq!(ds.stored("User"), 0);
}

#[test]
fn strict_save_reraises_after_retry_budget() {
    let ds = TestDataset::with_retries(2);
    ds.store().fail_always();
    let mut user = user("Finn", 25);

    let err = ds.strict_save(&mut user, None).unwrap_err();

    assert!(matches!(err, CoreError::Store(_)));
    assert_eq!(ds.store().save_attempts(), 3);
}

#[test]
fn cursor_continues_where_page_ended() {
    init_tracing();
    let ds = TestDataset::new();
    for mut user in users(11) {
        assert!(ds.save(&mut user, None).unwrap());
    }

    let options = QueryOptions::new().order("age");
    let first = ds.all::<User>(&options.clone().limit(7)).unwrap();
    assert_eq!(first.models.len(), 7);
    let cursor = first.cursor.expect("more results after the first page");

    let second = ds
        .all::<User>(&options.limit(4).cursor(cursor))
        .unwrap();
    assert_eq!(second.models.len(), 4);
    assert!(second.cursor.is_none());

    let seen: HashSet<_> = first.models.iter().map(|u| u.name.clone()).collect();
    for user in &second.models {
        assert!(!seen.contains(&user.name), "{} returned twice", user.name);
    }
}

#[test]
fn find_by_within_group() {
    let ds = TestDataset::new();
    let parent = derive_ancestor_key("User", 1);
    let mut inside = user("Gail", 40);
    ds.save(&mut inside, Some(&parent)).unwrap();
    let mut outside = user("Gail", 41);
    ds.save(&mut outside, None).unwrap();

    let found: User = ds
        .find_by([("name", Value::from("Gail"))], Some(&parent))
        .unwrap()
        .unwrap();
    assert_eq!(found.age, 40);
}

#[test]
fn filters_and_projection() {
    let ds = TestDataset::new();
    for mut user in users(6) {
        ds.save(&mut user, None).unwrap();
    }

    let page = ds
        .all::<User>(
            &QueryOptions::new()
                .filter("age", ">=", 2)
                .filter("age", "<", 5)
                .desc_order("age"),
        )
        .unwrap();
    let ages: Vec<_> = page.models.iter().map(|u| u.age).collect();
    assert_eq!(ages, vec![4, 3, 2]);

    let projected = ds
        .all::<User>(&QueryOptions::new().select("name").order("name").limit(2))
        .unwrap();
    assert_eq!(projected.models[0].name, "user0");
    assert!(projected.models[0].email.is_empty());
}

#[test]
fn unindexed_attribute_never_matches() {
    let ds = TestDataset::new();
    let mut user = user("Hal", 30);
    user.bio = Some("likes rust".into());
    ds.save(&mut user, None).unwrap();

    let page = ds
        .all::<User>(&QueryOptions::new().filter("bio", "=", "likes rust"))
        .unwrap();
    assert!(page.models.is_empty());
}
