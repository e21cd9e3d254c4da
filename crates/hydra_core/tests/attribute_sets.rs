use hydra_core::db::open_db_in_memory;
use hydra_core::repo::set_repo::{SetRepository, SqliteSetRepository};
use hydra_core::{BackendType, HydraConfig, HydraStore, NewAttribute, RepoError};
use std::collections::BTreeSet;

#[test]
fn membership_answers_follow_edits_immediately() {
    let conn = open_db_in_memory().unwrap();
    let store = HydraStore::try_new(&conn, &HydraConfig::default()).unwrap();
    let attributes = store.attribute_service();
    let sets = store.set_service();

    let color = attributes
        .create(&NewAttribute::new("Product", "color", BackendType::String))
        .unwrap();
    let title = attributes
        .create(&NewAttribute::new("Product", "title", BackendType::String))
        .unwrap();
    let set = sets.create("Product", "default").unwrap();
    assert!(sets.attribute_ids("Product", set.id).unwrap().is_empty());

    sets.add_attribute(set.id, color.id).unwrap();
    sets.add_attribute(set.id, color.id).unwrap();
    assert_eq!(
        sets.attribute_ids("Product", set.id).unwrap(),
        BTreeSet::from([color.id])
    );

    sets.add_attribute(set.id, title.id).unwrap();
    assert!(sets.remove_attribute(set.id, color.id).unwrap());
    assert!(!sets.remove_attribute(set.id, color.id).unwrap());
    assert_eq!(
        sets.attribute_ids("Product", set.id).unwrap(),
        BTreeSet::from([title.id])
    );
}

#[test]
fn is_allowed_without_set_allows_everything() {
    let conn = open_db_in_memory().unwrap();
    let store = HydraStore::try_new(&conn, &HydraConfig::default()).unwrap();
    let color = store
        .attribute_service()
        .create(&NewAttribute::new("Product", "color", BackendType::String))
        .unwrap();
    let set = store.set_service().create("Product", "empty").unwrap();

    let repo = SqliteSetRepository::try_new(&conn).unwrap();
    assert!(repo.is_allowed("Product", None, color.id).unwrap());
    assert!(!repo.is_allowed("Product", Some(set.id), color.id).unwrap());
    assert!(!repo.is_allowed("Category", Some(set.id), color.id).unwrap());
}

#[test]
fn members_must_share_the_set_entity_type() {
    let conn = open_db_in_memory().unwrap();
    let store = HydraStore::try_new(&conn, &HydraConfig::default()).unwrap();
    let title = store
        .attribute_service()
        .create(&NewAttribute::new("Category", "title", BackendType::String))
        .unwrap();
    let sets = store.set_service();
    let set = sets.create("Product", "default").unwrap();

    let err = sets.add_attribute(set.id, title.id).unwrap_err();
    assert!(matches!(
        err,
        RepoError::EntityTypeMismatch { attribute_id, set_id }
            if attribute_id == title.id && set_id == set.id
    ));

    let err = sets.add_attribute(set.id, 9_999).unwrap_err();
    assert!(matches!(err, RepoError::AttributeNotFound(9_999)));
}

#[test]
fn set_names_are_unique_per_entity_type() {
    let conn = open_db_in_memory().unwrap();
    let store = HydraStore::try_new(&conn, &HydraConfig::default()).unwrap();
    let sets = store.set_service();

    let product_default = sets.create("Product", "default").unwrap();
    sets.create("Category", "default").unwrap();
    let err = sets.create("Product", "default").unwrap_err();
    assert!(matches!(err, RepoError::DuplicateSet { .. }));

    let renamed = sets.rename(product_default.id, "basic").unwrap();
    assert_eq!(renamed.name, "basic");
    assert_eq!(sets.list("Product").unwrap(), vec![renamed]);
}

#[test]
fn deleting_a_set_unbinds_entities_and_drops_memberships() {
    let conn = open_db_in_memory().unwrap();
    let store = HydraStore::try_new(&conn, &HydraConfig::default()).unwrap();
    let color = store
        .attribute_service()
        .create(&NewAttribute::new("Product", "color", BackendType::String))
        .unwrap();
    let sets = store.set_service();
    let set = sets
        .create_with_attributes("Product", "default", &[color.id])
        .unwrap();

    let mut product = store.new_entity("Product");
    product.set_hydra_set_id(Some(set.id));
    product.save().unwrap();
    let product_id = product.id().unwrap();

    sets.delete(set.id).unwrap();
    assert!(sets.get(set.id).unwrap().is_none());

    let memberships: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM hydra_attribute_sets WHERE hydra_set_id = ?1;",
            [set.id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(memberships, 0);

    let reloaded = store.find_entity(product_id).unwrap().unwrap();
    assert_eq!(reloaded.hydra_set_id(), None);

    let err = sets.delete(set.id).unwrap_err();
    assert!(matches!(err, RepoError::SetNotFound(_)));
}
