use hydra_core::db::open_db_in_memory;
use hydra_core::db::schema::table_exists;
use hydra_core::{
    BackendType, HydraConfig, HydraStore, HydraValue, NameValidationError, NewAttribute, RepoError,
};
use rusqlite::Connection;

fn stored_count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

#[test]
fn create_registers_definition_and_value_tables() {
    let conn = open_db_in_memory().unwrap();
    let store = HydraStore::try_new(&conn, &HydraConfig::default()).unwrap();
    let service = store.attribute_service();

    let created = service
        .create(&NewAttribute::new("Product", "color", BackendType::String).with_default("red"))
        .unwrap();
    assert_eq!(created.entity_type, "Product");
    assert_eq!(created.default_value.as_deref(), Some("red"));
    assert_eq!(created.default_cast(), HydraValue::from("red"));

    assert!(table_exists(&conn, "hydra_string_products").unwrap());
    assert!(table_exists(&conn, "hydra_boolean_products").unwrap());

    let resolved = service.resolve("Product", "color").unwrap().unwrap();
    assert_eq!(resolved.id, created.id);
    assert!(service.resolve("Category", "color").unwrap().is_none());
}

#[test]
fn definitions_for_lists_in_id_order_per_entity_type() {
    let conn = open_db_in_memory().unwrap();
    let store = HydraStore::try_new(&conn, &HydraConfig::default()).unwrap();
    let service = store.attribute_service();

    let first = service
        .create(&NewAttribute::new("Product", "title", BackendType::String))
        .unwrap();
    service
        .create(&NewAttribute::new("Category", "title", BackendType::String))
        .unwrap();
    let second = service
        .create(&NewAttribute::new("Product", "price", BackendType::Decimal))
        .unwrap();

    let ids: Vec<_> = service
        .definitions_for("Product")
        .unwrap()
        .into_iter()
        .map(|attribute| attribute.id)
        .collect();
    assert_eq!(ids, vec![first.id, second.id]);
}

#[test]
fn duplicate_and_invalid_names_are_rejected() {
    let conn = open_db_in_memory().unwrap();
    let store = HydraStore::try_new(&conn, &HydraConfig::default()).unwrap();
    let service = store.attribute_service();

    service
        .create(&NewAttribute::new("Product", "code", BackendType::String))
        .unwrap();
    let duplicate = service
        .create(&NewAttribute::new("Product", "code", BackendType::Integer))
        .unwrap_err();
    assert!(matches!(duplicate, RepoError::DuplicateAttribute { .. }));

    let reserved = service
        .create(&NewAttribute::new("Product", "code_was", BackendType::String))
        .unwrap_err();
    assert!(matches!(
        reserved,
        RepoError::InvalidName(NameValidationError::ReservedSuffix { .. })
    ));

    let bad_entity = service
        .create(&NewAttribute::new("product items", "code", BackendType::String))
        .unwrap_err();
    assert!(matches!(bad_entity, RepoError::InvalidName(_)));
}

#[test]
fn rename_is_visible_immediately() {
    let conn = open_db_in_memory().unwrap();
    let store = HydraStore::try_new(&conn, &HydraConfig::default()).unwrap();
    let service = store.attribute_service();

    let code = service
        .create(&NewAttribute::new("Product", "code", BackendType::String))
        .unwrap();
    let other = service
        .create(&NewAttribute::new("Product", "sku", BackendType::String))
        .unwrap();

    let renamed = service.rename(code.id, "title").unwrap();
    assert_eq!(renamed.name, "title");
    assert!(renamed.updated_at > code.updated_at);
    assert!(service.resolve("Product", "code").unwrap().is_none());
    assert!(service.resolve("Product", "title").unwrap().is_some());

    let clash = service.rename(other.id, "title").unwrap_err();
    assert!(matches!(clash, RepoError::DuplicateAttribute { .. }));
}

#[test]
fn retype_purges_rows_from_old_backend_table() {
    let conn = open_db_in_memory().unwrap();
    let store = HydraStore::try_new(&conn, &HydraConfig::default()).unwrap();
    let service = store.attribute_service();

    let code = service
        .create(&NewAttribute::new("Product", "code", BackendType::String))
        .unwrap();
    let mut product = store.new_entity("Product");
    product.set("code", "42").unwrap();
    product.save().unwrap();
    assert_eq!(stored_count(&conn, "hydra_string_products"), 1);

    let retyped = service.retype(code.id, BackendType::Integer).unwrap();
    assert_eq!(retyped.backend_type, BackendType::Integer);
    assert_eq!(stored_count(&conn, "hydra_string_products"), 0);

    let mut reloaded = store.find_entity(product.id().unwrap()).unwrap().unwrap();
    assert_eq!(reloaded.get("code").unwrap(), HydraValue::Null);
}

#[test]
fn reassign_entity_type_moves_definition_and_drops_memberships() {
    let conn = open_db_in_memory().unwrap();
    let store = HydraStore::try_new(&conn, &HydraConfig::default()).unwrap();
    let service = store.attribute_service();
    let sets = store.set_service();

    let code = service
        .create(&NewAttribute::new("Product", "code", BackendType::String))
        .unwrap();
    let set = sets
        .create_with_attributes("Product", "default", &[code.id])
        .unwrap();

    let mut product = store.new_entity("Product");
    product.set("code", "abc").unwrap();
    product.save().unwrap();

    let moved = service.reassign_entity_type(code.id, "Category").unwrap();
    assert_eq!(moved.entity_type, "Category");
    assert!(table_exists(&conn, "hydra_string_categories").unwrap());
    assert_eq!(stored_count(&conn, "hydra_string_products"), 0);
    assert!(sets.attribute_ids("Product", set.id).unwrap().is_empty());
    assert!(service.resolve("Product", "code").unwrap().is_none());
    assert!(service.resolve("Category", "code").unwrap().is_some());
}

#[test]
fn change_default_applies_to_entities_without_rows() {
    let conn = open_db_in_memory().unwrap();
    let store = HydraStore::try_new(&conn, &HydraConfig::default()).unwrap();
    let service = store.attribute_service();

    let color = service
        .create(&NewAttribute::new("Product", "color", BackendType::String).with_default("red"))
        .unwrap();
    let mut product = store.new_entity("Product");
    product.save().unwrap();

    service
        .change_default(color.id, Some("blue".to_string()))
        .unwrap();
    let mut reloaded = store.find_entity(product.id().unwrap()).unwrap().unwrap();
    assert_eq!(reloaded.get("color").unwrap(), HydraValue::from("blue"));

    service.change_default(color.id, None).unwrap();
    let mut reloaded = store.find_entity(product.id().unwrap()).unwrap().unwrap();
    assert_eq!(reloaded.get("color").unwrap(), HydraValue::Null);
}

#[test]
fn delete_removes_definition_values_and_memberships() {
    let conn = open_db_in_memory().unwrap();
    let store = HydraStore::try_new(&conn, &HydraConfig::default()).unwrap();
    let service = store.attribute_service();
    let sets = store.set_service();

    let code = service
        .create(&NewAttribute::new("Product", "code", BackendType::Integer))
        .unwrap();
    let set = sets
        .create_with_attributes("Product", "default", &[code.id])
        .unwrap();
    let mut product = store.new_entity("Product");
    product.set("code", 7).unwrap();
    product.save().unwrap();

    service.delete(code.id).unwrap();
    assert!(service.get(code.id).unwrap().is_none());
    assert_eq!(stored_count(&conn, "hydra_integer_products"), 0);
    assert!(sets.attribute_ids("Product", set.id).unwrap().is_empty());

    let missing = service.delete(code.id).unwrap_err();
    assert!(matches!(missing, RepoError::AttributeNotFound(id) if id == code.id));
}

#[test]
fn failed_purge_rolls_back_the_definition_change() {
    let conn = open_db_in_memory().unwrap();
    let store = HydraStore::try_new(&conn, &HydraConfig::default()).unwrap();
    let service = store.attribute_service();
    let code = service
        .create(&NewAttribute::new("Product", "code", BackendType::String))
        .unwrap();
    let mut product = store.new_entity("Product");
    product.set("code", "abc").unwrap();
    product.save().unwrap();

    conn.execute_batch(
        "CREATE TRIGGER keep_string_rows BEFORE DELETE ON hydra_string_products
         BEGIN
             SELECT RAISE(ABORT, 'rows are pinned');
         END;",
    )
    .unwrap();

    assert!(service.retype(code.id, BackendType::Integer).is_err());
    assert_eq!(
        service.get(code.id).unwrap().unwrap().backend_type,
        BackendType::String
    );

    assert!(service.reassign_entity_type(code.id, "Category").is_err());
    assert_eq!(service.get(code.id).unwrap().unwrap().entity_type, "Product");
    assert!(!table_exists(&conn, "hydra_string_categories").unwrap());

    assert!(service.delete(code.id).is_err());
    assert!(service.get(code.id).unwrap().is_some());
    assert_eq!(stored_count(&conn, "hydra_string_products"), 1);

    conn.execute_batch("DROP TRIGGER keep_string_rows;").unwrap();
    service.retype(code.id, BackendType::Integer).unwrap();
    assert_eq!(stored_count(&conn, "hydra_string_products"), 0);
}
