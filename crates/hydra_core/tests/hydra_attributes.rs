use hydra_core::db::open_db_in_memory;
use hydra_core::model::value::parse_datetime;
use hydra_core::{BackendType, HydraConfig, HydraStore, HydraValue, NewAttribute};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::str::FromStr;

fn decimal(value: &str) -> HydraValue {
    HydraValue::Decimal(Decimal::from_str(value).unwrap())
}

fn values(pairs: &[(&str, HydraValue)]) -> BTreeMap<String, HydraValue> {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

#[test]
fn snapshot_of_persisted_entity_without_set() {
    let conn = open_db_in_memory().unwrap();
    let store = HydraStore::try_new(&conn, &HydraConfig::default()).unwrap();
    let service = store.attribute_service();
    service
        .create(&NewAttribute::new("Product", "color", BackendType::String).with_default("red"))
        .unwrap();
    service
        .create(&NewAttribute::new("Product", "title", BackendType::String))
        .unwrap();
    service
        .create(&NewAttribute::new("Product", "total", BackendType::Decimal))
        .unwrap();

    let mut product = store.new_entity("Product");
    product.set("color", "green").unwrap();
    product.set("total", 5).unwrap();
    product.save().unwrap();

    let expected = values(&[
        ("color", HydraValue::from("green")),
        ("title", HydraValue::Null),
        ("total", decimal("5")),
    ]);
    assert_eq!(product.hydra_attributes().unwrap(), expected);

    let mut reloaded = store.find_entity(product.id().unwrap()).unwrap().unwrap();
    assert_eq!(reloaded.hydra_attributes().unwrap(), expected);
}

#[test]
fn snapshot_of_new_entity_uses_defaults() {
    let conn = open_db_in_memory().unwrap();
    let store = HydraStore::try_new(&conn, &HydraConfig::default()).unwrap();
    let service = store.attribute_service();
    service
        .create(&NewAttribute::new("Product", "color", BackendType::String).with_default("red"))
        .unwrap();
    service
        .create(&NewAttribute::new("Product", "title", BackendType::String))
        .unwrap();
    service
        .create(&NewAttribute::new("Product", "total", BackendType::Decimal))
        .unwrap();

    let mut product = store.new_entity("Product");
    assert_eq!(
        product.hydra_attributes().unwrap(),
        values(&[
            ("color", HydraValue::from("red")),
            ("title", HydraValue::Null),
            ("total", HydraValue::Null),
        ])
    );
}

#[test]
fn snapshot_only_includes_set_members() {
    let conn = open_db_in_memory().unwrap();
    let store = HydraStore::try_new(&conn, &HydraConfig::default()).unwrap();
    let service = store.attribute_service();
    let color = service
        .create(&NewAttribute::new("Product", "color", BackendType::String).with_default("red"))
        .unwrap();
    service
        .create(&NewAttribute::new("Product", "title", BackendType::String))
        .unwrap();
    let total = service
        .create(&NewAttribute::new("Product", "total", BackendType::Decimal))
        .unwrap();
    let set = store
        .set_service()
        .create_with_attributes("Product", "default", &[color.id, total.id])
        .unwrap();

    let mut product = store.new_entity("Product");
    product.set_hydra_set_id(Some(set.id));
    assert_eq!(
        product.hydra_attributes().unwrap(),
        values(&[
            ("color", HydraValue::from("red")),
            ("total", HydraValue::Null),
        ])
    );
}

#[test]
fn before_type_cast_snapshot_keeps_raw_inputs() {
    let conn = open_db_in_memory().unwrap();
    let store = HydraStore::try_new(&conn, &HydraConfig::default()).unwrap();
    let service = store.attribute_service();
    service
        .create(
            &NewAttribute::new("Product", "purchase_at", BackendType::Datetime)
                .with_default("2013-12-04 00:00"),
        )
        .unwrap();
    service
        .create(&NewAttribute::new("Product", "grand_total", BackendType::Decimal))
        .unwrap();

    let mut fresh = store.new_entity("Product");
    assert_eq!(
        fresh.hydra_attributes_before_type_cast().unwrap(),
        values(&[
            ("purchase_at", HydraValue::from("2013-12-04 00:00")),
            ("grand_total", HydraValue::Null),
        ])
    );

    let mut product = store.new_entity("Product");
    product.set("grand_total", "123456.1234").unwrap();
    product.save().unwrap();
    assert_eq!(
        product.hydra_attributes_before_type_cast().unwrap(),
        values(&[
            ("purchase_at", HydraValue::from("2013-12-04 00:00")),
            ("grand_total", HydraValue::from("123456.1234")),
        ])
    );
    assert_eq!(
        product.get("purchase_at").unwrap(),
        HydraValue::DateTime(parse_datetime("2013-12-04 00:00").unwrap())
    );
    assert_eq!(
        product.get("grand_total").unwrap(),
        decimal("123456.1234")
    );
}

#[test]
fn before_type_cast_snapshot_with_set() {
    let conn = open_db_in_memory().unwrap();
    let store = HydraStore::try_new(&conn, &HydraConfig::default()).unwrap();
    let service = store.attribute_service();
    let purchase_at = service
        .create(
            &NewAttribute::new("Product", "purchase_at", BackendType::Datetime)
                .with_default("2013-12-04 00:00"),
        )
        .unwrap();
    service
        .create(&NewAttribute::new("Product", "grand_total", BackendType::Decimal))
        .unwrap();
    let set = store
        .set_service()
        .create_with_attributes("Product", "default", &[purchase_at.id])
        .unwrap();

    let mut product = store.new_entity("Product");
    product.set_hydra_set_id(Some(set.id));
    product.save().unwrap();

    assert_eq!(
        product.hydra_attributes_before_type_cast().unwrap(),
        values(&[("purchase_at", HydraValue::from("2013-12-04 00:00"))])
    );
}

#[test]
fn snapshot_ignores_rows_of_unknown_attributes() {
    let conn = open_db_in_memory().unwrap();
    let store = HydraStore::try_new(&conn, &HydraConfig::default()).unwrap();
    let service = store.attribute_service();
    for name in ["a", "b", "c"] {
        service
            .create(&NewAttribute::new("Product", name, BackendType::String))
            .unwrap();
    }
    service
        .create(&NewAttribute::new("Product", "count", BackendType::Integer))
        .unwrap();

    let mut product = store.new_entity("Product");
    product
        .assign_attributes([("a", "1"), ("b", "2"), ("c", "3"), ("count", "4")])
        .unwrap();
    product.save().unwrap();

    // A row in an untouched table must not leak into the snapshot.
    conn.execute(
        "INSERT INTO hydra_text_products (entity_id, hydra_attribute_id, value) VALUES (?1, 99, 'x');",
        [product.id().unwrap()],
    )
    .unwrap();

    let mut reloaded = store.find_entity(product.id().unwrap()).unwrap().unwrap();
    assert_eq!(
        reloaded.hydra_attributes().unwrap(),
        values(&[
            ("a", HydraValue::from("1")),
            ("b", HydraValue::from("2")),
            ("c", HydraValue::from("3")),
            ("count", HydraValue::Integer(4)),
        ])
    );
}

#[test]
fn decimal_values_survive_save_and_reload_exactly() {
    let conn = open_db_in_memory().unwrap();
    let store = HydraStore::try_new(&conn, &HydraConfig::default()).unwrap();
    store
        .attribute_service()
        .create(&NewAttribute::new("Product", "total", BackendType::Decimal))
        .unwrap();

    let mut product = store.new_entity("Product");
    product.set("total", "12345678901234567.89").unwrap();
    assert_eq!(
        product.get("total").unwrap(),
        decimal("12345678901234567.89")
    );
    product.save().unwrap();

    let stored: String = conn
        .query_row(
            "SELECT value FROM hydra_decimal_products WHERE entity_id = ?1;",
            [product.id().unwrap()],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(stored, "12345678901234567.89");

    let mut reloaded = store.find_entity(product.id().unwrap()).unwrap().unwrap();
    let total = reloaded.get("total").unwrap();
    assert_eq!(total, decimal("12345678901234567.89"));
    assert_eq!(total.to_string(), "12345678901234567.89");
}
