use std::io::Write;

use eventql::query_builder::compile_select;
use eventql::schema_catalog::{SchemaDefinition, SchemaError, SchemaValidator};
use eventql::sql_ast::ToSql;
use tempfile::NamedTempFile;

const SHOP_SCHEMA: &str = r#"
tables:
  - name: customers
    source: customers_log
    fields:
      - { name: id, type: string }
      - { name: first_name, type: string }
      - { name: last_name, type: string }
      - { name: attributes, type: json }
      - { name: _deleted, type: boolean }
      - { name: _version, type: integer }
    computed:
      - { name: full_name, sql: "concat(first_name, ' ', last_name)" }
    exclude_from_splash: [_deleted, _version]

  - name: orders
    source: orders
    fields:
      - { name: order_id, type: string }
      - { name: customer_ref, type: string, column: customer_id }
      - { name: total, type: float }
      - { name: placed_on, type: date }
    virtual_tables:
      - name: shipping
        fields:
          - { name: city, type: string, column: ship_city }
          - { name: country, type: string, column: ship_country }
    lazy:
      - name: customer
        table: customers
        from_field: customer_ref
        collapse: { source: customers_log, key: id, version: _version, deleted: _deleted }
    traversers:
      - { name: customer_name, chain: [customer, full_name] }
"#;

fn write_schema(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_schema_file_compiles_queries() {
    let file = write_schema(SHOP_SCHEMA);
    let db = SchemaDefinition::from_yaml_file(file.path())
        .unwrap()
        .into_database()
        .unwrap();
    SchemaValidator::new().validate(&db).unwrap();

    let query = compile_select(&db, "orders", &["total", "customer_name"], 4).unwrap();
    let expected = [
        "SELECT orders.total, concat(orders__customer.first_name, ' ', orders__customer.last_name)",
        "FROM orders AS orders",
        "INNER JOIN (SELECT argMax(first_name, _version) AS first_name, argMax(last_name, _version) AS last_name, id FROM customers_log GROUP BY id HAVING argMax(_deleted, _version) = 0) AS orders__customer ON orders.customer_id = orders__customer.id",
    ]
    .join("\n");
    assert_eq!(query.to_sql(), expected);
}

#[test]
fn test_schema_file_splash() {
    let file = write_schema(SHOP_SCHEMA);
    let db = SchemaDefinition::from_yaml_file(file.path())
        .unwrap()
        .into_database()
        .unwrap();
    assert_eq!(
        db.get_table("orders").unwrap().splash().unwrap(),
        vec![
            "order_id",
            "customer_ref",
            "total",
            "placed_on",
            "shipping.city",
            "shipping.country"
        ]
    );
    assert_eq!(
        db.get_table("customers").unwrap().splash().unwrap(),
        vec!["id", "first_name", "last_name", "attributes", "full_name"]
    );
}

#[test]
fn test_missing_schema_file() {
    let err = SchemaDefinition::from_yaml_file("/nonexistent/schema.yaml").unwrap_err();
    assert!(matches!(err, SchemaError::InvalidSchema { .. }));
}

#[test]
fn test_validator_catches_wrong_collapse_source() {
    let broken = SHOP_SCHEMA.replace(
        "collapse: { source: customers_log,",
        "collapse: { source: customers,",
    );
    let db = SchemaDefinition::from_yaml_str(&broken)
        .unwrap()
        .into_database()
        .unwrap();
    let err = SchemaValidator::new().validate(&db).unwrap_err();
    assert!(err.to_string().contains("collapses `customers`"), "{}", err);
}

#[test]
fn test_validator_catches_broken_fragment() {
    let broken = SHOP_SCHEMA.replace(
        "concat(first_name, ' ', last_name)",
        "concat(first_name, ' ', last_name",
    );
    let db = SchemaDefinition::from_yaml_str(&broken)
        .unwrap()
        .into_database()
        .unwrap();
    match SchemaValidator::new().validate(&db).unwrap_err() {
        SchemaError::FieldExpressionParse { field, .. } => assert_eq!(field, "full_name"),
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn test_duplicate_attribute_in_file() {
    let yaml = r#"
tables:
  - name: t
    source: t
    fields:
      - { name: a, type: string }
    traversers:
      - { name: a, chain: [a] }
"#;
    let err = SchemaDefinition::from_yaml_str(yaml)
        .unwrap()
        .into_database()
        .unwrap_err();
    assert!(matches!(err, SchemaError::InvalidSchema { .. }));
}
