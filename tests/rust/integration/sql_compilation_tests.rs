use std::sync::Arc;

use eventql::query_builder::{compile_select, QueryScope, SelectBuilder, DEFAULT_MAX_JOINS};
use eventql::schema_catalog::{
    Attribute, Database, FieldDescriptor, FieldKind, LazyJoinBuilder, RequestedFields,
    SchemaError, SchemaValidator, VersionedCollapse,
};
use eventql::sql_ast::{JoinType, ToSql};
use test_case::test_case;

fn analytics() -> Arc<Database> {
    Database::analytics().expect("analytics schema builds")
}

#[test_case("events", "event", "events.event"; "plain column")]
#[test_case("events", "poe.id", "events.person_id"; "virtual table column")]
#[test_case("events", "pdi.person_id", "events__pdi.person_id"; "one lazy hop")]
#[test_case("events", "person_id", "events__pdi.person_id"; "traverser to column")]
#[test_case("events", "person.id", "events__pdi__person.id"; "traverser through two hops")]
#[test_case("person_distinct_ids", "person.created_at", "person_distinct_ids__person.created_at"; "lazy from mapping table")]
#[test_case("cohort_people", "person.is_identified", "cohort_people__person.is_identified"; "lazy from cohort")]
#[test_case("session_recording_events", "person.id", "session_recording_events__pdi__person.id"; "recordings to person")]
fn test_resolves_to_column(table: &str, field: &str, expected: &str) {
    let db = analytics();
    let mut scope = QueryScope::new(&db, table).unwrap();
    assert_eq!(scope.resolve_dotted(field).unwrap().expr.to_sql(), expected);
}

#[test_case("events", "properties.$browser", "events.properties", "'$browser'"; "event property")]
#[test_case("events", "person.properties.email", "events__pdi__person.properties", "'email'"; "person property")]
#[test_case("events", "poe.properties.plan", "events.person_properties", "'plan'"; "person on event property")]
#[test_case("groups", "group_properties.industry", "groups.group_properties", "'industry'"; "group property")]
fn test_resolves_to_json_property(table: &str, field: &str, column: &str, key: &str) {
    let db = analytics();
    let mut scope = QueryScope::new(&db, table).unwrap();
    let resolved = scope.resolve_dotted(field).unwrap();
    assert_eq!(resolved.kind, Some(FieldKind::String));
    assert_eq!(
        resolved.expr.to_sql(),
        format!(
            "replaceRegexpAll(JSONExtractRaw({}, {}), '^\"|\"$', '')",
            column, key
        )
    );
}

#[test]
fn test_full_query_sql() {
    let db = analytics();
    let query = compile_select(
        &db,
        "events",
        &["event", "person.properties.email", "person.created_at"],
        DEFAULT_MAX_JOINS,
    )
    .unwrap();

    let expected = [
        "SELECT events.event, replaceRegexpAll(JSONExtractRaw(events__pdi__person.properties, 'email'), '^\"|\"$', ''), events__pdi__person.created_at",
        "FROM events AS events",
        "INNER JOIN (SELECT argMax(person_id, version) AS person_id, distinct_id FROM person_distinct_id2 GROUP BY distinct_id HAVING argMax(is_deleted, version) = 0) AS events__pdi ON events.distinct_id = events__pdi.distinct_id",
        "INNER JOIN (SELECT argMax(properties, version) AS properties, argMax(created_at, version) AS created_at, id FROM person GROUP BY id HAVING argMax(is_deleted, version) = 0) AS events__pdi__person ON events__pdi.person_id = events__pdi__person.id",
    ]
    .join("\n");
    assert_eq!(query.to_sql(), expected);
}

#[test]
fn test_joins_are_inner_and_parent_first() {
    let db = analytics();
    let query = compile_select(&db, "events", &["person.id"], DEFAULT_MAX_JOINS).unwrap();
    assert_eq!(query.joins.len(), 2);
    assert!(query.joins.iter().all(|j| j.join_type == JoinType::Inner));
    assert_eq!(query.joins[0].table_alias, "events__pdi");
    assert_eq!(
        query.joins[1].joining_on[0].to_sql(),
        "events__pdi.person_id = events__pdi__person.id"
    );
}

#[test]
fn test_traverser_transparency() {
    let db = analytics();
    let via_traverser =
        compile_select(&db, "events", &["person_id", "person.properties.name"], 8).unwrap();
    let manual = compile_select(
        &db,
        "events",
        &["pdi.person_id", "pdi.person.properties.name"],
        8,
    )
    .unwrap();
    assert_eq!(via_traverser, manual);
    assert_eq!(via_traverser.to_sql(), manual.to_sql());
}

#[test]
fn test_projection_is_exactly_requested_plus_key() {
    let db = analytics();
    let query = compile_select(
        &db,
        "person_distinct_ids",
        &["person.properties.email"],
        DEFAULT_MAX_JOINS,
    )
    .unwrap();
    let subquery = query.joins[0].subquery();
    assert_eq!(subquery.output_names(), vec!["properties", "id"]);
    let sql = subquery.to_sql();
    for unused in ["created_at", "team_id", "is_identified"] {
        assert!(!sql.contains(unused), "{} leaked into {}", unused, sql);
    }
}

#[test]
fn test_requesting_the_key_selects_it_once() {
    let db = analytics();
    let query = compile_select(&db, "events", &["person.id"], DEFAULT_MAX_JOINS).unwrap();
    assert_eq!(query.joins[1].subquery().output_names(), vec!["id"]);
}

#[test]
fn test_wildcard_on_events_stays_join_free() {
    let db = analytics();
    let query = compile_select(&db, "events", &["*"], DEFAULT_MAX_JOINS).unwrap();
    assert!(query.joins.is_empty());
    assert_eq!(query.select.len(), 11);
}

#[test]
fn test_splash_completeness() {
    let db = analytics();
    for (name, table) in db.tables() {
        let splash = table.splash().unwrap();
        let mut unique = splash.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), splash.len(), "duplicates in splash of {}", name);

        let leaf_fields = table
            .attributes()
            .filter(|(attr_name, attr)| {
                matches!(attr, Attribute::Field(_)) && !table.is_splash_excluded(attr_name)
            })
            .count();
        let nested_leaves = splash.iter().filter(|p| p.contains('.')).count();
        assert_eq!(splash.len(), leaf_fields + nested_leaves, "{}", name);
    }
}

#[test]
fn test_join_budget_from_builder() {
    let db = analytics();
    let mut builder = SelectBuilder::new(&db, "events").unwrap().max_joins(1);
    let err = builder.select("person.id").err().unwrap();
    assert_eq!(err, SchemaError::TooManyJoins { limit: 1 });
}

#[test_case("events", "nope"; "unknown field")]
#[test_case("events", "person.nope"; "unknown field past a join")]
#[test_case("events", "poe.nope"; "unknown field in virtual table")]
fn test_lookup_errors(table: &str, field: &str) {
    let db = analytics();
    let err = compile_select(&db, table, &[field], DEFAULT_MAX_JOINS).unwrap_err();
    assert!(err.is_lookup(), "{:?}", err);
}

#[test_case("events", "person"; "ends on traverser to relation")]
#[test_case("events", "poe"; "ends on virtual table")]
#[test_case("events", "timestamp.year"; "continues past datetime")]
fn test_incomplete_chains(table: &str, field: &str) {
    let db = analytics();
    let err = compile_select(&db, table, &[field], DEFAULT_MAX_JOINS).unwrap_err();
    assert!(matches!(err, SchemaError::IncompleteChain { .. }), "{:?}", err);
}

#[test]
fn test_empty_request_emits_nothing() {
    let collapse = VersionedCollapse::persons();
    assert_eq!(
        collapse.subquery(&RequestedFields::new()).unwrap_err(),
        SchemaError::EmptyFieldRequest {
            relation: "persons".to_string()
        }
    );
    assert_eq!(collapse.key_column(), "id");
}

#[test]
fn test_analytics_schema_validates() {
    let db = analytics();
    assert!(SchemaValidator::new()
        .with_max_joins(DEFAULT_MAX_JOINS)
        .validate(&db)
        .is_ok());
}

#[test]
fn test_concurrent_compilation_shares_database() {
    let db = analytics();
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let db = Arc::clone(&db);
            std::thread::spawn(move || {
                let field = if i % 2 == 0 {
                    "person.properties.email"
                } else {
                    "pdi.person_id"
                };
                compile_select(&db, "events", &[field], DEFAULT_MAX_JOINS).map(|q| q.joins.len())
            })
        })
        .collect();
    let joins: Vec<usize> = handles
        .into_iter()
        .map(|h| h.join().unwrap().unwrap())
        .collect();
    assert_eq!(joins, vec![2, 1, 2, 1, 2, 1, 2, 1]);
}

#[test]
fn test_custom_collapse_columns() {
    let orders = eventql::schema_catalog::Table::physical("orders", "orders_log")
        .column(FieldDescriptor::string("order_id"))
        .column(FieldDescriptor::float("amount"))
        .column(FieldDescriptor::integer("_version"))
        .column(FieldDescriptor::integer("_deleted"))
        .build()
        .unwrap();
    let payments = eventql::schema_catalog::Table::physical("payments", "payments")
        .column(FieldDescriptor::string("order_ref"))
        .lazy(
            "order",
            eventql::schema_catalog::LazyTable::new(
                "order_ref",
                "orders",
                Arc::new(
                    VersionedCollapse::new("orders", "orders_log", "order_id")
                        .with_version_column("_version")
                        .with_deleted_column("_deleted"),
                ),
            ),
        )
        .build()
        .unwrap();
    let db = Database::builder().add(orders).add(payments).build().unwrap();
    SchemaValidator::new().validate(&db).unwrap();

    let query = compile_select(&db, "payments", &["order.amount"], 4).unwrap();
    assert_eq!(
        query.joins[0].subquery().to_sql(),
        "SELECT argMax(amount, _version) AS amount, order_id\nFROM orders_log\nGROUP BY order_id\nHAVING argMax(_deleted, _version) = 0"
    );
}
