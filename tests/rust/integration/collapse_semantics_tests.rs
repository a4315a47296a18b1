//! Evaluates emitted collapse subqueries over in-memory rows.
//!
//! The evaluator understands exactly the shape the collapse builder emits:
//! a single-table FROM, `GROUP BY key`, `argMax(column, version)` items,
//! the bare key and a `HAVING argMax(deleted, version) = 0` filter.

use eventql::schema_catalog::{RequestedFields, SchemaError, VersionedCollapse};
use eventql::sql_ast::{Literal, Operator, SelectQuery, SqlExpr};
use serde_json::{json, Map, Value};

type Row = Map<String, Value>;

fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        other => panic!("fixture rows must be objects, got {other}"),
    }
}

fn column_name(expr: &SqlExpr) -> &str {
    match expr {
        SqlExpr::Column(col) => &col.column,
        other => panic!("expected a column, got {other:?}"),
    }
}

fn eval(expr: &SqlExpr, group: &[&Row]) -> Value {
    match expr {
        SqlExpr::Column(col) => group[0][&col.column].clone(),
        SqlExpr::Literal(Literal::Integer(i)) => json!(i),
        SqlExpr::Call(call) if call.name == "argMax" => {
            let value = column_name(&call.args[0]);
            let version = column_name(&call.args[1]);
            let latest = group
                .iter()
                .max_by_key(|r| r[version].as_i64().unwrap())
                .unwrap();
            latest[value].clone()
        }
        SqlExpr::OperatorApplicationExp(op) if op.operator == Operator::Equal => {
            json!(eval(&op.operands[0], group) == eval(&op.operands[1], group))
        }
        other => panic!("unsupported expression {other:?}"),
    }
}

fn run(query: &SelectQuery, rows: &[Row]) -> Vec<Row> {
    assert!(query.joins.is_empty() && query.filter.is_none());
    let key = match query.group_by.as_slice() {
        [expr] => column_name(expr).to_string(),
        other => panic!("expected a single grouping key, got {other:?}"),
    };

    let mut groups: Vec<(Value, Vec<&Row>)> = Vec::new();
    for r in rows {
        match groups.iter_mut().find(|(k, _)| *k == r[&key]) {
            Some((_, members)) => members.push(r),
            None => groups.push((r[&key].clone(), vec![r])),
        }
    }

    let mut out = Vec::new();
    for (_, group) in &groups {
        if let Some(having) = &query.having {
            if eval(having, group) != json!(true) {
                continue;
            }
        }
        let mut result = Row::new();
        for item in &query.select {
            let (name, expr) = match item {
                SqlExpr::Alias { expr, alias } => (alias.clone(), expr.as_ref()),
                other => (column_name(other).to_string(), other),
            };
            result.insert(name, eval(expr, group));
        }
        out.push(result);
    }
    out
}

fn collapse() -> VersionedCollapse {
    VersionedCollapse::new("people", "people_log", "key")
        .with_version_column("version")
        .with_deleted_column("deleted")
}

fn name_only() -> RequestedFields {
    ["name"].into_iter().collect()
}

fn scenario_a() -> Vec<Row> {
    vec![
        row(json!({"key": 1, "version": 1, "deleted": 0, "name": "a", "email": "a@x"})),
        row(json!({"key": 1, "version": 2, "deleted": 0, "name": "b", "email": "b@x"})),
    ]
}

#[test]
fn test_latest_version_wins() {
    let query = collapse().subquery(&name_only()).unwrap();
    let out = run(&query, &scenario_a());
    assert_eq!(out, vec![row(json!({"name": "b", "key": 1}))]);
}

#[test]
fn test_latest_delete_removes_key() {
    let query = collapse().subquery(&name_only()).unwrap();
    let mut rows = scenario_a();
    rows.push(row(
        json!({"key": 1, "version": 3, "deleted": 1, "name": "b", "email": "b@x"}),
    ));
    assert!(run(&query, &rows).is_empty());
}

#[test]
fn test_resurrected_key_is_visible() {
    let query = collapse().subquery(&name_only()).unwrap();
    let rows = vec![
        row(json!({"key": 7, "version": 1, "deleted": 0, "name": "old"})),
        row(json!({"key": 7, "version": 2, "deleted": 1, "name": "old"})),
        row(json!({"key": 7, "version": 3, "deleted": 0, "name": "new"})),
    ];
    assert_eq!(
        run(&query, &rows),
        vec![row(json!({"name": "new", "key": 7}))]
    );
}

#[test]
fn test_insertion_order_does_not_matter() {
    let query = collapse().subquery(&name_only()).unwrap();
    let rows = vec![
        row(json!({"key": 1, "version": 1, "deleted": 0, "name": "a"})),
        row(json!({"key": 1, "version": 5, "deleted": 0, "name": "e"})),
        row(json!({"key": 1, "version": 3, "deleted": 0, "name": "c"})),
    ];
    let orders = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];
    for order in orders {
        let shuffled: Vec<Row> = order.iter().map(|&i| rows[i].clone()).collect();
        assert_eq!(
            run(&query, &shuffled),
            vec![row(json!({"name": "e", "key": 1}))],
            "order {:?}",
            order
        );
    }
}

#[test]
fn test_at_most_one_row_per_key() {
    let query = collapse().subquery(&name_only()).unwrap();
    let rows = vec![
        row(json!({"key": 1, "version": 1, "deleted": 0, "name": "a"})),
        row(json!({"key": 2, "version": 1, "deleted": 0, "name": "x"})),
        row(json!({"key": 1, "version": 2, "deleted": 0, "name": "b"})),
        row(json!({"key": 3, "version": 4, "deleted": 1, "name": "gone"})),
        row(json!({"key": 2, "version": 2, "deleted": 0, "name": "y"})),
    ];
    let out = run(&query, &rows);
    let keys: Vec<&Value> = out.iter().map(|r| &r["key"]).collect();
    assert_eq!(keys, vec![&json!(1), &json!(2)]);
    assert_eq!(out[0]["name"], json!("b"));
    assert_eq!(out[1]["name"], json!("y"));
}

#[test]
fn test_unrequested_columns_never_selected() {
    let query = collapse().subquery(&name_only()).unwrap();
    let out = run(&query, &scenario_a());
    assert!(out.iter().all(|r| !r.contains_key("email")));
}

#[test]
fn test_empty_request() {
    assert_eq!(
        collapse().subquery(&RequestedFields::new()).unwrap_err(),
        SchemaError::EmptyFieldRequest {
            relation: "people".to_string()
        }
    );
}
