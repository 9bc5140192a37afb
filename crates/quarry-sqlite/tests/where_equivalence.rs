//! A compiled predicate selects exactly the rows a direct evaluation of the
//! same tree selects.

mod common;

use std::cmp::Ordering;

use common::session;
use quarry_orm::{
    BoolOp, Condition, ConditionTree, Connection, Entity, FilterSpec, Operand, Operator, Record,
    Repository, Schema, SqlValue, TransactionManager,
};
use quarry_sqlite::SqliteConnection;

const ITEMS: &str = "
    CREATE TABLE items (id INTEGER PRIMARY KEY, n INTEGER NOT NULL, label TEXT NOT NULL);
    INSERT INTO items (n, label) VALUES
        (1, 'apple'), (2, 'banana'), (3, 'cherry'), (4, 'apricot'),
        (5, 'blueberry'), (6, 'avocado'), (7, 'date'), (8, 'Akee');
";

fn items_schema() -> Schema {
    Schema::from_entities([Entity::new("Item", "items", "id").with_columns(["n", "label"])])
        .unwrap()
}

fn items_session() -> TransactionManager<SqliteConnection> {
    let mut session = session();
    session.get_mut().exec_raw(ITEMS).unwrap();
    session
}

fn compare(a: &SqlValue, b: &SqlValue) -> Ordering {
    match (a, b) {
        (SqlValue::Int(x), SqlValue::Int(y)) => x.cmp(y),
        (SqlValue::Text(x), SqlValue::Text(y)) => x.cmp(y),
        _ => panic!("evaluator only compares like values: {a:?} vs {b:?}"),
    }
}

/// ASCII case-insensitive LIKE with `%` and `_`.
fn like(pattern: &[u8], text: &[u8]) -> bool {
    match pattern.split_first() {
        None => text.is_empty(),
        Some((b'%', rest)) => (0..=text.len()).any(|i| like(rest, &text[i..])),
        Some((b'_', rest)) => !text.is_empty() && like(rest, &text[1..]),
        Some((c, rest)) => text
            .split_first()
            .is_some_and(|(t, tail)| t.eq_ignore_ascii_case(c) && like(rest, tail)),
    }
}

fn like_value(pattern: &SqlValue, value: &SqlValue) -> bool {
    match (pattern, value) {
        (SqlValue::Text(p), SqlValue::Text(v)) => like(p.as_bytes(), v.as_bytes()),
        _ => panic!("LIKE needs text"),
    }
}

fn range(operand: &Operand) -> (&SqlValue, &SqlValue) {
    match operand {
        Operand::Pair(low, high) => (low, high),
        Operand::List(values) if values.len() == 2 => (&values[0], &values[1]),
        other => panic!("not a range: {other:?}"),
    }
}

fn list(operand: &Operand) -> &[SqlValue] {
    match operand {
        Operand::List(values) => values,
        other => panic!("not a list: {other:?}"),
    }
}

fn scalar(operand: &Operand) -> &SqlValue {
    match operand {
        Operand::Scalar(value) => value,
        other => panic!("not a scalar: {other:?}"),
    }
}

fn eval_condition(condition: &Condition, row: &Record) -> bool {
    let value = row.get(condition.column()).unwrap();
    let operand = condition.operand();
    let within = |(low, high): (&SqlValue, &SqlValue)| {
        compare(value, low) != Ordering::Less && compare(value, high) != Ordering::Greater
    };

    match condition.operator() {
        Operator::Eq | Operator::NullSafeEq => compare(value, scalar(operand)) == Ordering::Equal,
        Operator::NotEq | Operator::LtGt => compare(value, scalar(operand)) != Ordering::Equal,
        Operator::Lt => compare(value, scalar(operand)) == Ordering::Less,
        Operator::Gt => compare(value, scalar(operand)) == Ordering::Greater,
        Operator::LtEq => compare(value, scalar(operand)) != Ordering::Greater,
        Operator::GtEq => compare(value, scalar(operand)) != Ordering::Less,
        Operator::Like => like_value(scalar(operand), value),
        Operator::NotLike => !like_value(scalar(operand), value),
        Operator::Between => within(range(operand)),
        Operator::NotBetween => !within(range(operand)),
        Operator::In => list(operand).iter().any(|v| compare(value, v) == Ordering::Equal),
        Operator::NotIn => list(operand).iter().all(|v| compare(value, v) != Ordering::Equal),
    }
}

fn eval(tree: &ConditionTree, row: &Record) -> bool {
    match tree {
        ConditionTree::Leaf(condition) => eval_condition(condition, row),
        ConditionTree::Node { op: BoolOp::And, operands } => operands.iter().all(|t| eval(t, row)),
        ConditionTree::Node { op: BoolOp::Or, operands } => operands.iter().any(|t| eval(t, row)),
    }
}

fn ids(rows: &[Record]) -> Vec<i64> {
    let mut ids: Vec<i64> = rows.iter().filter_map(|r| r.get_as("id")).collect();
    ids.sort_unstable();
    ids
}

fn trees() -> Vec<&'static str> {
    vec![
        r#"{"column": "n", "condition": ">", "value": 3}"#,
        r#"{"column": "n", "condition": "<>", "value": 3}"#,
        r#"{"column": "label", "condition": "LIKE", "value": "a%"}"#,
        r#"{"column": "label", "condition": "NOT LIKE", "value": "%rr%"}"#,
        r#"{"column": "n", "condition": "NOT BETWEEN", "value": [3, 6]}"#,
        r#"{"operator": "OR", "operands": [
            {"column": "n", "condition": "BETWEEN", "value": [2, 4]},
            {"column": "label", "condition": "IN", "value": ["date", "apple", "date"]}
        ]}"#,
        r#"{"operator": "AND", "operands": [
            {"column": "label", "condition": "LIKE", "value": "_p%"},
            {"operator": "OR", "operands": [
                {"column": "n", "condition": "<=", "value": 1},
                {"column": "n", "condition": ">=", "value": 4}
            ]},
            {"column": "n", "condition": "NOT IN", "value": [6]}
        ]}"#,
        r#"{"operator": "OR", "operands": [
            {"operator": "AND", "operands": [
                {"column": "n", "condition": "!=", "value": 2},
                {"column": "n", "condition": "<", "value": 5}
            ]},
            {"column": "label", "value": "avocado"}
        ]}"#,
    ]
}

#[test]
fn test_compiled_tree_matches_direct_evaluation() {
    let schema = items_schema();
    let mut session = items_session();
    let mut items = Repository::new(&mut session, &schema, "Item").unwrap();
    let all = items.find(&FilterSpec::new()).unwrap();
    assert_eq!(all.len(), 8);

    for json in trees() {
        let tree: ConditionTree = serde_json::from_str(json).unwrap();
        let expected: Vec<Record> = all.iter().filter(|r| eval(&tree, r)).cloned().collect();

        let found = items.find(&FilterSpec::new().tree(tree)).unwrap();
        assert_eq!(ids(&found), ids(&expected), "mismatch for {json}");
    }
}

#[test]
fn test_limit_and_offset() {
    let schema = items_schema();
    let mut session = items_session();
    let mut items = Repository::new(&mut session, &schema, "Item").unwrap();

    let spec = FilterSpec::from_json(
        r#"{"orderBy": {"column": "n", "mode": "DESC"}, "limit": {"rowCount": 3, "offset": 1}}"#,
    )
    .unwrap();
    let found: Vec<i64> = items
        .find(&spec)
        .unwrap()
        .iter()
        .filter_map(|r| r.get_as("n"))
        .collect();
    assert_eq!(found, [7, 6, 5]);

    let spec = FilterSpec::from_json(r#"{"limit": {"offset": 6}}"#).unwrap();
    assert_eq!(items.find(&spec).unwrap().len(), 2);
}

#[test]
fn test_distinct_and_values() {
    let schema = items_schema();
    let mut session = items_session();
    session
        .get_mut()
        .exec_raw("INSERT INTO items (n, label) VALUES (1, 'apple')")
        .unwrap();
    let mut items = Repository::new(&mut session, &schema, "Item").unwrap();

    let spec = FilterSpec::new()
        .select(["label"])
        .distinct()
        .filter(Condition::like("label", "ap%"));
    let values = items.values("label", &spec).unwrap();
    assert_eq!(values.len(), 2);

    let all = items.values("label", &FilterSpec::new()).unwrap();
    assert_eq!(all.len(), 9);
}
