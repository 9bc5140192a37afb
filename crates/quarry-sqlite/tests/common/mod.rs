#![allow(dead_code)]

use quarry_orm::{Connection, Entity, Schema, SqlValue, TransactionManager};
use quarry_sqlite::SqliteConnection;

pub const FIXTURE: &str = "
    CREATE TABLE owners (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        city TEXT
    );
    CREATE TABLE pets (
        id INTEGER PRIMARY KEY,
        ownerId INTEGER,
        name TEXT NOT NULL,
        species TEXT NOT NULL
    );
    INSERT INTO owners (id, name, city) VALUES
        (1, 'Ann', 'Oslo'),
        (2, 'Bob', 'Bergen'),
        (3, 'Cid', NULL);
    INSERT INTO pets (id, ownerId, name, species) VALUES
        (10, 1, 'a', 'cat'),
        (11, 1, 'b', 'dog'),
        (12, 2, 'c', 'cat');
";

pub fn schema() -> Schema {
    Schema::from_entities([
        Entity::new("Owner", "owners", "id").with_columns(["name", "city"]),
        Entity::new("Pet", "pets", "id").with_columns(["ownerId", "name", "species"]),
    ])
    .unwrap_or_else(|e| panic!("Invalid test schema: {e}"))
}

pub fn session() -> TransactionManager<SqliteConnection> {
    let mut conn = SqliteConnection::open_in_memory()
        .unwrap_or_else(|e| panic!("Failed to open in-memory database: {e}"));
    conn.exec_raw(FIXTURE)
        .unwrap_or_else(|e| panic!("Failed to load fixture: {e}"));
    TransactionManager::new(conn)
}

pub fn count(session: &mut TransactionManager<SqliteConnection>, table: &str) -> i64 {
    let rows = session
        .get_mut()
        .execute(
            &format!("SELECT COUNT(*) AS n FROM {table}"),
            &Default::default(),
            quarry_orm::StatementKind::Select,
        )
        .and_then(quarry_orm::Outcome::into_rows)
        .unwrap_or_else(|e| panic!("Count failed: {e}"));
    match rows[0].get("n") {
        Some(SqlValue::Int(n)) => *n,
        other => panic!("unexpected count value {other:?}"),
    }
}

pub fn text(value: &str) -> SqlValue {
    SqlValue::Text(value.to_owned())
}
