//! Blocking SQLite connection over sqlx.

use std::collections::BTreeSet;

use quarry_core::{scan_placeholders, Params, SqlValue, StatementKind};
use quarry_orm::{Connection, ConnectionError, Outcome, Record};
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteRow};
use sqlx::{Column, Connection as _, Row, TypeInfo, ValueRef};
use tokio::runtime::{Builder, Runtime};
use tracing::debug;

use crate::config::SqliteConfig;

type Query<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// Rewrites `:name` placeholders to positional `?` and lists the values in
/// placeholder order.
///
/// Every placeholder needs a value and every value must be used.
pub fn bind_named(sql: &str, params: &Params) -> Result<(String, Vec<SqlValue>), ConnectionError> {
    let mut text = String::with_capacity(sql.len());
    let mut values = Vec::new();
    let mut used = BTreeSet::new();
    let mut last = 0;

    for placeholder in scan_placeholders(sql) {
        let value = params
            .get(placeholder.name)
            .ok_or_else(|| ConnectionError::MissingParameter(placeholder.name.to_owned()))?;
        text.push_str(&sql[last..placeholder.start]);
        text.push('?');
        last = placeholder.end;
        values.push(value.clone());
        used.insert(placeholder.name);
    }
    text.push_str(&sql[last..]);

    if let Some(unused) = params.names().find(|name| !used.contains(name)) {
        return Err(ConnectionError::UnusedParameter(unused.to_owned()));
    }
    Ok((text, values))
}

fn bind_value(query: Query<'_>, value: SqlValue) -> Query<'_> {
    match value {
        SqlValue::Null => query.bind(Option::<i64>::None),
        SqlValue::Bool(b) => query.bind(b),
        SqlValue::Int(i) => query.bind(i),
        // SQLite integers are signed; LIMIT's "no limit" default lands here.
        SqlValue::UInt(u) => query.bind(i64::try_from(u).unwrap_or(i64::MAX)),
        SqlValue::Float(f) => query.bind(f),
        SqlValue::Text(s) => query.bind(s),
        SqlValue::Blob(b) => query.bind(b),
    }
}

fn decode_row(row: &SqliteRow) -> Result<Record, sqlx::Error> {
    let mut record = Record::new();
    for column in row.columns() {
        let index = column.ordinal();
        let raw = row.try_get_raw(index)?;
        let value = if raw.is_null() {
            SqlValue::Null
        } else {
            match raw.type_info().name() {
                "INTEGER" | "INT" | "INT4" | "INT8" | "BIGINT" | "BOOLEAN" => {
                    SqlValue::Int(row.try_get_unchecked(index)?)
                }
                "REAL" | "FLOAT" | "DOUBLE" => SqlValue::Float(row.try_get_unchecked(index)?),
                "BLOB" => SqlValue::Blob(row.try_get_unchecked(index)?),
                _ => SqlValue::Text(row.try_get_unchecked(index)?),
            }
        };
        record.set(column.name(), value);
    }
    Ok(record)
}

/// A single SQLite connection driven by its own current-thread runtime.
///
/// Calls block until the statement completes.
pub struct SqliteConnection {
    runtime: Runtime,
    inner: sqlx::SqliteConnection,
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection").finish_non_exhaustive()
    }
}

impl SqliteConnection {
    /// Opens a connection with the given settings.
    pub fn open(config: &SqliteConfig) -> Result<Self, ConnectionError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(ConnectionError::driver)?;
        let options = config.connect_options().map_err(ConnectionError::driver)?;
        let inner = runtime
            .block_on(sqlx::SqliteConnection::connect_with(&options))
            .map_err(ConnectionError::driver)?;

        debug!(database = %config.database, "Opened SQLite connection");
        Ok(Self { runtime, inner })
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self, ConnectionError> {
        Self::open(&SqliteConfig::default())
    }

    /// Closes the connection.
    pub fn close(self) -> Result<(), ConnectionError> {
        let Self { runtime, inner } = self;
        runtime.block_on(inner.close()).map_err(ConnectionError::driver)
    }
}

impl Connection for SqliteConnection {
    fn execute(
        &mut self,
        sql: &str,
        params: &Params,
        kind: StatementKind,
    ) -> Result<Outcome, ConnectionError> {
        let (text, values) = bind_named(sql, params)?;
        debug!(sql = %text, values = values.len(), kind = %kind, "Running statement");

        let query = values
            .into_iter()
            .fold(sqlx::query(&text), bind_value);

        match kind {
            StatementKind::Select => {
                let rows = self
                    .runtime
                    .block_on(query.fetch_all(&mut self.inner))
                    .map_err(ConnectionError::driver)?;
                rows.iter()
                    .map(decode_row)
                    .collect::<Result<Vec<_>, _>>()
                    .map(Outcome::Rows)
                    .map_err(ConnectionError::driver)
            }
            StatementKind::Insert => {
                let result = self
                    .runtime
                    .block_on(query.execute(&mut self.inner))
                    .map_err(ConnectionError::driver)?;
                u64::try_from(result.last_insert_rowid())
                    .map(Outcome::InsertId)
                    .map_err(|_| ConnectionError::Rejected(String::from("negative insert id")))
            }
            StatementKind::Update | StatementKind::Delete => {
                let result = self
                    .runtime
                    .block_on(query.execute(&mut self.inner))
                    .map_err(ConnectionError::driver)?;
                Ok(Outcome::Affected(result.rows_affected()))
            }
        }
    }

    fn exec_raw(&mut self, sql: &str) -> Result<u64, ConnectionError> {
        debug!(sql = %sql, "Running raw statement");
        let result = self
            .runtime
            .block_on(sqlx::raw_sql(sql).execute(&mut self.inner))
            .map_err(ConnectionError::driver)?;
        Ok(result.rows_affected())
    }
}
