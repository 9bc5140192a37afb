//! INSERT assembly for single rows and homogeneous batches.

use crate::error::{FilterError, Result};
use crate::ident::quote_identifier;
use crate::schema::Entity;
use crate::value::SqlValue;

use super::statement::{BulkStatement, CompiledStatement, Params, StatementKind};

/// Builds an INSERT for one row of `(column, value)` pairs.
pub fn build_insert(entity: &Entity, row: &[(String, SqlValue)]) -> Result<CompiledStatement> {
    let columns: Vec<&str> = row.iter().map(|(c, _)| c.as_str()).collect();
    let (sql, names) = insert_template(entity, &columns)?;

    let mut params = Params::new();
    for ((_, value), name) in row.iter().zip(names) {
        params.insert(name, value.clone())?;
    }

    Ok(CompiledStatement {
        sql,
        params,
        kind: StatementKind::Insert,
    })
}

/// Builds one INSERT template plus a parameter set per row.
///
/// The column set comes from the first row; every other row must carry
/// exactly the same columns, in any order.
pub fn build_insert_many<'a, I>(entity: &Entity, rows: I) -> Result<BulkStatement>
where
    I: IntoIterator<Item = &'a [(String, SqlValue)]>,
{
    let mut rows = rows.into_iter().peekable();
    let first: &'a [(String, SqlValue)] = *rows.peek().ok_or(FilterError::EmptyOperands("INSERT"))?;
    let columns: Vec<&str> = first.iter().map(|(c, _)| c.as_str()).collect();
    let (sql, names) = insert_template(entity, &columns)?;

    let mut bound = Vec::new();
    for (index, row) in rows.enumerate() {
        if row.len() != columns.len() {
            return Err(FilterError::MismatchedColumns { row: index });
        }
        let mut params = Params::new();
        for (column, name) in columns.iter().zip(&names) {
            let value = row
                .iter()
                .find(|(c, _)| c == column)
                .map(|(_, v)| v.clone())
                .ok_or(FilterError::MismatchedColumns { row: index })?;
            params.insert(name.clone(), value)?;
        }
        bound.push(params);
    }

    Ok(BulkStatement {
        sql,
        kind: StatementKind::Insert,
        rows: bound,
    })
}

fn insert_template(entity: &Entity, columns: &[&str]) -> Result<(String, Vec<String>)> {
    if columns.is_empty() {
        return Err(FilterError::EmptyOperands("INSERT"));
    }
    let table_clause = entity.table_clause(None)?;

    let mut names = Vec::with_capacity(columns.len());
    for (i, column) in columns.iter().enumerate() {
        entity.require_column(column)?;
        if columns[..i].contains(column) {
            return Err(FilterError::DuplicateParameter((*column).to_owned()));
        }
        names.push(format!("{column}_{i}"));
    }

    let quoted: Vec<String> = columns.iter().map(|c| quote_identifier(c)).collect();
    let placeholders: Vec<String> = names.iter().map(|n| format!(":{n}")).collect();
    let sql = format!(
        "INSERT INTO {table_clause} ({}) VALUES ({})",
        quoted.join(", "),
        placeholders.join(", ")
    );
    Ok((sql, names))
}
