//! UPDATE assembly keyed by primary key.

use crate::error::{FilterError, Result};
use crate::ident::quote_identifier;
use crate::schema::Entity;
use crate::value::SqlValue;

use super::statement::{CompiledStatement, Params, StatementKind};

/// Builds `UPDATE table SET ... WHERE pk = :pk_n`.
pub fn build_update(
    entity: &Entity,
    key: &SqlValue,
    changes: &[(String, SqlValue)],
) -> Result<CompiledStatement> {
    if changes.is_empty() {
        return Err(FilterError::EmptyOperands("UPDATE"));
    }
    let table_clause = entity.table_clause(None)?;

    let mut params = Params::new();
    let mut assignments = Vec::with_capacity(changes.len());
    for (i, (column, value)) in changes.iter().enumerate() {
        entity.require_column(column)?;
        let name = format!("{column}_{i}");
        assignments.push(format!("{} = :{name}", quote_identifier(column)));
        params.insert(name, value.clone())?;
    }

    let key_name = format!("{}_{}", entity.primary_key, changes.len());
    params.insert(key_name.clone(), key.clone())?;

    let sql = format!(
        "UPDATE {table_clause} SET {} WHERE {} = :{key_name}",
        assignments.join(", "),
        quote_identifier(&entity.primary_key)
    );

    Ok(CompiledStatement {
        sql,
        params,
        kind: StatementKind::Update,
    })
}
