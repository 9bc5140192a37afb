//! DELETE assembly keyed by primary key.

use crate::error::Result;
use crate::ident::quote_identifier;
use crate::schema::Entity;
use crate::value::SqlValue;

use super::statement::{CompiledStatement, Params, StatementKind};

/// Builds `DELETE FROM table WHERE pk = :pk_0`.
pub fn build_delete(entity: &Entity, key: &SqlValue) -> Result<CompiledStatement> {
    let key_name = format!("{}_0", entity.primary_key);
    let mut params = Params::new();
    params.insert(key_name.clone(), key.clone())?;

    Ok(CompiledStatement {
        sql: format!(
            "DELETE FROM {} WHERE {} = :{key_name}",
            entity.table_clause(None)?,
            quote_identifier(&entity.primary_key)
        ),
        params,
        kind: StatementKind::Delete,
    })
}
