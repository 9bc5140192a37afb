//! SELECT assembly.

use tracing::warn;

use crate::error::Result;
use crate::filter::{FilterSpec, Limit, OrderBy, OrderSpec};
use crate::ident::quote_identifier;
use crate::schema::Entity;
use crate::value::ToSqlValue;

use super::predicate::compile_predicate;
use super::statement::{CompiledStatement, Params, StatementKind};

/// Parameter bound to the LIMIT row count.
pub const ROW_COUNT_PARAM: &str = "rowCount";
/// Parameter bound to the OFFSET.
pub const OFFSET_PARAM: &str = "offset";
/// Alias of the count column in count queries.
pub const COUNT_ALIAS: &str = "totalRowCount";
/// Suffix of the text rendering of a fractional timestamp column.
pub const FRACTIONAL_SUFFIX: &str = "_fractional";

/// Columns a filter projects, in order and without duplicates.
///
/// Empty means every column. A restricted select is extended with the local
/// join columns of well formed associations so the rows can be joined in
/// memory later.
pub fn projected_columns(spec: &FilterSpec, entity: &Entity) -> Result<Vec<String>> {
    if spec.select.is_empty() {
        return Ok(Vec::new());
    }

    let association_columns = spec
        .associations
        .iter()
        .filter(|a| a.is_well_formed())
        .flat_map(|a| a.join_keys.iter().map(|k| &k.local));

    let mut columns: Vec<String> = Vec::new();
    for column in spec.select.iter().chain(association_columns) {
        entity.require_column(column)?;
        if !columns.contains(column) {
            columns.push(column.clone());
        }
    }
    Ok(columns)
}

/// Builds the SELECT statement for `spec` over `entity`.
pub fn build_select(spec: &FilterSpec, entity: &Entity) -> Result<CompiledStatement> {
    let table_clause = entity.table_clause(spec.schema.as_deref())?;
    let mut params = Params::new();

    let select_clause = select_clause(spec, entity, &table_clause)?;
    let mut sql = format!("SELECT {select_clause} FROM {table_clause}");

    if let Some(predicate) = &spec.predicate {
        if let Some(where_sql) = compile_predicate(predicate, entity, &table_clause, &mut params)? {
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
        }
    }

    if let Some(order_sql) = order_clause(spec.order_by.as_ref(), entity, &table_clause)? {
        sql.push_str(" ORDER BY ");
        sql.push_str(&order_sql);
    }

    if let Some(limit) = &spec.limit {
        bind_limit(limit, &mut params)?;
        sql.push_str(&format!(" LIMIT :{ROW_COUNT_PARAM} OFFSET :{OFFSET_PARAM}"));
    } else if spec.unique {
        sql.push_str(" LIMIT 1");
    }

    Ok(CompiledStatement {
        sql,
        params,
        kind: StatementKind::Select,
    })
}

fn select_clause(spec: &FilterSpec, entity: &Entity, table_clause: &str) -> Result<String> {
    let columns = projected_columns(spec, entity)?;

    if spec.count_only {
        return Ok(format!(
            "COUNT({table_clause}.{}) AS {}",
            quote_identifier(&entity.primary_key),
            quote_identifier(COUNT_ALIAS)
        ));
    }

    if columns.is_empty() {
        let fractional = spec
            .fractional_timestamps
            .as_ref()
            .filter(|f| !f.is_empty())
            .unwrap_or(&entity.fractional_timestamps);

        let mut parts = vec![format!("{table_clause}.*")];
        for column in fractional {
            if !entity.has_column(column) {
                warn!(entity = %entity.name, column = %column, "Skipping unknown fractional timestamp column");
                continue;
            }
            parts.push(format!(
                "CONCAT({table_clause}.{}) AS {}",
                quote_identifier(column),
                quote_identifier(&format!("{column}{FRACTIONAL_SUFFIX}"))
            ));
        }
        return Ok(parts.join(", "));
    }

    if let [only] = columns.as_slice() {
        if spec.distinct {
            return Ok(format!(
                "DISTINCT({table_clause}.{}) AS {}",
                quote_identifier(only),
                quote_identifier(only)
            ));
        }
    }

    Ok(columns
        .iter()
        .map(|c| format!("{table_clause}.{}", quote_identifier(c)))
        .collect::<Vec<_>>()
        .join(", "))
}

fn render_order(spec: &OrderSpec, table_clause: &str) -> String {
    let mut part = format!("{table_clause}.{}", quote_identifier(&spec.column));
    if let Some(direction) = spec.direction {
        part.push(' ');
        part.push_str(direction.as_sql());
    }
    part
}

fn order_clause(
    order_by: Option<&OrderBy>,
    entity: &Entity,
    table_clause: &str,
) -> Result<Option<String>> {
    match order_by {
        None => Ok(None),
        Some(OrderBy::One(spec)) => {
            entity.require_column(&spec.column)?;
            Ok(Some(render_order(spec, table_clause)))
        }
        Some(OrderBy::Many(specs)) => {
            let parts: Vec<String> = specs
                .iter()
                .filter(|spec| {
                    let known = entity.has_column(&spec.column);
                    if !known {
                        warn!(entity = %entity.name, column = %spec.column, "Skipping unknown ORDER BY column");
                    }
                    known
                })
                .map(|spec| render_order(spec, table_clause))
                .collect();
            Ok((!parts.is_empty()).then(|| parts.join(", ")))
        }
    }
}

fn bind_limit(limit: &Limit, params: &mut Params) -> Result<()> {
    params.insert(ROW_COUNT_PARAM, limit.effective_row_count().to_sql_value())?;
    params.insert(OFFSET_PARAM, limit.effective_offset().to_sql_value())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FilterError;
    use crate::filter::{AssociationSpec, Condition};
    use crate::value::SqlValue;

    fn user() -> Entity {
        Entity::new("User", "users", "id")
            .with_columns(["name", "email", "createdAt", "groupId"])
            .with_fractional("createdAt")
    }

    #[test]
    fn test_select_all_adds_fractional_columns() {
        let stmt = build_select(&FilterSpec::new(), &user()).unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT `users`.*, CONCAT(`users`.`createdAt`) AS `createdAt_fractional` FROM `users`"
        );
        assert!(stmt.params.is_empty());
        assert_eq!(stmt.kind, StatementKind::Select);
    }

    #[test]
    fn test_fractional_override_and_unknown_skip() {
        let spec = FilterSpec::new().fractional_timestamps(["email", "missing"]);
        let stmt = build_select(&spec, &user()).unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT `users`.*, CONCAT(`users`.`email`) AS `email_fractional` FROM `users`"
        );
    }

    #[test]
    fn test_select_columns_with_schema() {
        let spec = FilterSpec::new().select(["id", "name", "id"]).schema("main");
        let stmt = build_select(&spec, &user()).unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT `main`.`users`.`id`, `main`.`users`.`name` FROM `main`.`users`"
        );
    }

    #[test]
    fn test_select_unknown_column() {
        let spec = FilterSpec::new().select(["password"]);
        assert!(matches!(
            build_select(&spec, &user()),
            Err(FilterError::UnknownColumn { .. })
        ));
    }

    #[test]
    fn test_select_rejects_unvalidated_column() {
        let entity = Entity::new("User", "users", "id").with_column("name` = 1 OR 1=1 OR `x");
        let spec = FilterSpec::new().filter(Condition::eq("name` = 1 OR 1=1 OR `x", "a"));
        assert_eq!(
            build_select(&spec, &entity),
            Err(FilterError::InvalidIdentifier("name` = 1 OR 1=1 OR `x".into()))
        );

        let spec = FilterSpec::new().order_by(OrderSpec::asc("name` = 1 OR 1=1 OR `x"));
        assert!(matches!(
            build_select(&spec, &entity),
            Err(FilterError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_select_adds_association_locals() {
        let spec = FilterSpec::new()
            .select(["name"])
            .with(AssociationSpec::new("Group", "group").join("groupId", "id"));
        assert_eq!(
            projected_columns(&spec, &user()).unwrap(),
            vec!["name", "groupId"]
        );
    }

    #[test]
    fn test_distinct_single_column() {
        let spec = FilterSpec::new().select(["email"]).distinct();
        let stmt = build_select(&spec, &user()).unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT DISTINCT(`users`.`email`) AS `email` FROM `users`"
        );

        let spec = FilterSpec::new().select(["email", "name"]).distinct();
        let stmt = build_select(&spec, &user()).unwrap();
        assert!(!stmt.sql.contains("DISTINCT"));
    }

    #[test]
    fn test_count_only() {
        let spec = FilterSpec::new()
            .count_only()
            .filter(Condition::eq("name", "x"));
        let stmt = build_select(&spec, &user()).unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT COUNT(`users`.`id`) AS `totalRowCount` FROM `users` WHERE (`users`.`name` = :name_0)"
        );
    }

    #[test]
    fn test_unique_without_limit() {
        let stmt = build_select(&FilterSpec::new().select(["id"]).unique(), &user()).unwrap();
        assert_eq!(stmt.sql, "SELECT `users`.`id` FROM `users` LIMIT 1");
    }

    #[test]
    fn test_limit_defaults() {
        let spec = FilterSpec::new().select(["id"]).limit(Limit::default()).unique();
        let stmt = build_select(&spec, &user()).unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT `users`.`id` FROM `users` LIMIT :rowCount OFFSET :offset"
        );
        assert_eq!(stmt.params.get("rowCount"), Some(&SqlValue::UInt(u64::MAX)));
        assert_eq!(stmt.params.get("offset"), Some(&SqlValue::Int(0)));
    }

    #[test]
    fn test_order_by_single_rejects_unknown() {
        let spec = FilterSpec::new().order_by(OrderSpec::desc("rank"));
        assert!(matches!(
            build_select(&spec, &user()),
            Err(FilterError::UnknownColumn { .. })
        ));
    }

    #[test]
    fn test_order_by_list_skips_unknown() {
        let spec = FilterSpec::new().select(["id"]).order_by_all(vec![
            OrderSpec::desc("name"),
            OrderSpec::asc("rank"),
            OrderSpec::new("id"),
        ]);
        let stmt = build_select(&spec, &user()).unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT `users`.`id` FROM `users` ORDER BY `users`.`name` DESC, `users`.`id`"
        );

        let spec = FilterSpec::new()
            .select(["id"])
            .order_by_all(vec![OrderSpec::asc("rank")]);
        let stmt = build_select(&spec, &user()).unwrap();
        assert_eq!(stmt.sql, "SELECT `users`.`id` FROM `users`");
    }
}
