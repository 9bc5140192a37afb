//! WHERE compilation.
//!
//! Each leaf becomes `(table.`column` OP :name)`. Parameter names are the
//! column, an underscore and the size of the parameter map at the time the
//! leaf is compiled, so names never repeat within one statement. Range and
//! list operators add a suffix per value: `btw0`/`btw1`, `notbtw0`/`notbtw1`,
//! `in{k}`, `notin{k}`.

use crate::error::{FilterError, Result};
use crate::filter::{Condition, ConditionTree, Operand, Where};
use crate::ident::quote_identifier;
use crate::schema::Entity;

use super::statement::Params;

/// A compiled predicate: SQL text and the values it references.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledPredicate {
    /// Parenthesized predicate text.
    pub sql: String,
    /// Parameters referenced by `sql`.
    pub params: Params,
}

/// Compiles a condition tree against `entity`.
///
/// `table_clause` is the already quoted table reference used to qualify
/// columns. The entity is validated before any column is interpolated.
pub fn compile_where(
    tree: &ConditionTree,
    entity: &Entity,
    table_clause: &str,
) -> Result<CompiledPredicate> {
    entity.validate()?;
    let mut params = Params::new();
    let sql = compile_tree(tree, entity, table_clause, &mut params)?;
    Ok(CompiledPredicate { sql, params })
}

/// Compiles the WHERE part of a filter into `params`.
///
/// Returns `None` for an empty flat list.
pub(crate) fn compile_predicate(
    predicate: &Where,
    entity: &Entity,
    table_clause: &str,
    params: &mut Params,
) -> Result<Option<String>> {
    let (conditions, joiner) = match predicate {
        Where::Tree(tree) => return compile_tree(tree, entity, table_clause, params).map(Some),
        Where::All(conditions) => (conditions, " AND "),
        Where::Any(conditions) => (conditions, " OR "),
    };

    let parts = conditions
        .iter()
        .map(|c| compile_condition(c, entity, table_clause, params))
        .collect::<Result<Vec<_>>>()?;

    if parts.is_empty() {
        Ok(None)
    } else {
        Ok(Some(parts.join(joiner)))
    }
}

fn compile_tree(
    tree: &ConditionTree,
    entity: &Entity,
    table_clause: &str,
    params: &mut Params,
) -> Result<String> {
    match tree {
        ConditionTree::Leaf(condition) => compile_condition(condition, entity, table_clause, params),
        ConditionTree::Node { op, operands } => {
            if operands.is_empty() {
                return Err(FilterError::EmptyNode(op.as_sql()));
            }
            let parts = operands
                .iter()
                .map(|operand| compile_tree(operand, entity, table_clause, params))
                .collect::<Result<Vec<_>>>()?;
            Ok(format!("({})", parts.join(&format!(" {} ", op.as_sql()))))
        }
    }
}

fn compile_condition(
    condition: &Condition,
    entity: &Entity,
    table_clause: &str,
    params: &mut Params,
) -> Result<String> {
    let column = condition.column();
    entity.require_column(column)?;

    let operator = condition.operator();
    let base = format!("{column}_{}", params.len());
    let suffix = operator.param_suffix();
    let target = format!("{table_clause}.{}", quote_identifier(column));

    match condition.operand() {
        Operand::Pair(low, high) if operator.is_range() => {
            let low_name = format!("{base}{suffix}0");
            let high_name = format!("{base}{suffix}1");
            params.insert(low_name.clone(), low.clone())?;
            params.insert(high_name.clone(), high.clone())?;
            Ok(format!("({target} {operator} :{low_name} AND :{high_name})"))
        }
        Operand::List(values) if operator.is_list() && !values.is_empty() => {
            let mut placeholders = Vec::with_capacity(values.len());
            for (k, value) in values.iter().enumerate() {
                let name = format!("{base}{suffix}{k}");
                params.insert(name.clone(), value.clone())?;
                placeholders.push(format!(":{name}"));
            }
            Ok(format!("({target} {operator} ({}))", placeholders.join(", ")))
        }
        Operand::Scalar(value) if !operator.is_range() && !operator.is_list() => {
            params.insert(base.clone(), value.clone())?;
            Ok(format!("({target} {operator} :{base})"))
        }
        _ if operator.is_range() => Err(FilterError::MalformedBetween {
            column: column.to_owned(),
            operator: operator.as_sql(),
        }),
        _ if operator.is_list() => Err(FilterError::EmptyInList {
            column: column.to_owned(),
            operator: operator.as_sql(),
        }),
        _ => Err(FilterError::ScalarExpected {
            column: column.to_owned(),
            operator: operator.as_sql(),
        }),
    }
}
