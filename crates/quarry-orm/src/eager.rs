//! Eager loading of associated records.
//!
//! Resolution runs in three phases so that a failing association never
//! leaves the primary rows half-populated:
//!
//! 1. validate every association (property collisions, unknown columns),
//! 2. run one secondary query per association,
//! 3. attach the secondary rows to the primary rows.

use std::collections::BTreeSet;

use quarry_core::{AssociationSpec, Condition, Entity, FilterSpec, Schema, SqlValue};
use tracing::{debug, warn};

use crate::connection::Connection;
use crate::error::{OrmError, Result};
use crate::record::{Record, Related};
use crate::repository::fetch_records;
use crate::transaction::TransactionManager;

/// A validated association with its foreign column names resolved.
struct Plan<'s> {
    spec: &'s AssociationSpec,
    target: &'s Entity,
    /// `(local, foreign)` column pairs.
    keys: Vec<(&'s str, &'s str)>,
}

fn plan<'s>(
    schema: &'s Schema,
    entity: &'s Entity,
    rows: &[Record],
    specs: &'s [AssociationSpec],
) -> Result<Vec<Plan<'s>>> {
    let mut properties = BTreeSet::new();
    let mut plans = Vec::with_capacity(specs.len());

    for spec in specs {
        if !spec.is_well_formed() {
            warn!(entity = %entity.name, property = %spec.property, target = %spec.entity, "Skipping malformed association");
            continue;
        }

        let collides = entity.has_column(&spec.property)
            || !properties.insert(spec.property.as_str())
            || rows.iter().any(|r| r.contains(&spec.property));
        if collides {
            return Err(OrmError::Collision {
                entity: entity.name.clone(),
                property: spec.property.clone(),
            });
        }

        let target = schema.get(&spec.entity)?;
        let mut keys = Vec::with_capacity(spec.join_keys.len());
        for key in &spec.join_keys {
            entity.require_column(&key.local)?;
            let foreign = key.foreign.as_deref().unwrap_or(&entity.primary_key);
            target.require_column(foreign)?;
            keys.push((key.local.as_str(), foreign));
        }

        plans.push(Plan { spec, target, keys });
    }
    Ok(plans)
}

/// Local key values of a row, or `None` when any of them is NULL or absent.
fn local_values<'r>(row: &'r Record, keys: &[(&str, &str)]) -> Option<Vec<&'r SqlValue>> {
    keys.iter()
        .map(|(local, _)| row.get(local).filter(|v| !v.is_null()))
        .collect()
}

/// Builds the secondary filter: the caller's filter plus one IN condition
/// per foreign column. Returns `None` when no row has a usable key.
fn secondary_filter(plan: &Plan<'_>, rows: &[Record]) -> Result<Option<FilterSpec>> {
    let mut columns: Vec<Vec<SqlValue>> = vec![Vec::new(); plan.keys.len()];
    for values in rows.iter().filter_map(|r| local_values(r, &plan.keys)) {
        for (column, value) in columns.iter_mut().zip(values) {
            column.push(value.clone());
        }
    }
    if columns.first().is_none_or(Vec::is_empty) {
        return Ok(None);
    }

    let mut filter = plan.spec.filter.clone();
    for ((_, foreign), values) in plan.keys.iter().zip(columns) {
        filter = filter.filter(Condition::in_list(foreign, values)?);
        if !filter.select.is_empty() && !filter.select.iter().any(|c| c == foreign) {
            filter.select.push((*foreign).to_owned());
        }
    }
    filter.count_only = false;
    filter.values_only = false;
    filter.unique = false;
    if filter.schema.is_none() {
        filter.schema.clone_from(&plan.spec.schema);
    }
    Ok(Some(filter))
}

fn matches(primary: &[&SqlValue], secondary: &Record, keys: &[(&str, &str)]) -> bool {
    keys.iter()
        .zip(primary)
        .all(|((_, foreign), local)| {
            secondary
                .get(foreign)
                .is_some_and(|value| local.loosely_equals(value))
        })
}

fn attach(plan: &Plan<'_>, rows: &mut [Record], secondary: Option<&[Record]>) {
    for row in rows.iter_mut() {
        let related = match (secondary, local_values(row, &plan.keys)) {
            (Some(secondary), Some(values)) => {
                let mut found = secondary.iter().filter(|s| matches(&values, s, &plan.keys));
                if plan.spec.unique {
                    Related::One(found.next().cloned().map(Box::new))
                } else {
                    Related::Many(found.cloned().collect())
                }
            }
            _ => Related::empty(plan.spec.unique),
        };
        row.set_relation(plan.spec.property.clone(), related);
    }
}

/// Loads every association in `specs` and attaches it to `rows`.
///
/// Malformed associations are skipped with a warning. A property collision,
/// an unknown entity or an unknown join column aborts before any secondary
/// query runs; a failing secondary query aborts before any row is touched.
pub fn resolve_associations<C: Connection>(
    session: &mut TransactionManager<C>,
    schema: &Schema,
    entity: &Entity,
    rows: &mut [Record],
    specs: &[AssociationSpec],
) -> Result<()> {
    let plans = plan(schema, entity, rows, specs)?;

    let mut loaded: Vec<Option<Vec<Record>>> = Vec::with_capacity(plans.len());
    for plan in &plans {
        let secondary = match secondary_filter(plan, rows)? {
            Some(filter) => {
                let found = fetch_records(session, schema, plan.target, &filter)?;
                debug!(property = %plan.spec.property, rows = found.len(), "Loaded association");
                Some(found).filter(|f| !f.is_empty())
            }
            None => None,
        };
        loaded.push(secondary);
    }

    for (plan, secondary) in plans.iter().zip(&loaded) {
        attach(plan, rows, secondary.as_deref());
    }
    Ok(())
}
