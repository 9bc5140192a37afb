#![allow(dead_code)]

use std::collections::BTreeSet;

use quarry_core::{build_select, CompiledStatement, Entity, FilterSpec, Schema};

pub fn schema() -> Schema {
    Schema::from_entities([
        Entity::new("Owner", "owners", "id")
            .with_columns(["name", "city", "age", "createdAt"])
            .with_fractional("createdAt"),
        Entity::new("Pet", "pets", "id").with_columns(["ownerId", "name", "species", "born"]),
    ])
    .unwrap_or_else(|e| panic!("Invalid test schema: {e}"))
}

pub fn compile(entity: &str, json: &str) -> CompiledStatement {
    let schema = schema();
    let spec = FilterSpec::from_json(json)
        .unwrap_or_else(|e| panic!("Failed to parse filter: {json}\nError: {e}"));
    build_select(&spec, schema.get(entity).unwrap())
        .unwrap_or_else(|e| panic!("Failed to compile: {json}\nError: {e}"))
}

/// Asserts that placeholders in the text and keys of the parameter map are
/// the same set.
pub fn assert_placeholders_match(stmt: &CompiledStatement) {
    let in_text: BTreeSet<&str> = quarry_core::scan_placeholders(&stmt.sql)
        .iter()
        .map(|p| p.name)
        .collect();
    let in_map: BTreeSet<&str> = stmt.params.names().collect();
    assert_eq!(in_text, in_map, "placeholder mismatch in {}", stmt.sql);
}
