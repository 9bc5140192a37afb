//! # quarry-core
//!
//! Declarative filters compiled into named-parameter SQL.
//!
//! This crate provides:
//! - Entity metadata and a registry to resolve entities by name
//! - A filter model: condition trees, ordering, limits and associations
//! - A where compiler producing unique `:name` placeholders
//! - SELECT / INSERT / UPDATE / DELETE assembly
//!
//! Nothing here talks to a database. Identifiers are checked before they
//! are interpolated and values only ever travel as bound parameters.
//!
//! ## Compiling a filter
//!
//! ```rust
//! use quarry_core::{build_select, Condition, Entity, FilterSpec, OrderSpec};
//!
//! let user = Entity::new("User", "users", "id").with_columns(["name", "age"]);
//!
//! let spec = FilterSpec::new()
//!     .select(["id", "name"])
//!     .filter(Condition::gt_eq("age", 18))
//!     .filter(Condition::in_list("name", vec!["Ann", "Bob"]).unwrap())
//!     .order_by(OrderSpec::asc("name"));
//!
//! let stmt = build_select(&spec, &user).unwrap();
//! assert_eq!(
//!     stmt.sql,
//!     "SELECT `users`.`id`, `users`.`name` FROM `users` \
//!      WHERE (`users`.`age` >= :age_0) AND (`users`.`name` IN (:name_1in0, :name_1in1)) \
//!      ORDER BY `users`.`name` ASC"
//! );
//! assert_eq!(stmt.params.len(), 3);
//! ```
//!
//! ## Filters from JSON
//!
//! ```rust
//! use quarry_core::{FilterSpec, Where};
//!
//! let spec = FilterSpec::from_json(r#"{
//!     "where": {"operator": "OR", "operands": [
//!         {"column": "age", "condition": "BETWEEN", "value": [18, 30]},
//!         {"column": "name", "condition": "LIKE", "value": "A%"}
//!     ]},
//!     "limit": {"rowCount": 10}
//! }"#).unwrap();
//!
//! assert!(matches!(spec.predicate, Some(Where::Tree(_))));
//! ```

pub mod builder;
pub mod error;
pub mod filter;
pub mod ident;
pub mod schema;
pub mod value;

pub use builder::{
    build_delete, build_insert, build_insert_many, build_select, build_update, compile_where,
    projected_columns, scan_placeholders, BulkStatement, CompiledPredicate, CompiledStatement,
    Params, Placeholder, StatementKind, COUNT_ALIAS, FRACTIONAL_SUFFIX, OFFSET_PARAM,
    ROW_COUNT_PARAM,
};
pub use error::{FilterError, Result};
pub use filter::{
    AssociationSpec, BoolOp, Condition, ConditionTree, Direction, FilterSpec, JoinKey, Limit,
    Operand, Operator, OrderBy, OrderSpec, Where,
};
pub use ident::{is_valid_identifier, validate_identifier};
pub use schema::{Entity, Schema};
pub use value::{FromSqlValue, SqlValue, ToSqlValue};
