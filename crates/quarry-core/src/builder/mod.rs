//! Statement assembly.
//!
//! Everything here produces text with `:name` placeholders plus a
//! [`Params`] map; nothing touches a connection.

mod delete;
mod insert;
mod predicate;
mod select;
mod statement;
mod update;

pub use delete::build_delete;
pub use insert::{build_insert, build_insert_many};
pub use predicate::{compile_where, CompiledPredicate};
pub use select::{
    build_select, projected_columns, COUNT_ALIAS, FRACTIONAL_SUFFIX, OFFSET_PARAM,
    ROW_COUNT_PARAM,
};
pub use statement::{
    scan_placeholders, BulkStatement, CompiledStatement, Params, Placeholder, StatementKind,
};
pub use update::build_update;
