//! # quarry-orm
//!
//! Executes compiled filters over a [`Connection`] and assembles the
//! results.
//!
//! This crate provides:
//! - [`Record`] rows with eager-loaded associations attached
//! - the [`Connection`] trait that drivers implement
//! - [`TransactionManager`] for savepoint-based nested transactions
//! - [`BulkExecutor`] for all-or-nothing batches
//! - [`resolve_associations`] for eager loading
//! - [`Repository`] and the [`Model`] trait (derivable)
//!
//! ## Quick Start
//!
//! ```ignore
//! use quarry_orm::{FilterSpec, Condition, Repository, Schema, TransactionManager};
//!
//! let mut session = TransactionManager::new(conn);
//! let schema = Schema::from_json(&std::fs::read_to_string("schema.json")?)?;
//!
//! let mut owners = Repository::new(&mut session, &schema, "Owner")?;
//! let spec = FilterSpec::from_json(r#"{
//!     "where": [{"column": "city", "value": "Oslo"}],
//!     "with": [{"column": "id", "foreignColumn": "ownerId",
//!               "class": "Pet", "property": "pets", "isUnique": false}]
//! }"#)?;
//! for owner in owners.find(&spec)? {
//!     println!("{} has {} pets", owner.get_as::<String>("name").unwrap_or_default(),
//!              owner.many("pets").len());
//! }
//! ```
//!
//! ## Transactions
//!
//! ```ignore
//! session.transaction(|tm| {
//!     let mut pets = Repository::new(tm, &schema, "Pet")?;
//!     pets.insert(&[("name".into(), "Rex".to_sql_value())])?;
//!     pets.delete(3)?;
//!     Ok(())
//! })?;
//! ```

mod bulk;
mod connection;
mod eager;
mod error;
mod model;
mod record;
mod repository;
#[cfg(test)]
mod testing;
mod transaction;

pub use bulk::{BulkExecutor, BulkOutcome};
pub use connection::{Connection, ConnectionError, Outcome};
pub use eager::resolve_associations;
pub use error::{OrmError, Result};
pub use model::{field, Model};
pub use record::{Record, Related};
pub use repository::{QueryResult, Repository};
pub use transaction::{TransactionError, TransactionManager};

pub use quarry_derive::Model;

// Re-export commonly used types from quarry-core
pub use quarry_core::{
    AssociationSpec, BoolOp, BulkStatement, CompiledStatement, Condition, ConditionTree,
    Direction, Entity, FilterError, FilterSpec, FromSqlValue, JoinKey, Limit, Operand, Operator,
    OrderBy, OrderSpec, Params, Schema, SqlValue, StatementKind, ToSqlValue, Where,
};
