//! Declarative filter model.
//!
//! Filters can be built in code or decoded from JSON using the camelCase
//! keys `select`, `where`, `whereOr`, `orderBy`, `limit`, `isUnique`,
//! `isDistinct`, `onlyCount`, `onlyValues`, `database`,
//! `fractionalTimestamps` and `with`.

mod condition;
mod spec;

pub use condition::{BoolOp, Condition, ConditionTree, Operand, Operator, Where};
pub use spec::{AssociationSpec, Direction, FilterSpec, JoinKey, Limit, OrderBy, OrderSpec};
