//! Error types for filter compilation.

use thiserror::Error;

/// Errors raised while turning a filter description into statement text.
///
/// Every variant is produced before a statement reaches a connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    /// A table, schema or column name failed the identifier check.
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    /// A column is not declared on the entity.
    #[error("column `{column}` does not exist in {entity}")]
    UnknownColumn {
        /// Entity the column was looked up on.
        entity: String,
        /// The offending column.
        column: String,
    },

    /// No entity with this name is registered.
    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    /// The entity's primary key is not one of its columns.
    #[error("primary key `{primary_key}` is not a column of {entity}")]
    MissingPrimaryKey {
        /// Entity name.
        entity: String,
        /// Declared primary key.
        primary_key: String,
    },

    /// An operator token is not one of the supported comparisons.
    #[error("invalid operator: {0:?}")]
    InvalidOperator(String),

    /// A boolean node uses something other than AND/OR.
    #[error("invalid boolean operator: {0:?}")]
    InvalidBooleanOperator(String),

    /// An ORDER BY direction is not ASC/DESC.
    #[error("invalid order direction: {0:?}")]
    InvalidDirection(String),

    /// BETWEEN / NOT BETWEEN without exactly two values.
    #[error("{operator} on `{column}` expects exactly two values")]
    MalformedBetween {
        /// Condition column.
        column: String,
        /// Operator token.
        operator: &'static str,
    },

    /// IN / NOT IN with an empty list.
    #[error("{operator} on `{column}` expects a non-empty list")]
    EmptyInList {
        /// Condition column.
        column: String,
        /// Operator token.
        operator: &'static str,
    },

    /// IN / NOT IN given a single value instead of a list.
    #[error("{operator} on `{column}` expects a list of values")]
    ListExpected {
        /// Condition column.
        column: String,
        /// Operator token.
        operator: &'static str,
    },

    /// A comparison operator given a list instead of a single value.
    #[error("{operator} on `{column}` expects a single value")]
    ScalarExpected {
        /// Condition column.
        column: String,
        /// Operator token.
        operator: &'static str,
    },

    /// A boolean node with no operands.
    #[error("{0} node has no operands")]
    EmptyNode(&'static str),

    /// Two placeholders would share a name.
    #[error("duplicate parameter :{0}")]
    DuplicateParameter(String),

    /// A write statement was given nothing to write.
    #[error("{0} requires at least one value")]
    EmptyOperands(&'static str),

    /// A bulk row does not carry the same columns as the first row.
    #[error("row {row} has a different column set than the first row")]
    MismatchedColumns {
        /// Zero-based index of the offending row.
        row: usize,
    },

    /// Statement text does not start with SELECT/INSERT/UPDATE/DELETE.
    #[error("unsupported statement kind: {0:?}")]
    UnknownStatementKind(String),

    /// The filter description could not be decoded.
    #[error("malformed filter: {0}")]
    Malformed(String),
}

/// Result type alias for filter compilation.
pub type Result<T> = std::result::Result<T, FilterError>;
