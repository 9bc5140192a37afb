//! Error types for the ORM layer.

use quarry_core::FilterError;
use thiserror::Error;

use crate::connection::ConnectionError;
use crate::transaction::TransactionError;

/// ORM-level errors.
#[derive(Debug, Error)]
pub enum OrmError {
    /// A filter or statement failed to compile. Nothing was sent.
    #[error("compile error: {0}")]
    Compile(#[from] FilterError),

    /// The connection rejected or failed a statement.
    #[error("execution error: {0}")]
    Execution(#[from] ConnectionError),

    /// One row of a bulk batch failed; the whole batch was rolled back.
    #[error("bulk execution failed at row {row}: {source}")]
    Bulk {
        /// Zero-based index of the failing row.
        row: usize,
        /// Underlying failure.
        #[source]
        source: ConnectionError,
    },

    /// Begin, commit or rollback failed, or was called at depth 0.
    #[error("transaction error: {0}")]
    Transaction(#[from] TransactionError),

    /// An association would overwrite a field of the primary entity.
    #[error("property `{property}` collides with a field of {entity}")]
    Collision {
        /// Primary entity name.
        entity: String,
        /// Target property of the association.
        property: String,
    },

    /// A record could not be converted into a typed model.
    #[error("record error: {0}")]
    Record(String),
}

/// Result type alias for ORM operations.
pub type Result<T> = std::result::Result<T, OrmError>;
