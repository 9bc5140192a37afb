//! The connection seam.
//!
//! A [`Connection`] runs one named-parameter statement at a time and knows
//! a single level of transaction. Nesting is layered on top by
//! [`TransactionManager`](crate::TransactionManager).

use std::error::Error as StdError;

use quarry_core::{Params, StatementKind};
use thiserror::Error;

use crate::record::Record;

/// What a statement produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Rows returned by a SELECT.
    Rows(Vec<Record>),
    /// Rows touched by an UPDATE or DELETE.
    Affected(u64),
    /// Identifier generated by an INSERT.
    InsertId(u64),
}

impl Outcome {
    /// Short name of the variant, used in error messages.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Rows(_) => "rows",
            Self::Affected(_) => "affected",
            Self::InsertId(_) => "insert id",
        }
    }

    /// Returns the rows, or an error naming what came back instead.
    pub fn into_rows(self) -> Result<Vec<Record>, ConnectionError> {
        match self {
            Self::Rows(rows) => Ok(rows),
            other => Err(ConnectionError::UnexpectedOutcome {
                expected: "rows",
                actual: other.name(),
            }),
        }
    }

    /// Returns the affected row count.
    pub fn into_affected(self) -> Result<u64, ConnectionError> {
        match self {
            Self::Affected(n) => Ok(n),
            other => Err(ConnectionError::UnexpectedOutcome {
                expected: "affected",
                actual: other.name(),
            }),
        }
    }

    /// Returns the insert id.
    pub fn into_insert_id(self) -> Result<u64, ConnectionError> {
        match self {
            Self::InsertId(id) => Ok(id),
            other => Err(ConnectionError::UnexpectedOutcome {
                expected: "insert id",
                actual: other.name(),
            }),
        }
    }
}

/// Errors raised by a connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The driver reported a failure.
    #[error("driver error: {0}")]
    Driver(#[source] Box<dyn StdError + Send + Sync>),

    /// A placeholder in the statement has no value.
    #[error("no value bound for placeholder :{0}")]
    MissingParameter(String),

    /// A value was supplied for a name that does not appear in the statement.
    #[error("parameter {0} does not appear in the statement")]
    UnusedParameter(String),

    /// The statement produced a different kind of outcome than expected.
    #[error("expected {expected} outcome, got {actual}")]
    UnexpectedOutcome {
        /// Outcome the caller asked for.
        expected: &'static str,
        /// Outcome the connection produced.
        actual: &'static str,
    },

    /// The statement ran but did not succeed.
    #[error("statement rejected: {0}")]
    Rejected(String),
}

impl ConnectionError {
    /// Wraps any driver error.
    pub fn driver<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Driver(Box::new(err))
    }
}

/// A database connection executing named-parameter statements.
///
/// Implementations must bind every `:name` placeholder from `params` and
/// report a kind-appropriate [`Outcome`]: rows for SELECT, the generated
/// identifier for INSERT, the affected count otherwise.
pub trait Connection {
    /// Executes one statement.
    fn execute(
        &mut self,
        sql: &str,
        params: &Params,
        kind: StatementKind,
    ) -> Result<Outcome, ConnectionError>;

    /// Executes statement text with no parameters and returns the affected
    /// row count.
    fn exec_raw(&mut self, sql: &str) -> Result<u64, ConnectionError>;

    /// Starts the single real transaction.
    fn begin_real(&mut self) -> Result<(), ConnectionError> {
        self.exec_raw("BEGIN").map(drop)
    }

    /// Commits the real transaction.
    fn commit_real(&mut self) -> Result<(), ConnectionError> {
        self.exec_raw("COMMIT").map(drop)
    }

    /// Rolls the real transaction back.
    fn rollback_real(&mut self) -> Result<(), ConnectionError> {
        self.exec_raw("ROLLBACK").map(drop)
    }
}

impl<C: Connection + ?Sized> Connection for &mut C {
    fn execute(
        &mut self,
        sql: &str,
        params: &Params,
        kind: StatementKind,
    ) -> Result<Outcome, ConnectionError> {
        (**self).execute(sql, params, kind)
    }

    fn exec_raw(&mut self, sql: &str) -> Result<u64, ConnectionError> {
        (**self).exec_raw(sql)
    }

    fn begin_real(&mut self) -> Result<(), ConnectionError> {
        (**self).begin_real()
    }

    fn commit_real(&mut self) -> Result<(), ConnectionError> {
        (**self).commit_real()
    }

    fn rollback_real(&mut self) -> Result<(), ConnectionError> {
        (**self).rollback_real()
    }
}
