//! Nested transactions over a single-level connection.
//!
//! Depth 0 is no transaction, depth 1 the real transaction, deeper levels
//! are savepoints named `trans{depth}`. Committing above depth 1 only
//! updates the counter; the savepoint is left for the outer commit or
//! rollback to resolve.

use quarry_core::{CompiledStatement, Params, StatementKind};
use thiserror::Error;
use tracing::{debug, warn};

use crate::connection::{Connection, ConnectionError, Outcome};
use crate::error::{OrmError, Result};

/// Errors raised by begin, commit and rollback.
#[derive(Debug, Error)]
pub enum TransactionError {
    /// Commit or rollback with no open transaction.
    #[error("cannot {0}: no transaction is active")]
    NotActive(&'static str),

    /// The connection failed to apply the transition.
    #[error("{action} failed at depth {depth}: {source}")]
    Failed {
        /// `begin`, `commit` or `rollback`.
        action: &'static str,
        /// Depth before the transition.
        depth: u32,
        /// Underlying failure.
        #[source]
        source: ConnectionError,
    },
}

/// Name of the savepoint that opens level `depth`.
fn savepoint_name(depth: u32) -> String {
    format!("trans{depth}")
}

/// Owns a connection and its transaction depth.
///
/// Every statement and transition goes through `&mut self`, so the depth
/// cannot drift from the connection's actual state through this type.
#[derive(Debug)]
pub struct TransactionManager<C> {
    conn: C,
    depth: u32,
}

impl<C: Connection> TransactionManager<C> {
    /// Wraps a connection that has no open transaction.
    pub const fn new(conn: C) -> Self {
        Self { conn, depth: 0 }
    }

    /// Current nesting depth.
    #[must_use]
    pub const fn depth(&self) -> u32 {
        self.depth
    }

    /// Returns true when a transaction is open.
    #[must_use]
    pub const fn in_transaction(&self) -> bool {
        self.depth > 0
    }

    /// Borrows the connection.
    pub const fn get_ref(&self) -> &C {
        &self.conn
    }

    /// Mutably borrows the connection.
    ///
    /// Statements run through this reference are not tracked; issuing
    /// transaction control here desynchronizes the depth counter.
    pub fn get_mut(&mut self) -> &mut C {
        &mut self.conn
    }

    /// Returns the connection.
    pub fn into_inner(self) -> C {
        self.conn
    }

    /// Opens the real transaction or a savepoint.
    pub fn begin(&mut self) -> std::result::Result<(), TransactionError> {
        let depth = self.depth;
        let result = if depth == 0 {
            self.conn.begin_real()
        } else {
            self.conn
                .exec_raw(&format!("SAVEPOINT {}", savepoint_name(depth + 1)))
                .map(drop)
        };
        result.map_err(|source| TransactionError::Failed {
            action: "begin",
            depth,
            source,
        })?;
        self.depth += 1;
        debug!(depth = self.depth, "Transaction begun");
        Ok(())
    }

    /// Commits the real transaction at depth 1; deeper levels only
    /// decrement the depth.
    pub fn commit(&mut self) -> std::result::Result<(), TransactionError> {
        match self.depth {
            0 => Err(TransactionError::NotActive("commit")),
            1 => {
                self.conn
                    .commit_real()
                    .map_err(|source| TransactionError::Failed {
                        action: "commit",
                        depth: 1,
                        source,
                    })?;
                self.depth = 0;
                debug!(depth = 0, "Transaction committed");
                Ok(())
            }
            _ => {
                self.depth -= 1;
                debug!(depth = self.depth, "Nested commit");
                Ok(())
            }
        }
    }

    /// Rolls back the current level.
    ///
    /// The depth is decremented even when the connection reports a failure.
    pub fn rollback(&mut self) -> std::result::Result<(), TransactionError> {
        let depth = self.depth;
        let result = match depth {
            0 => return Err(TransactionError::NotActive("rollback")),
            1 => self.conn.rollback_real(),
            _ => self
                .conn
                .exec_raw(&format!("ROLLBACK TO {}", savepoint_name(depth)))
                .map(drop),
        };
        self.depth -= 1;
        debug!(depth = self.depth, "Transaction rolled back");
        result.map_err(|source| TransactionError::Failed {
            action: "rollback",
            depth,
            source,
        })
    }

    /// Runs `f` inside one level: commits on `Ok`, rolls back on `Err`.
    pub fn transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        self.begin()?;
        match f(self) {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(err) => {
                warn!(depth = self.depth, error = %err, "Rolling back after failure");
                if let Err(rollback_err) = self.rollback() {
                    warn!(error = %rollback_err, "Rollback failed");
                }
                Err(err)
            }
        }
    }

    /// Executes a compiled statement on the wrapped connection.
    pub fn execute(&mut self, stmt: &CompiledStatement) -> Result<Outcome> {
        debug!(sql = %stmt.sql, params = stmt.params.len(), "Executing statement");
        self.conn
            .execute(&stmt.sql, &stmt.params, stmt.kind)
            .map_err(OrmError::from)
    }

    /// Executes statement text, inferring its kind from the first keyword
    /// when `kind` is `None`.
    pub fn execute_sql(
        &mut self,
        sql: &str,
        params: &Params,
        kind: Option<StatementKind>,
    ) -> Result<Outcome> {
        let kind = match kind {
            Some(kind) => kind,
            None => StatementKind::infer(sql)?,
        };
        debug!(sql = %sql, kind = %kind, "Executing statement");
        self.conn
            .execute(sql, params, kind)
            .map_err(OrmError::from)
    }
}
