//! All-or-nothing execution of one statement over many parameter sets.

use quarry_core::{BulkStatement, FilterError, StatementKind};
use tracing::{debug, warn};

use crate::connection::{Connection, ConnectionError, Outcome};
use crate::error::{OrmError, Result};
use crate::record::Record;
use crate::transaction::TransactionManager;

/// Per-row outcomes of a successful batch, in row order.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkOutcome {
    /// Generated identifiers of an INSERT batch.
    InsertIds(Vec<u64>),
    /// Affected row counts of an UPDATE or DELETE batch.
    Affected(Vec<u64>),
    /// Result sets of a SELECT batch.
    Rows(Vec<Vec<Record>>),
}

impl BulkOutcome {
    fn with_capacity(kind: StatementKind, capacity: usize) -> Self {
        match kind {
            StatementKind::Insert => Self::InsertIds(Vec::with_capacity(capacity)),
            StatementKind::Update | StatementKind::Delete => {
                Self::Affected(Vec::with_capacity(capacity))
            }
            StatementKind::Select => Self::Rows(Vec::with_capacity(capacity)),
        }
    }

    /// Appends one row's outcome. A mismatched outcome counts as a failed row.
    fn push(&mut self, outcome: Outcome) -> std::result::Result<(), ConnectionError> {
        match self {
            Self::InsertIds(ids) => ids.push(outcome.into_insert_id()?),
            Self::Affected(counts) => counts.push(outcome.into_affected()?),
            Self::Rows(sets) => sets.push(outcome.into_rows()?),
        }
        Ok(())
    }

    /// Number of rows executed.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::InsertIds(v) | Self::Affected(v) => v.len(),
            Self::Rows(v) => v.len(),
        }
    }

    /// Returns true for an empty batch.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Runs a [`BulkStatement`] inside one transaction level.
///
/// At depth 0 this is a real transaction; inside an open transaction the
/// batch becomes a savepoint, so a failing row undoes only the batch.
#[derive(Debug)]
pub struct BulkExecutor<'a, C> {
    session: &'a mut TransactionManager<C>,
}

impl<'a, C: Connection> BulkExecutor<'a, C> {
    /// Creates an executor over a transaction manager.
    pub fn new(session: &'a mut TransactionManager<C>) -> Self {
        Self { session }
    }

    /// Executes every row in order. Any failing row rolls the whole batch
    /// back and the error names the row.
    pub fn execute_all(&mut self, stmt: &BulkStatement) -> Result<BulkOutcome> {
        if stmt.rows.is_empty() {
            return Err(FilterError::EmptyOperands("bulk").into());
        }

        self.session.begin()?;
        debug!(sql = %stmt.sql, rows = stmt.rows.len(), "Executing bulk statement");

        let mut outcome = BulkOutcome::with_capacity(stmt.kind, stmt.rows.len());
        for (row, params) in stmt.rows.iter().enumerate() {
            let result = self
                .session
                .get_mut()
                .execute(&stmt.sql, params, stmt.kind)
                .and_then(|o| outcome.push(o));

            if let Err(source) = result {
                warn!(row, error = %source, "Bulk row failed, rolling back");
                if let Err(rollback_err) = self.session.rollback() {
                    warn!(error = %rollback_err, "Rollback failed");
                }
                return Err(OrmError::Bulk { row, source });
            }
        }

        if let Err(err) = self.session.commit() {
            warn!(error = %err, "Bulk commit failed, rolling back");
            if let Err(rollback_err) = self.session.rollback() {
                warn!(error = %rollback_err, "Rollback failed");
            }
            return Err(err.into());
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use quarry_core::{build_insert_many, Entity, SqlValue, ToSqlValue};

    use super::*;
    use crate::testing::{Call, MockConnection};

    fn pets() -> Entity {
        Entity::new("Pet", "pets", "id").with_columns(["ownerId", "name"])
    }

    fn rows() -> Vec<Vec<(String, SqlValue)>> {
        ["a", "b", "c"]
            .iter()
            .map(|name| {
                vec![
                    ("ownerId".to_owned(), 1_i64.to_sql_value()),
                    ("name".to_owned(), (*name).to_sql_value()),
                ]
            })
            .collect()
    }

    #[test]
    fn test_all_rows_commit_once() {
        let rows = rows();
        let stmt = build_insert_many(&pets(), rows.iter().map(Vec::as_slice)).unwrap();
        let mut tm = TransactionManager::new(MockConnection::new());

        let outcome = BulkExecutor::new(&mut tm).execute_all(&stmt).unwrap();
        assert_eq!(outcome, BulkOutcome::InsertIds(vec![1, 2, 3]));
        assert_eq!(tm.depth(), 0);

        let calls = tm.get_ref().calls();
        assert_eq!(calls.first(), Some(&Call::Begin));
        assert_eq!(calls.last(), Some(&Call::Commit));
        assert_eq!(tm.get_ref().executed().len(), 3);
    }

    #[test]
    fn test_failing_row_rolls_back_everything() {
        let rows = rows();
        let stmt = build_insert_many(&pets(), rows.iter().map(Vec::as_slice)).unwrap();
        let mut conn = MockConnection::new();
        conn.push_outcome(Outcome::InsertId(1))
            .push_failure("constraint failed");
        let mut tm = TransactionManager::new(conn);

        let err = BulkExecutor::new(&mut tm).execute_all(&stmt).unwrap_err();
        assert!(matches!(err, OrmError::Bulk { row: 1, .. }));
        assert_eq!(tm.depth(), 0);

        let calls = tm.get_ref().calls();
        assert_eq!(calls.last(), Some(&Call::Rollback));
        assert!(!calls.contains(&Call::Commit));
        assert_eq!(tm.get_ref().executed().len(), 2);
    }

    #[test]
    fn test_unexpected_outcome_is_failure() {
        let rows = rows();
        let stmt = build_insert_many(&pets(), rows.iter().map(Vec::as_slice)).unwrap();
        let mut conn = MockConnection::new();
        conn.push_outcome(Outcome::Affected(0));
        let mut tm = TransactionManager::new(conn);

        let err = BulkExecutor::new(&mut tm).execute_all(&stmt).unwrap_err();
        assert!(matches!(
            err,
            OrmError::Bulk {
                row: 0,
                source: ConnectionError::UnexpectedOutcome { .. }
            }
        ));
    }

    #[test]
    fn test_nested_batch_uses_savepoint() {
        let rows = rows();
        let stmt = build_insert_many(&pets(), rows.iter().map(Vec::as_slice)).unwrap();
        let mut conn = MockConnection::new();
        conn.push_failure("boom");
        let mut tm = TransactionManager::new(conn);
        tm.begin().unwrap();

        assert!(BulkExecutor::new(&mut tm).execute_all(&stmt).is_err());
        assert_eq!(tm.depth(), 1);
        assert!(tm
            .get_ref()
            .calls()
            .contains(&Call::Raw("ROLLBACK TO trans2".into())));
    }

    #[test]
    fn test_empty_batch() {
        let stmt = BulkStatement {
            sql: "DELETE FROM `pets` WHERE `id` = :id_0".into(),
            kind: StatementKind::Delete,
            rows: Vec::new(),
        };
        let mut tm = TransactionManager::new(MockConnection::new());
        assert!(matches!(
            BulkExecutor::new(&mut tm).execute_all(&stmt),
            Err(OrmError::Compile(FilterError::EmptyOperands(_)))
        ));
        assert!(tm.get_ref().calls().is_empty());
    }
}
