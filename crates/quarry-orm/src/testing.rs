//! Scripted connection for unit tests.

use std::collections::VecDeque;

use quarry_core::{Params, StatementKind};

use crate::connection::{Connection, ConnectionError, Outcome};
use crate::record::Record;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Begin,
    Commit,
    Rollback,
    Raw(String),
    Execute {
        sql: String,
        params: Params,
        kind: StatementKind,
    },
}

/// Records every call. Statements answer from a queue of scripted
/// responses, falling back to an empty result of the right shape.
#[derive(Debug, Default)]
pub struct MockConnection {
    calls: Vec<Call>,
    responses: VecDeque<Result<Outcome, String>>,
    failing_raw: Vec<&'static str>,
    next_id: u64,
}

impl MockConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn executed(&self) -> Vec<(&str, &Params)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Execute { sql, params, .. } => Some((sql.as_str(), params)),
                _ => None,
            })
            .collect()
    }

    pub fn push_rows(&mut self, rows: Vec<Record>) -> &mut Self {
        self.responses.push_back(Ok(Outcome::Rows(rows)));
        self
    }

    pub fn push_outcome(&mut self, outcome: Outcome) -> &mut Self {
        self.responses.push_back(Ok(outcome));
        self
    }

    pub fn push_failure(&mut self, message: &str) -> &mut Self {
        self.responses.push_back(Err(message.to_owned()));
        self
    }

    /// Raw statements starting with `prefix` fail.
    pub fn fail_raw(&mut self, prefix: &'static str) -> &mut Self {
        self.failing_raw.push(prefix);
        self
    }

    fn default_outcome(&mut self, kind: StatementKind) -> Outcome {
        match kind {
            StatementKind::Select => Outcome::Rows(Vec::new()),
            StatementKind::Insert => {
                self.next_id += 1;
                Outcome::InsertId(self.next_id)
            }
            StatementKind::Update | StatementKind::Delete => Outcome::Affected(1),
        }
    }
}

impl Connection for MockConnection {
    fn execute(
        &mut self,
        sql: &str,
        params: &Params,
        kind: StatementKind,
    ) -> Result<Outcome, ConnectionError> {
        self.calls.push(Call::Execute {
            sql: sql.to_owned(),
            params: params.clone(),
            kind,
        });
        match self.responses.pop_front() {
            Some(Ok(outcome)) => Ok(outcome),
            Some(Err(message)) => Err(ConnectionError::Rejected(message)),
            None => Ok(self.default_outcome(kind)),
        }
    }

    fn exec_raw(&mut self, sql: &str) -> Result<u64, ConnectionError> {
        self.calls.push(Call::Raw(sql.to_owned()));
        if self.failing_raw.iter().any(|p| sql.starts_with(p)) {
            return Err(ConnectionError::Rejected(sql.to_owned()));
        }
        Ok(0)
    }

    fn begin_real(&mut self) -> Result<(), ConnectionError> {
        self.calls.push(Call::Begin);
        Ok(())
    }

    fn commit_real(&mut self) -> Result<(), ConnectionError> {
        self.calls.push(Call::Commit);
        Ok(())
    }

    fn rollback_real(&mut self) -> Result<(), ConnectionError> {
        self.calls.push(Call::Rollback);
        Ok(())
    }
}
