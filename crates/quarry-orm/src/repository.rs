//! Filter-driven access to one entity.

use quarry_core::{
    build_delete, build_insert, build_insert_many, build_select, build_update, projected_columns,
    Condition, Entity, FilterSpec, Schema, SqlValue, ToSqlValue, COUNT_ALIAS,
};
use tracing::debug;

use crate::bulk::{BulkExecutor, BulkOutcome};
use crate::connection::Connection;
use crate::eager::resolve_associations;
use crate::error::{OrmError, Result};
use crate::model::Model;
use crate::record::Record;
use crate::transaction::TransactionManager;

/// Result of [`Repository::query`], shaped by the filter flags.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// Every matching record.
    Records(Vec<Record>),
    /// `unique`: the first matching record.
    One(Option<Record>),
    /// `values_only`: the single projected column of every row.
    Values(Vec<SqlValue>),
    /// `values_only` and `unique`: the single projected column of the
    /// first row.
    Value(Option<SqlValue>),
    /// `count_only`: number of matching rows.
    Count(u64),
}

/// Runs the SELECT for `spec` and eager-loads its associations.
pub(crate) fn fetch_records<C: Connection>(
    session: &mut TransactionManager<C>,
    schema: &Schema,
    entity: &Entity,
    spec: &FilterSpec,
) -> Result<Vec<Record>> {
    let stmt = build_select(spec, entity)?;
    let mut rows = session.execute(&stmt)?.into_rows()?;
    debug!(entity = %entity.name, rows = rows.len(), "Fetched rows");

    if !spec.associations.is_empty() && !rows.is_empty() {
        resolve_associations(session, schema, entity, &mut rows, &spec.associations)?;
    }
    Ok(rows)
}

/// Reads and writes one entity through a transaction manager.
///
/// The repository borrows the session, so every statement it issues runs
/// inside whatever transaction the caller has open.
#[derive(Debug)]
pub struct Repository<'a, C> {
    session: &'a mut TransactionManager<C>,
    schema: &'a Schema,
    entity: &'a Entity,
}

impl<'a, C: Connection> Repository<'a, C> {
    /// Creates a repository for the entity registered under `name`.
    pub fn new(
        session: &'a mut TransactionManager<C>,
        schema: &'a Schema,
        name: &str,
    ) -> Result<Self> {
        let entity = schema.get(name)?;
        Ok(Self::for_entity(session, schema, entity))
    }

    /// Creates a repository for an entity; `schema` resolves association
    /// targets.
    pub fn for_entity(
        session: &'a mut TransactionManager<C>,
        schema: &'a Schema,
        entity: &'a Entity,
    ) -> Self {
        Self {
            session,
            schema,
            entity,
        }
    }

    /// The entity this repository reads.
    #[must_use]
    pub const fn entity(&self) -> &Entity {
        self.entity
    }

    /// The underlying session.
    pub fn session(&mut self) -> &mut TransactionManager<C> {
        self.session
    }

    /// Runs a filter and shapes the result by its flags.
    pub fn query(&mut self, spec: &FilterSpec) -> Result<QueryResult> {
        if spec.count_only {
            return self.count(spec).map(QueryResult::Count);
        }

        let values_column = if spec.values_only {
            match projected_columns(spec, self.entity)?.as_slice() {
                [only] => Some(only.clone()),
                _ => None,
            }
        } else {
            None
        };

        let rows = fetch_records(self.session, self.schema, self.entity, spec)?;

        Ok(match (values_column, spec.unique) {
            (Some(column), true) => {
                QueryResult::Value(rows.first().and_then(|r| r.get(&column)).cloned())
            }
            (Some(column), false) => QueryResult::Values(
                rows.iter()
                    .map(|r| r.get(&column).cloned().unwrap_or(SqlValue::Null))
                    .collect(),
            ),
            (None, true) => QueryResult::One(rows.into_iter().next()),
            (None, false) => QueryResult::Records(rows),
        })
    }

    /// Every record matching `spec`.
    pub fn find(&mut self, spec: &FilterSpec) -> Result<Vec<Record>> {
        fetch_records(self.session, self.schema, self.entity, spec)
    }

    /// The first record matching `spec`.
    pub fn find_one(&mut self, spec: &FilterSpec) -> Result<Option<Record>> {
        let spec = spec.clone().unique();
        Ok(fetch_records(self.session, self.schema, self.entity, &spec)?
            .into_iter()
            .next())
    }

    /// Number of records matching `spec`; 0 when the count column is
    /// missing.
    pub fn count(&mut self, spec: &FilterSpec) -> Result<u64> {
        let mut spec = spec.clone();
        spec.count_only = true;
        spec.associations.clear();

        let stmt = build_select(&spec, self.entity)?;
        let rows = self.session.execute(&stmt)?.into_rows()?;
        Ok(rows
            .first()
            .and_then(|r| r.get_as::<u64>(COUNT_ALIAS))
            .unwrap_or(0))
    }

    /// Values of `column` over every record matching `spec`.
    pub fn values(&mut self, column: &str, spec: &FilterSpec) -> Result<Vec<SqlValue>> {
        let mut spec = spec.clone().select([column]).values_only();
        spec.unique = false;
        spec.associations.clear();

        match self.query(&spec)? {
            QueryResult::Values(values) => Ok(values),
            _ => Ok(Vec::new()),
        }
    }

    /// Records whose `column` equals `value`, refined by `spec`. Looking up
    /// the primary key returns at most one record.
    pub fn find_by(
        &mut self,
        column: &str,
        value: impl ToSqlValue,
        spec: FilterSpec,
    ) -> Result<Vec<Record>> {
        self.entity.require_column(column)?;
        let mut spec = spec.filter(Condition::eq(column, value));
        if column == self.entity.primary_key {
            spec = spec.unique();
        }
        fetch_records(self.session, self.schema, self.entity, &spec)
    }

    /// The record with primary key `key`.
    pub fn get(&mut self, key: impl ToSqlValue) -> Result<Option<Record>> {
        let pk = self.entity.primary_key.clone();
        Ok(self.find_by(&pk, key, FilterSpec::new())?.into_iter().next())
    }

    /// One column of the record with primary key `key`.
    pub fn fetch_field(&mut self, key: impl ToSqlValue, column: &str) -> Result<Option<SqlValue>> {
        let spec = FilterSpec::new()
            .select([column])
            .values_only()
            .unique()
            .filter(Condition::eq(&self.entity.primary_key, key));

        match self.query(&spec)? {
            QueryResult::Value(value) => Ok(value),
            _ => Ok(None),
        }
    }

    /// Inserts one row and returns it as stored.
    ///
    /// The row is looked up again by its primary key: the supplied value
    /// when the row carries one, otherwise the generated id.
    pub fn insert(&mut self, row: &[(String, SqlValue)]) -> Result<Option<Record>> {
        let stmt = build_insert(self.entity, row)?;
        let insert_id = self.session.execute(&stmt)?.into_insert_id()?;

        let key = row
            .iter()
            .find(|(column, value)| *column == self.entity.primary_key && !value.is_null())
            .map_or_else(|| insert_id.to_sql_value(), |(_, value)| value.clone());
        self.get(key)
    }

    /// Inserts every row or none, returning the generated ids in order.
    pub fn insert_many(&mut self, rows: &[Vec<(String, SqlValue)>]) -> Result<Vec<u64>> {
        let stmt = build_insert_many(self.entity, rows.iter().map(Vec::as_slice))?;
        match BulkExecutor::new(self.session).execute_all(&stmt)? {
            BulkOutcome::InsertIds(ids) => Ok(ids),
            other => Err(OrmError::Record(format!(
                "bulk insert produced {} non-id outcomes",
                other.len()
            ))),
        }
    }

    /// Updates the record with primary key `key`; returns the affected count.
    pub fn update(&mut self, key: impl ToSqlValue, changes: &[(String, SqlValue)]) -> Result<u64> {
        let stmt = build_update(self.entity, &key.to_sql_value(), changes)?;
        Ok(self.session.execute(&stmt)?.into_affected()?)
    }

    /// Deletes the record with primary key `key`; returns the affected count.
    pub fn delete(&mut self, key: impl ToSqlValue) -> Result<u64> {
        let stmt = build_delete(self.entity, &key.to_sql_value())?;
        Ok(self.session.execute(&stmt)?.into_affected()?)
    }

    /// Every record matching `spec`, converted to `M`.
    pub fn find_models<M: Model>(&mut self, spec: &FilterSpec) -> Result<Vec<M>> {
        self.find(spec)?.iter().map(M::from_record).collect()
    }
}

#[cfg(test)]
mod tests {
    use quarry_core::{Params, StatementKind};

    use super::*;
    use crate::connection::Outcome;
    use crate::testing::{Call, MockConnection};

    fn schema() -> Schema {
        Schema::from_entities([
            Entity::new("Owner", "owners", "id").with_columns(["name", "city"])
        ])
        .unwrap()
    }

    fn params(pairs: &[(&str, SqlValue)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (*k, v.clone()))
            .collect()
    }

    #[test]
    fn test_query_shapes() {
        let schema = schema();
        let mut conn = MockConnection::new();
        conn.push_rows(vec![Record::new().with("totalRowCount", 4_i64)])
            .push_rows(vec![
                Record::new().with("name", "Ann"),
                Record::new().with("name", "Bob"),
            ])
            .push_rows(vec![Record::new().with("id", 1_i64).with("name", "Ann")]);
        let mut tm = TransactionManager::new(conn);
        let mut repo = Repository::new(&mut tm, &schema, "Owner").unwrap();

        assert_eq!(
            repo.query(&FilterSpec::new().count_only()).unwrap(),
            QueryResult::Count(4)
        );
        assert_eq!(
            repo.query(&FilterSpec::new().select(["name"]).values_only())
                .unwrap(),
            QueryResult::Values(vec![SqlValue::Text("Ann".into()), SqlValue::Text("Bob".into())])
        );
        assert!(matches!(
            repo.query(&FilterSpec::new().unique()).unwrap(),
            QueryResult::One(Some(_))
        ));
    }

    #[test]
    fn test_values_only_ignored_with_several_columns() {
        let schema = schema();
        let mut tm = TransactionManager::new(MockConnection::new());
        let mut repo = Repository::new(&mut tm, &schema, "Owner").unwrap();
        let spec = FilterSpec::new().select(["id", "name"]).values_only();
        assert_eq!(repo.query(&spec).unwrap(), QueryResult::Records(vec![]));
    }

    #[test]
    fn test_count_defaults_to_zero() {
        let schema = schema();
        let mut tm = TransactionManager::new(MockConnection::new());
        let mut repo = Repository::new(&mut tm, &schema, "Owner").unwrap();
        assert_eq!(repo.count(&FilterSpec::new()).unwrap(), 0);
    }

    #[test]
    fn test_find_by_primary_key_is_unique() {
        let schema = schema();
        let mut tm = TransactionManager::new(MockConnection::new());
        let mut repo = Repository::new(&mut tm, &schema, "Owner").unwrap();
        repo.find_by("id", 3_i64, FilterSpec::new()).unwrap();
        repo.find_by("city", "Oslo", FilterSpec::new()).unwrap();

        let executed = tm.get_ref().executed();
        assert_eq!(
            executed[0].0,
            "SELECT `owners`.* FROM `owners` WHERE (`owners`.`id` = :id_0) LIMIT 1"
        );
        assert_eq!(
            executed[1].0,
            "SELECT `owners`.* FROM `owners` WHERE (`owners`.`city` = :city_0)"
        );
    }

    #[test]
    fn test_find_by_unknown_column() {
        let schema = schema();
        let mut tm = TransactionManager::new(MockConnection::new());
        let mut repo = Repository::new(&mut tm, &schema, "Owner").unwrap();
        assert!(matches!(
            repo.find_by("salary", 1_i64, FilterSpec::new()),
            Err(OrmError::Compile(_))
        ));
        assert!(tm.get_ref().calls().is_empty());
    }

    #[test]
    fn test_fetch_field() {
        let schema = schema();
        let mut conn = MockConnection::new();
        conn.push_rows(vec![Record::new().with("city", "Oslo")]);
        let mut tm = TransactionManager::new(conn);
        let mut repo = Repository::new(&mut tm, &schema, "Owner").unwrap();

        assert_eq!(
            repo.fetch_field(1_i64, "city").unwrap(),
            Some(SqlValue::Text("Oslo".into()))
        );
        assert_eq!(
            tm.get_ref().executed()[0].0,
            "SELECT `owners`.`city` FROM `owners` WHERE (`owners`.`id` = :id_0) LIMIT 1"
        );
    }

    #[test]
    fn test_insert_refetches_by_insert_id() {
        let schema = schema();
        let mut conn = MockConnection::new();
        conn.push_outcome(Outcome::InsertId(12)).push_rows(vec![Record::new()
            .with("id", 12_i64)
            .with("name", "Ann")]);
        let mut tm = TransactionManager::new(conn);
        let mut repo = Repository::new(&mut tm, &schema, "Owner").unwrap();

        let row = vec![("name".to_owned(), SqlValue::Text("Ann".into()))];
        let stored = repo.insert(&row).unwrap().unwrap();
        assert_eq!(stored.get_as::<i64>("id"), Some(12));

        let executed = tm.get_ref().executed();
        assert_eq!(executed[0].0, "INSERT INTO `owners` (`name`) VALUES (:name_0)");
        assert_eq!(executed[1].1, &params(&[("id_0", SqlValue::Int(12))]));
    }

    #[test]
    fn test_insert_many_is_one_transaction() {
        let schema = schema();
        let mut tm = TransactionManager::new(MockConnection::new());
        let mut repo = Repository::new(&mut tm, &schema, "Owner").unwrap();

        let rows = vec![
            vec![("name".to_owned(), SqlValue::Text("Ann".into()))],
            vec![("name".to_owned(), SqlValue::Text("Bob".into()))],
        ];
        assert_eq!(repo.insert_many(&rows).unwrap(), vec![1, 2]);
        assert_eq!(
            tm.get_ref().calls().iter().filter(|c| **c == Call::Commit).count(),
            1
        );
    }

    #[test]
    fn test_update_and_delete() {
        let schema = schema();
        let mut conn = MockConnection::new();
        conn.push_outcome(Outcome::Affected(1))
            .push_outcome(Outcome::Affected(0));
        let mut tm = TransactionManager::new(conn);
        let mut repo = Repository::new(&mut tm, &schema, "Owner").unwrap();

        let changes = vec![("city".to_owned(), SqlValue::Text("Bergen".into()))];
        assert_eq!(repo.update(1_i64, &changes).unwrap(), 1);
        assert_eq!(repo.delete(99_i64).unwrap(), 0);

        let calls = tm.get_ref().calls();
        assert!(matches!(
            &calls[0],
            Call::Execute { kind: StatementKind::Update, .. }
        ));
        assert!(matches!(
            &calls[1],
            Call::Execute { kind: StatementKind::Delete, .. }
        ));
    }

    #[test]
    fn test_unknown_entity() {
        let schema = schema();
        let mut tm = TransactionManager::new(MockConnection::new());
        assert!(matches!(
            Repository::new(&mut tm, &schema, "Ghost"),
            Err(OrmError::Compile(_))
        ));
    }
}
