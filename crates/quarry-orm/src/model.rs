//! Typed entities.

use quarry_core::{Entity, FromSqlValue};

use crate::error::{OrmError, Result};
use crate::record::Record;

/// A Rust type persisted as one entity.
///
/// Usually derived with `#[derive(Model)]`, which also generates a typed
/// `find_by_<field>` lookup per field.
pub trait Model: Sized {
    /// Entity metadata: table, primary key and columns.
    fn entity() -> Entity;

    /// Builds a value from a result row.
    fn from_record(record: &Record) -> Result<Self>;

    /// Converts the value into column/value pairs.
    fn to_record(&self) -> Record;
}

/// Reads a required column out of a record.
pub fn field<T: FromSqlValue>(record: &Record, column: &str) -> Result<T> {
    let value = record
        .get(column)
        .ok_or_else(|| OrmError::Record(format!("missing column `{column}`")))?;
    T::from_sql_value(value).ok_or_else(|| {
        OrmError::Record(format!(
            "column `{column}` holds {}, which does not convert to {}",
            value.type_name(),
            std::any::type_name::<T>()
        ))
    })
}
