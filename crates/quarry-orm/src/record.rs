//! Result rows and the associated records attached to them.

use std::collections::BTreeMap;

use quarry_core::{FromSqlValue, SqlValue, ToSqlValue};
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Records attached to a row under an association property.
#[derive(Debug, Clone, PartialEq)]
pub enum Related {
    /// One-to-one; `None` is the explicit empty marker.
    One(Option<Box<Record>>),
    /// One-to-many; empty when nothing matched.
    Many(Vec<Record>),
}

impl Related {
    /// The empty marker for a given cardinality.
    #[must_use]
    pub const fn empty(unique: bool) -> Self {
        if unique {
            Self::One(None)
        } else {
            Self::Many(Vec::new())
        }
    }

    /// Returns true when nothing is attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::One(one) => one.is_none(),
            Self::Many(many) => many.is_empty(),
        }
    }
}

/// One result row: ordered column values plus attached associations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, SqlValue)>,
    relations: BTreeMap<String, Related>,
}

impl Record {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field, builder style.
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl ToSqlValue) -> Self {
        self.set(column, value);
        self
    }

    /// Sets a field, replacing any previous value.
    pub fn set(&mut self, column: impl Into<String>, value: impl ToSqlValue) {
        let column = column.into();
        let value = value.to_sql_value();
        match self.fields.iter_mut().find(|(c, _)| *c == column) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((column, value)),
        }
    }

    /// Returns a field value.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.fields
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v)
    }

    /// Returns a field converted to `T`; `None` if absent or of another type.
    #[must_use]
    pub fn get_as<T: FromSqlValue>(&self, column: &str) -> Option<T> {
        self.get(column).and_then(T::from_sql_value)
    }

    /// Fields in column order.
    #[must_use]
    pub fn fields(&self) -> &[(String, SqlValue)] {
        &self.fields
    }

    /// Consumes the record, returning its fields.
    #[must_use]
    pub fn into_fields(self) -> Vec<(String, SqlValue)> {
        self.fields
    }

    /// Returns true when the name is a field or an attached property.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some() || self.relations.contains_key(name)
    }

    /// Returns an attached association.
    #[must_use]
    pub fn relation(&self, property: &str) -> Option<&Related> {
        self.relations.get(property)
    }

    /// Attaches an association.
    pub fn set_relation(&mut self, property: impl Into<String>, related: Related) {
        self.relations.insert(property.into(), related);
    }

    /// The one-to-one record under `property`, if any.
    #[must_use]
    pub fn one(&self, property: &str) -> Option<&Self> {
        match self.relations.get(property)? {
            Related::One(one) => one.as_deref(),
            Related::Many(_) => None,
        }
    }

    /// The one-to-many records under `property`; empty when absent.
    #[must_use]
    pub fn many(&self, property: &str) -> &[Self] {
        match self.relations.get(property) {
            Some(Related::Many(many)) => many,
            _ => &[],
        }
    }
}

impl FromIterator<(String, SqlValue)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, SqlValue)>>(iter: I) -> Self {
        let mut record = Self::new();
        for (column, value) in iter {
            record.set(column, value);
        }
        record
    }
}

impl Serialize for Related {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::One(one) => one.serialize(serializer),
            Self::Many(many) => many.serialize(serializer),
        }
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + self.relations.len()))?;
        for (column, value) in &self.fields {
            map.serialize_entry(column, value)?;
        }
        for (property, related) in &self.relations {
            map.serialize_entry(property, related)?;
        }
        map.end()
    }
}
