//! Entity metadata and the entity registry.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{FilterError, Result};
use crate::ident::{quote_identifier, validate_identifier};

/// Metadata describing one persisted entity.
///
/// Column names are used verbatim in statement text; every name must pass
/// [`validate_identifier`](crate::validate_identifier).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    /// Logical name, used to look the entity up in a [`Schema`].
    pub name: String,
    /// Table name.
    pub table: String,
    /// Primary key column.
    pub primary_key: String,
    /// Every known column, primary key included.
    pub columns: Vec<String>,
    /// Timestamp columns that also get a text rendering with fractional
    /// seconds when all columns are selected.
    #[serde(default)]
    pub fractional_timestamps: Vec<String>,
}

impl Entity {
    /// Creates an entity whose only column is its primary key.
    pub fn new(
        name: impl Into<String>,
        table: impl Into<String>,
        primary_key: impl Into<String>,
    ) -> Self {
        let primary_key = primary_key.into();
        Self {
            name: name.into(),
            table: table.into(),
            columns: vec![primary_key.clone()],
            primary_key,
            fractional_timestamps: Vec::new(),
        }
    }

    /// Adds a column.
    #[must_use]
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        let column = column.into();
        if !self.columns.contains(&column) {
            self.columns.push(column);
        }
        self
    }

    /// Adds several columns.
    #[must_use]
    pub fn with_columns<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        columns.into_iter().fold(self, Self::with_column)
    }

    /// Marks a column as a fractional timestamp.
    #[must_use]
    pub fn with_fractional(mut self, column: impl Into<String>) -> Self {
        self.fractional_timestamps.push(column.into());
        self
    }

    /// Returns whether `column` is declared on this entity.
    #[must_use]
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Fails with `UnknownColumn` unless `column` is declared.
    pub fn require_column(&self, column: &str) -> Result<()> {
        if self.has_column(column) {
            Ok(())
        } else {
            Err(FilterError::UnknownColumn {
                entity: self.name.clone(),
                column: column.to_owned(),
            })
        }
    }

    /// Checks every name and that the primary key is a known column.
    pub fn validate(&self) -> Result<()> {
        validate_identifier(&self.table)?;
        for column in &self.columns {
            validate_identifier(column)?;
        }
        if !self.has_column(&self.primary_key) {
            return Err(FilterError::MissingPrimaryKey {
                entity: self.name.clone(),
                primary_key: self.primary_key.clone(),
            });
        }
        Ok(())
    }

    /// Returns the quoted table reference, schema-qualified when given.
    ///
    /// Validates the whole entity first: builders only interpolate columns
    /// that `require_column` or `has_column` accept after this call.
    pub fn table_clause(&self, schema: Option<&str>) -> Result<String> {
        self.validate()?;
        let table = quote_identifier(&self.table);
        match schema {
            Some(schema) => {
                validate_identifier(schema)?;
                Ok(format!("{}.{table}", quote_identifier(schema)))
            }
            None => Ok(table),
        }
    }
}

/// Registry of entities by name.
///
/// Associations refer to their target entity by name; the registry resolves
/// those names when a filter is executed.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    entities: BTreeMap<String, Entity>,
}

impl Schema {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from a list of entities.
    pub fn from_entities<I>(entities: I) -> Result<Self>
    where
        I: IntoIterator<Item = Entity>,
    {
        let mut schema = Self::new();
        for entity in entities {
            schema.register(entity)?;
        }
        Ok(schema)
    }

    /// Parses a JSON array of entities.
    pub fn from_json(json: &str) -> Result<Self> {
        let entities: Vec<Entity> =
            serde_json::from_str(json).map_err(|e| FilterError::Malformed(e.to_string()))?;
        Self::from_entities(entities)
    }

    /// Validates and registers an entity, replacing one with the same name.
    pub fn register(&mut self, entity: Entity) -> Result<()> {
        entity.validate()?;
        self.entities.insert(entity.name.clone(), entity);
        Ok(())
    }

    /// Looks up an entity by name.
    pub fn get(&self, name: &str) -> Result<&Entity> {
        self.entities
            .get(name)
            .ok_or_else(|| FilterError::UnknownEntity(name.to_owned()))
    }

    /// Iterates over registered entities in name order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }
}
