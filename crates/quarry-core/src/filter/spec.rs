//! Filter specifications: projection, predicate, ordering, limit and
//! associations to eager-load.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use super::condition::{Condition, ConditionTree, Where};
use crate::error::{FilterError, Result};

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Ascending order (ASC)
    Asc,
    /// Descending order (DESC)
    Desc,
}

impl Direction {
    /// Returns the SQL keyword.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for Direction {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ASC" => Ok(Self::Asc),
            "DESC" => Ok(Self::Desc),
            _ => Err(FilterError::InvalidDirection(s.to_owned())),
        }
    }
}

/// One ORDER BY entry. Without a direction the database default applies.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawOrderSpec")]
pub struct OrderSpec {
    /// Column to order by.
    pub column: String,
    /// Explicit direction, if any.
    pub direction: Option<Direction>,
}

#[derive(Deserialize)]
struct RawOrderSpec {
    column: String,
    #[serde(default, alias = "direction")]
    mode: Option<String>,
}

impl TryFrom<RawOrderSpec> for OrderSpec {
    type Error = FilterError;

    fn try_from(raw: RawOrderSpec) -> Result<Self> {
        Ok(Self {
            column: raw.column,
            direction: raw.mode.as_deref().map(str::parse).transpose()?,
        })
    }
}

impl OrderSpec {
    /// Orders by `column` with no explicit direction.
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: None,
        }
    }

    /// Ascending order on `column`.
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: Some(Direction::Asc),
        }
    }

    /// Descending order on `column`.
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: Some(Direction::Desc),
        }
    }
}

/// ORDER BY: a single entry or an ordered list.
///
/// The two forms treat unknown columns differently: a single entry with an
/// unknown column is rejected, list entries with unknown columns are skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderBy {
    /// One entry.
    One(OrderSpec),
    /// Several entries, applied in order.
    Many(Vec<OrderSpec>),
}

impl<'de> Deserialize<'de> for OrderBy {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        use serde::de::Error;

        let value = serde_json::Value::deserialize(deserializer)?;
        if value.is_array() {
            serde_json::from_value(value)
                .map(Self::Many)
                .map_err(D::Error::custom)
        } else {
            serde_json::from_value(value)
                .map(Self::One)
                .map_err(D::Error::custom)
        }
    }
}

/// LIMIT / OFFSET. Missing parts fall back to [`Limit::DEFAULT_ROW_COUNT`]
/// and zero. A row count of zero means no limit, from JSON and from
/// [`Limit::new`] alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "RawLimit")]
pub struct Limit {
    /// Maximum number of rows.
    pub row_count: Option<u64>,
    /// Rows to skip.
    pub offset: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLimit {
    #[serde(default)]
    row_count: Option<serde_json::Value>,
    #[serde(default)]
    offset: Option<serde_json::Value>,
}

fn positive_integer(value: Option<&serde_json::Value>) -> Option<u64> {
    value.and_then(serde_json::Value::as_u64).filter(|n| *n > 0)
}

impl From<RawLimit> for Limit {
    fn from(raw: RawLimit) -> Self {
        Self {
            row_count: positive_integer(raw.row_count.as_ref()),
            offset: positive_integer(raw.offset.as_ref()),
        }
    }
}

impl Limit {
    /// Row count used when none is given: effectively unbounded.
    pub const DEFAULT_ROW_COUNT: u64 = u64::MAX;

    /// Limits to `row_count` rows; zero leaves the row count unbounded.
    #[must_use]
    pub const fn new(row_count: u64) -> Self {
        Self {
            row_count: if row_count == 0 { None } else { Some(row_count) },
            offset: None,
        }
    }

    /// Skips `offset` rows.
    #[must_use]
    pub const fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Row count to bind.
    #[must_use]
    pub fn effective_row_count(&self) -> u64 {
        self.row_count
            .filter(|n| *n > 0)
            .unwrap_or(Self::DEFAULT_ROW_COUNT)
    }

    /// Offset to bind.
    #[must_use]
    pub fn effective_offset(&self) -> u64 {
        self.offset.unwrap_or(0)
    }
}

/// One local/foreign column pair of an association.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinKey {
    /// Column on the primary entity.
    pub local: String,
    /// Column on the associated entity. Defaults to the primary entity's
    /// primary key column name.
    pub foreign: Option<String>,
}

impl JoinKey {
    /// Creates a key pair.
    pub fn new(local: impl Into<String>, foreign: impl Into<String>) -> Self {
        Self {
            local: local.into(),
            foreign: Some(foreign.into()),
        }
    }
}

/// Associated records to load alongside the primary rows.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(from = "RawAssociation")]
pub struct AssociationSpec {
    /// Join keys; several keys form a composite key.
    pub join_keys: Vec<JoinKey>,
    /// Name of the associated entity in the schema.
    pub entity: String,
    /// Property that receives the associated records.
    pub property: String,
    /// One record per primary row instead of a list.
    pub unique: bool,
    /// Filter applied to the associated query.
    pub filter: FilterSpec,
    /// Schema qualifier for the associated table.
    pub schema: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAssociation {
    #[serde(default)]
    column: Option<String>,
    #[serde(default)]
    foreign_column: Option<String>,
    #[serde(default)]
    columns: Vec<RawJoinColumn>,
    #[serde(default, alias = "entity")]
    class: String,
    #[serde(default)]
    property: String,
    #[serde(default)]
    is_unique: Option<bool>,
    #[serde(default)]
    filters: FilterSpec,
    #[serde(default, alias = "schema")]
    database: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawJoinColumn {
    column: String,
    #[serde(default)]
    foreign_column: Option<String>,
}

impl From<RawAssociation> for AssociationSpec {
    fn from(raw: RawAssociation) -> Self {
        let join_keys = match raw.column {
            Some(local) => vec![JoinKey {
                local,
                foreign: raw.foreign_column,
            }],
            None => raw
                .columns
                .into_iter()
                .map(|c| JoinKey {
                    local: c.column,
                    foreign: c.foreign_column,
                })
                .collect(),
        };
        Self {
            join_keys,
            entity: raw.class,
            property: raw.property,
            unique: raw.is_unique.unwrap_or(true),
            filter: raw.filters,
            schema: raw.database,
        }
    }
}

impl AssociationSpec {
    /// Creates a one-to-one association with no join keys yet.
    pub fn new(entity: impl Into<String>, property: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            property: property.into(),
            unique: true,
            ..Self::default()
        }
    }

    /// Adds a join key pair.
    #[must_use]
    pub fn join(mut self, local: impl Into<String>, foreign: impl Into<String>) -> Self {
        self.join_keys.push(JoinKey::new(local, foreign));
        self
    }

    /// Adds a join key whose foreign column defaults to the primary key name.
    #[must_use]
    pub fn join_on(mut self, local: impl Into<String>) -> Self {
        self.join_keys.push(JoinKey {
            local: local.into(),
            foreign: None,
        });
        self
    }

    /// Collects every matching record into a list.
    #[must_use]
    pub const fn many(mut self) -> Self {
        self.unique = false;
        self
    }

    /// Sets the filter for the associated query.
    #[must_use]
    pub fn filter(mut self, filter: FilterSpec) -> Self {
        self.filter = filter;
        self
    }

    /// Qualifies the associated table with a schema.
    #[must_use]
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// An association needs a target, a property and at least one join key
    /// with a local column.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        !self.entity.trim().is_empty()
            && !self.property.trim().is_empty()
            && !self.join_keys.is_empty()
            && self.join_keys.iter().all(|k| !k.local.trim().is_empty())
    }
}

/// A declarative query over one entity.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(try_from = "RawFilterSpec")]
pub struct FilterSpec {
    /// Columns to select; empty selects every column.
    pub select: Vec<String>,
    /// WHERE predicate.
    pub predicate: Option<Where>,
    /// ORDER BY.
    pub order_by: Option<OrderBy>,
    /// LIMIT / OFFSET.
    pub limit: Option<Limit>,
    /// Expect at most one row.
    pub unique: bool,
    /// DISTINCT over a single selected column.
    pub distinct: bool,
    /// Return only the number of matching rows.
    pub count_only: bool,
    /// Return a flat list of the single selected column.
    pub values_only: bool,
    /// Schema qualifier for the table.
    pub schema: Option<String>,
    /// Replaces the entity's fractional timestamp columns when non-empty.
    pub fractional_timestamps: Option<Vec<String>>,
    /// Associations to eager-load.
    pub associations: Vec<AssociationSpec>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFilterSpec {
    #[serde(default)]
    select: Vec<String>,
    #[serde(default, rename = "where")]
    where_all: Option<serde_json::Value>,
    #[serde(default)]
    where_or: Option<Vec<Condition>>,
    #[serde(default)]
    order_by: Option<OrderBy>,
    #[serde(default)]
    limit: Option<Limit>,
    #[serde(default)]
    is_unique: bool,
    #[serde(default)]
    is_distinct: bool,
    #[serde(default)]
    only_count: bool,
    #[serde(default)]
    only_values: bool,
    #[serde(default, alias = "schema")]
    database: Option<String>,
    #[serde(default)]
    fractional_timestamps: Option<Vec<String>>,
    #[serde(default, rename = "with")]
    associations: Vec<AssociationSpec>,
}

impl TryFrom<RawFilterSpec> for FilterSpec {
    type Error = FilterError;

    fn try_from(raw: RawFilterSpec) -> Result<Self> {
        let malformed = |e: serde_json::Error| FilterError::Malformed(e.to_string());

        let predicate = match raw.where_all {
            Some(serde_json::Value::Null) | None => raw.where_or.map(Where::Any),
            Some(value) if value.is_array() => {
                Some(Where::All(serde_json::from_value(value).map_err(malformed)?))
            }
            Some(value) => Some(Where::Tree(
                serde_json::from_value::<ConditionTree>(value).map_err(malformed)?,
            )),
        };

        Ok(Self {
            select: raw.select,
            predicate,
            order_by: raw.order_by,
            limit: raw.limit,
            unique: raw.is_unique,
            distinct: raw.is_distinct,
            count_only: raw.only_count,
            values_only: raw.only_values,
            schema: raw.database,
            fractional_timestamps: raw.fractional_timestamps,
            associations: raw.associations,
        })
    }
}

impl FilterSpec {
    /// Creates an empty filter: every column of every row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a filter from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| FilterError::Malformed(e.to_string()))
    }

    /// Restricts the selected columns.
    #[must_use]
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a condition to the AND-joined predicate.
    #[must_use]
    pub fn filter(mut self, condition: Condition) -> Self {
        self.predicate = Some(match self.predicate.take() {
            Some(existing) => existing.and(vec![condition]),
            None => Where::All(vec![condition]),
        });
        self
    }

    /// Replaces the predicate with OR-joined conditions.
    #[must_use]
    pub fn any_of(mut self, conditions: Vec<Condition>) -> Self {
        self.predicate = Some(Where::Any(conditions));
        self
    }

    /// Replaces the predicate with a boolean tree.
    #[must_use]
    pub fn tree(mut self, tree: ConditionTree) -> Self {
        self.predicate = Some(Where::Tree(tree));
        self
    }

    /// Orders by a single entry.
    #[must_use]
    pub fn order_by(mut self, spec: OrderSpec) -> Self {
        self.order_by = Some(OrderBy::One(spec));
        self
    }

    /// Orders by several entries.
    #[must_use]
    pub fn order_by_all(mut self, specs: Vec<OrderSpec>) -> Self {
        self.order_by = Some(OrderBy::Many(specs));
        self
    }

    /// Applies LIMIT / OFFSET.
    #[must_use]
    pub const fn limit(mut self, limit: Limit) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Expects at most one row.
    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// DISTINCT over the single selected column.
    #[must_use]
    pub const fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Counts matching rows instead of returning them.
    #[must_use]
    pub const fn count_only(mut self) -> Self {
        self.count_only = true;
        self
    }

    /// Returns bare values of the single selected column.
    #[must_use]
    pub const fn values_only(mut self) -> Self {
        self.values_only = true;
        self
    }

    /// Qualifies the table with a schema.
    #[must_use]
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Overrides the fractional timestamp columns.
    #[must_use]
    pub fn fractional_timestamps<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fractional_timestamps = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Eager-loads an association.
    #[must_use]
    pub fn with(mut self, association: AssociationSpec) -> Self {
        self.associations.push(association);
        self
    }
}
