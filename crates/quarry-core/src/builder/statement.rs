//! Compiled statements and their named parameters.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{FilterError, Result};
use crate::value::SqlValue;

/// Named parameter values, keyed without the leading colon.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Params(BTreeMap<String, SqlValue>);

impl Params {
    /// Creates an empty parameter map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter. Names must be unique.
    pub fn insert(&mut self, name: impl Into<String>, value: SqlValue) -> Result<()> {
        let name = name.into();
        if self.0.contains_key(&name) {
            return Err(FilterError::DuplicateParameter(name));
        }
        self.0.insert(name, value);
        Ok(())
    }

    /// Looks up a parameter by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.0.get(name)
    }

    /// Returns whether a parameter with this name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when there are no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Parameter names in name order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl<K: Into<String>> FromIterator<(K, SqlValue)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, SqlValue)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// What a statement does, which decides the shape of its outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementKind {
    /// Returns rows.
    Select,
    /// Returns the last insert id.
    Insert,
    /// Returns the affected row count.
    Update,
    /// Returns the affected row count.
    Delete,
}

impl StatementKind {
    /// Infers the kind from the first word of the statement text.
    pub fn infer(sql: &str) -> Result<Self> {
        let first = sql
            .trim_start()
            .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
            .next()
            .unwrap_or_default();
        first.parse()
    }

    /// Lowercase keyword.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatementKind {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "select" => Ok(Self::Select),
            "insert" => Ok(Self::Insert),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            _ => Err(FilterError::UnknownStatementKind(s.to_owned())),
        }
    }
}

/// Statement text plus the values for its placeholders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledStatement {
    /// SQL with `:name` placeholders.
    pub sql: String,
    /// One entry per distinct placeholder.
    pub params: Params,
    /// Statement kind.
    pub kind: StatementKind,
}

/// One statement text executed once per parameter set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkStatement {
    /// SQL with `:name` placeholders.
    pub sql: String,
    /// Statement kind.
    pub kind: StatementKind,
    /// Parameters for each execution, in order.
    pub rows: Vec<Params>,
}

/// A `:name` placeholder found in statement text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placeholder<'a> {
    /// Name without the colon.
    pub name: &'a str,
    /// Byte offset of the colon.
    pub start: usize,
    /// Byte offset just past the name.
    pub end: usize,
}

const fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

/// Finds every `:name` placeholder outside quoted strings and identifiers.
///
/// `::` is skipped so casts are not mistaken for placeholders.
#[must_use]
pub fn scan_placeholders(sql: &str) -> Vec<Placeholder<'_>> {
    let bytes = sql.as_bytes();
    let mut found = Vec::new();
    let mut quote: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match b {
            b'\'' | b'"' | b'`' => {
                quote = Some(b);
                i += 1;
            }
            b':' if bytes.get(i + 1) == Some(&b':') => i += 2,
            b':' => {
                let start = i;
                let mut end = i + 1;
                while end < bytes.len() && is_name_byte(bytes[end]) {
                    end += 1;
                }
                if end > start + 1 {
                    found.push(Placeholder {
                        name: &sql[start + 1..end],
                        start,
                        end,
                    });
                }
                i = end;
            }
            _ => i += 1,
        }
    }

    found
}
