//! Conditions and boolean condition trees.
//!
//! A [`Condition`] is validated when it is built, so a tree that exists is
//! always well shaped: BETWEEN carries a pair and IN carries a non-empty
//! list. Column existence is checked later against the target entity.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::Deserialize;

use crate::error::{FilterError, Result};
use crate::ident::validate_identifier;
use crate::value::{SqlValue, ToSqlValue};

/// Comparison operators accepted in a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Operator {
    /// `=`
    #[default]
    Eq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    LtEq,
    /// `>=`
    GtEq,
    /// `<>`
    LtGt,
    /// `<=>`, NULL-safe equality
    NullSafeEq,
    /// `LIKE`
    Like,
    /// `NOT LIKE`
    NotLike,
    /// `BETWEEN`
    Between,
    /// `NOT BETWEEN`
    NotBetween,
    /// `IN`
    In,
    /// `NOT IN`
    NotIn,
}

impl Operator {
    /// Returns the SQL token.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::LtEq => "<=",
            Self::GtEq => ">=",
            Self::LtGt => "<>",
            Self::NullSafeEq => "<=>",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
            Self::Between => "BETWEEN",
            Self::NotBetween => "NOT BETWEEN",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
        }
    }

    /// BETWEEN or NOT BETWEEN.
    #[must_use]
    pub const fn is_range(self) -> bool {
        matches!(self, Self::Between | Self::NotBetween)
    }

    /// IN or NOT IN.
    #[must_use]
    pub const fn is_list(self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }

    /// Suffix appended to parameter names of multi-value operators.
    pub(crate) const fn param_suffix(self) -> &'static str {
        match self {
            Self::Between => "btw",
            Self::NotBetween => "notbtw",
            Self::In => "in",
            Self::NotIn => "notin",
            _ => "",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for Operator {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ");
        match normalized.to_ascii_uppercase().as_str() {
            "=" => Ok(Self::Eq),
            "!=" => Ok(Self::NotEq),
            "<" => Ok(Self::Lt),
            ">" => Ok(Self::Gt),
            "<=" => Ok(Self::LtEq),
            ">=" => Ok(Self::GtEq),
            "<>" => Ok(Self::LtGt),
            "<=>" => Ok(Self::NullSafeEq),
            "LIKE" => Ok(Self::Like),
            "NOT LIKE" => Ok(Self::NotLike),
            "BETWEEN" => Ok(Self::Between),
            "NOT BETWEEN" => Ok(Self::NotBetween),
            "IN" => Ok(Self::In),
            "NOT IN" => Ok(Self::NotIn),
            _ => Err(FilterError::InvalidOperator(s.to_owned())),
        }
    }
}

/// Boolean connective of a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoolOp {
    /// Every operand must hold.
    And,
    /// At least one operand must hold.
    Or,
}

impl BoolOp {
    /// Returns the SQL keyword.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

impl fmt::Display for BoolOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for BoolOp {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AND" => Ok(Self::And),
            "OR" => Ok(Self::Or),
            _ => Err(FilterError::InvalidBooleanOperator(s.to_owned())),
        }
    }
}

/// The value side of a condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A single value.
    Scalar(SqlValue),
    /// An ordered pair, for BETWEEN.
    Pair(SqlValue, SqlValue),
    /// A list, for IN.
    List(Vec<SqlValue>),
}

impl<'de> Deserialize<'de> for Operand {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawOperand {
            List(Vec<SqlValue>),
            Scalar(SqlValue),
        }

        Ok(match RawOperand::deserialize(deserializer)? {
            RawOperand::List(values) => Self::List(values),
            RawOperand::Scalar(value) => Self::Scalar(value),
        })
    }
}

/// A single `column OP value` comparison.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawCondition")]
pub struct Condition {
    column: String,
    operator: Operator,
    operand: Operand,
}

#[derive(Deserialize)]
struct RawCondition {
    column: String,
    #[serde(default, alias = "operator")]
    condition: Option<String>,
    value: Operand,
}

impl TryFrom<RawCondition> for Condition {
    type Error = FilterError;

    fn try_from(raw: RawCondition) -> Result<Self> {
        let operator = raw
            .condition
            .as_deref()
            .map(str::parse)
            .transpose()?
            .unwrap_or_default();
        Self::new(raw.column, operator, raw.value)
    }
}

impl Condition {
    /// Creates a condition, checking that the operand fits the operator.
    ///
    /// A two-element list is accepted for BETWEEN and a pair for IN.
    pub fn new(column: impl Into<String>, operator: Operator, operand: Operand) -> Result<Self> {
        let column = column.into();
        validate_identifier(&column)?;
        let token = operator.as_sql();

        let operand = if operator.is_range() {
            match operand {
                Operand::Pair(low, high) => Operand::Pair(low, high),
                Operand::List(values) if values.len() == 2 => {
                    let mut values = values.into_iter();
                    match (values.next(), values.next()) {
                        (Some(low), Some(high)) => Operand::Pair(low, high),
                        _ => {
                            return Err(FilterError::MalformedBetween {
                                column,
                                operator: token,
                            })
                        }
                    }
                }
                _ => {
                    return Err(FilterError::MalformedBetween {
                        column,
                        operator: token,
                    })
                }
            }
        } else if operator.is_list() {
            match operand {
                Operand::List(values) if values.is_empty() => {
                    return Err(FilterError::EmptyInList {
                        column,
                        operator: token,
                    })
                }
                Operand::List(values) => Operand::List(values),
                Operand::Pair(a, b) => Operand::List(vec![a, b]),
                Operand::Scalar(_) => {
                    return Err(FilterError::ListExpected {
                        column,
                        operator: token,
                    })
                }
            }
        } else {
            match operand {
                Operand::Scalar(value) => Operand::Scalar(value),
                Operand::Pair(..) | Operand::List(_) => {
                    return Err(FilterError::ScalarExpected {
                        column,
                        operator: token,
                    })
                }
            }
        };

        Ok(Self {
            column,
            operator,
            operand,
        })
    }

    // The shorthands below skip the identifier check; compilation only
    // interpolates columns declared on an entity that passed validation.
    fn scalar(column: &str, operator: Operator, value: SqlValue) -> Self {
        Self {
            column: column.to_owned(),
            operator,
            operand: Operand::Scalar(value),
        }
    }

    /// `column = value`
    pub fn eq<V: ToSqlValue>(column: &str, value: V) -> Self {
        Self::scalar(column, Operator::Eq, value.to_sql_value())
    }

    /// `column != value`
    pub fn not_eq<V: ToSqlValue>(column: &str, value: V) -> Self {
        Self::scalar(column, Operator::NotEq, value.to_sql_value())
    }

    /// `column < value`
    pub fn lt<V: ToSqlValue>(column: &str, value: V) -> Self {
        Self::scalar(column, Operator::Lt, value.to_sql_value())
    }

    /// `column > value`
    pub fn gt<V: ToSqlValue>(column: &str, value: V) -> Self {
        Self::scalar(column, Operator::Gt, value.to_sql_value())
    }

    /// `column <= value`
    pub fn lt_eq<V: ToSqlValue>(column: &str, value: V) -> Self {
        Self::scalar(column, Operator::LtEq, value.to_sql_value())
    }

    /// `column >= value`
    pub fn gt_eq<V: ToSqlValue>(column: &str, value: V) -> Self {
        Self::scalar(column, Operator::GtEq, value.to_sql_value())
    }

    /// `column LIKE pattern`
    pub fn like(column: &str, pattern: &str) -> Self {
        Self::scalar(column, Operator::Like, SqlValue::Text(pattern.to_owned()))
    }

    /// `column BETWEEN low AND high`
    pub fn between<V: ToSqlValue>(column: &str, low: V, high: V) -> Self {
        Self {
            column: column.to_owned(),
            operator: Operator::Between,
            operand: Operand::Pair(low.to_sql_value(), high.to_sql_value()),
        }
    }

    /// `column IN (values...)`; fails on an empty list.
    pub fn in_list<V: ToSqlValue>(column: &str, values: Vec<V>) -> Result<Self> {
        Self::new(
            column,
            Operator::In,
            Operand::List(values.into_iter().map(ToSqlValue::to_sql_value).collect()),
        )
    }

    /// `column NOT IN (values...)`; fails on an empty list.
    pub fn not_in<V: ToSqlValue>(column: &str, values: Vec<V>) -> Result<Self> {
        Self::new(
            column,
            Operator::NotIn,
            Operand::List(values.into_iter().map(ToSqlValue::to_sql_value).collect()),
        )
    }

    /// The compared column.
    #[must_use]
    pub fn column(&self) -> &str {
        &self.column
    }

    /// The comparison operator.
    #[must_use]
    pub const fn operator(&self) -> Operator {
        self.operator
    }

    /// The value side.
    #[must_use]
    pub const fn operand(&self) -> &Operand {
        &self.operand
    }
}

/// A boolean tree of conditions.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionTree {
    /// A single condition.
    Leaf(Condition),
    /// Operands joined by one boolean connective.
    Node {
        /// The connective.
        op: BoolOp,
        /// Sub-trees, never empty.
        operands: Vec<ConditionTree>,
    },
}

impl ConditionTree {
    /// Creates a node, rejecting an empty operand list.
    pub fn node(op: BoolOp, operands: Vec<Self>) -> Result<Self> {
        if operands.is_empty() {
            return Err(FilterError::EmptyNode(op.as_sql()));
        }
        Ok(Self::Node { op, operands })
    }

    /// AND over `operands`.
    pub fn and(operands: Vec<Self>) -> Result<Self> {
        Self::node(BoolOp::And, operands)
    }

    /// OR over `operands`.
    pub fn or(operands: Vec<Self>) -> Result<Self> {
        Self::node(BoolOp::Or, operands)
    }

    /// Visits every leaf condition, left to right.
    pub fn conditions(&self) -> Vec<&Condition> {
        match self {
            Self::Leaf(condition) => vec![condition],
            Self::Node { operands, .. } => operands.iter().flat_map(Self::conditions).collect(),
        }
    }
}

impl From<Condition> for ConditionTree {
    fn from(condition: Condition) -> Self {
        Self::Leaf(condition)
    }
}

#[derive(Deserialize)]
struct RawNode {
    operator: String,
    operands: Vec<ConditionTree>,
}

impl<'de> Deserialize<'de> for ConditionTree {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        if value.get("operands").is_some() {
            let raw: RawNode = serde_json::from_value(value).map_err(de::Error::custom)?;
            let op = raw.operator.parse().map_err(de::Error::custom)?;
            Self::node(op, raw.operands).map_err(de::Error::custom)
        } else {
            serde_json::from_value::<Condition>(value)
                .map(Self::Leaf)
                .map_err(de::Error::custom)
        }
    }
}

/// The WHERE part of a filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Where {
    /// Flat list joined with AND.
    All(Vec<Condition>),
    /// Flat list joined with OR.
    Any(Vec<Condition>),
    /// Arbitrary boolean tree.
    Tree(ConditionTree),
}

impl Where {
    /// Returns a predicate that also requires every condition in `extra`.
    #[must_use]
    pub fn and(self, extra: Vec<Condition>) -> Self {
        if extra.is_empty() {
            return self;
        }
        match self {
            Self::All(mut conditions) => {
                conditions.extend(extra);
                Self::All(conditions)
            }
            Self::Any(conditions) if conditions.is_empty() => Self::All(extra),
            Self::Any(conditions) => {
                let any = ConditionTree::Node {
                    op: BoolOp::Or,
                    operands: conditions.into_iter().map(ConditionTree::Leaf).collect(),
                };
                Self::Tree(ConditionTree::Node {
                    op: BoolOp::And,
                    operands: std::iter::once(any)
                        .chain(extra.into_iter().map(ConditionTree::Leaf))
                        .collect(),
                })
            }
            Self::Tree(tree) => Self::Tree(ConditionTree::Node {
                op: BoolOp::And,
                operands: std::iter::once(tree)
                    .chain(extra.into_iter().map(ConditionTree::Leaf))
                    .collect(),
            }),
        }
    }

    /// Every condition in the predicate, left to right.
    pub fn conditions(&self) -> Vec<&Condition> {
        match self {
            Self::All(conditions) | Self::Any(conditions) => conditions.iter().collect(),
            Self::Tree(tree) => tree.conditions(),
        }
    }
}
