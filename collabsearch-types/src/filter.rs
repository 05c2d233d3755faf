//! Filter fragments.
//!
//! A [`Filter`] is a backend-defined predicate over the records of one
//! collection. The engine only understands the parts it has to merge:
//! field-expression groups (`f`), free-text groups (`q`) and the date format
//! tag. Everything else the backend accepts is carried opaquely in
//! [`Filter::extra`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Comparison operator of a field expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpressionOp {
    Eq,
    Gte,
    Gt,
    Lte,
    Lt,
    Like,
    Ne,
    Range,
    Within,
    Notwithin,
    Intersects,
    Notintersects,
}

impl ExpressionOp {
    /// Wire name of the operator, as used in `field:op:value` tuples.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Gte => "gte",
            Self::Gt => "gt",
            Self::Lte => "lte",
            Self::Lt => "lt",
            Self::Like => "like",
            Self::Ne => "ne",
            Self::Range => "range",
            Self::Within => "within",
            Self::Notwithin => "notwithin",
            Self::Intersects => "intersects",
            Self::Notintersects => "notintersects",
        }
    }
}

impl fmt::Display for ExpressionOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExpressionOp {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "eq" => Self::Eq,
            "gte" => Self::Gte,
            "gt" => Self::Gt,
            "lte" => Self::Lte,
            "lt" => Self::Lt,
            "like" => Self::Like,
            "ne" => Self::Ne,
            "range" => Self::Range,
            "within" => Self::Within,
            "notwithin" => Self::Notwithin,
            "intersects" => Self::Intersects,
            "notintersects" => Self::Notintersects,
            other => return Err(crate::Error::UnknownOperator(other.to_string())),
        })
    }
}

/// A single `field op value` predicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Expression {
    pub field: String,
    pub op: ExpressionOp,
    pub value: String,
}

impl Expression {
    #[must_use]
    pub fn new(field: impl Into<String>, op: ExpressionOp, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.field, self.op, self.value)
    }
}

/// A filter fragment targeting one collection.
///
/// `f` and `q` are lists of groups: groups are AND-ed together, the members
/// of a group are OR-ed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// Field-expression groups.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub f: Option<Vec<Vec<Expression>>>,

    /// Free-text term groups.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q: Option<Vec<Vec<String>>>,

    /// Date format used to interpret date values in `f`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dateformat: Option<String>,

    /// Polygon orientation flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub righthand: Option<bool>,

    /// Any other predicate class the backend understands.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Filter {
    /// Creates an empty filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a filter with a single one-expression group.
    #[must_use]
    pub fn expression(field: impl Into<String>, op: ExpressionOp, value: impl Into<String>) -> Self {
        Self::new().with_group(vec![Expression::new(field, op, value)])
    }

    /// Appends a field-expression group.
    #[must_use]
    pub fn with_group(mut self, group: Vec<Expression>) -> Self {
        self.f.get_or_insert_with(Vec::new).push(group);
        self
    }

    /// Appends a free-text group.
    #[must_use]
    pub fn with_query(mut self, terms: Vec<String>) -> Self {
        self.q.get_or_insert_with(Vec::new).push(terms);
        self
    }

    /// Sets the date format.
    #[must_use]
    pub fn with_dateformat(mut self, dateformat: impl Into<String>) -> Self {
        self.dateformat = Some(dateformat.into());
        self
    }

    /// Sets an opaque predicate class.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Returns true if the filter carries no predicate at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.f.as_ref().is_none_or(Vec::is_empty)
            && self.q.as_ref().is_none_or(Vec::is_empty)
            && self.extra.is_empty()
    }

    /// Iterates over all field-expression groups.
    pub fn groups(&self) -> impl Iterator<Item = &Vec<Expression>> {
        self.f.iter().flatten()
    }

    /// Iterates over all free-text groups.
    pub fn query_groups(&self) -> impl Iterator<Item = &Vec<String>> {
        self.q.iter().flatten()
    }
}
