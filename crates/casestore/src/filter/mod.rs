//! Client-built filter trees and their compilation into WHERE predicates.
//!
//! A [`FilterExpr`] is either a leaf comparison ([`Filter`]) or an AND/OR node
//! ([`FilterNode`]). [`FilterCompiler`] turns a tree into an [`Expr`](crate::qb::Expr),
//! resolving `fk.column` references through a [`JoinResolver`] and rewriting
//! values through optional per-column [`ValueEncoders`].
//!
//! Trees deserialize from JSON:
//!
//! ```json
//! {"connective": "and", "nodes": [
//!     {"column": "color", "comparison": "=", "value": "red"},
//!     {"connective": "or", "nodes": [
//!         {"column": "name", "comparison": "LIKE", "value": "%urgent%"},
//!         {"column": "name", "comparison": "LIKE", "value": "%critical%"}
//!     ]}
//! ]}
//! ```

mod compile;
mod encode;
mod field_type;
mod flat;

pub use compile::{FilterCompiler, JoinResolver, NoJoins};
pub use encode::{EncodeFn, ValueEncoders, encode_timestamp};
pub use field_type::FieldType;
pub use flat::{FlatFilter, apply_filters_to_query};
pub(crate) use flat::field_type;

use crate::error::StoreError;
use crate::qb::Param;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Comparison operator of a filter leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Comparison {
    Eq,
    NotEq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    ILike,
}

impl Comparison {
    /// SQL operator text.
    pub fn as_sql(self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::NotEq => "!=",
            Comparison::Gt => ">",
            Comparison::Gte => ">=",
            Comparison::Lt => "<",
            Comparison::Lte => "<=",
            Comparison::Like => "LIKE",
            Comparison::ILike => "ILIKE",
        }
    }

    /// Whether this is one of the six scalar comparators.
    pub fn is_scalar(self) -> bool {
        !matches!(self, Comparison::Like | Comparison::ILike)
    }
}

impl FromStr for Comparison {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cmp = match s.trim() {
            "=" | "==" => Comparison::Eq,
            "!=" | "<>" => Comparison::NotEq,
            ">" => Comparison::Gt,
            ">=" => Comparison::Gte,
            "<" => Comparison::Lt,
            "<=" => Comparison::Lte,
            op if op.eq_ignore_ascii_case("like") => Comparison::Like,
            op if op.eq_ignore_ascii_case("ilike") => Comparison::ILike,
            other => {
                return Err(StoreError::invalid_argument(
                    "store.filter.comparison",
                    format!("unknown comparison type: {other}"),
                ));
            }
        };
        Ok(cmp)
    }
}

impl TryFrom<String> for Comparison {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Comparison> for String {
    fn from(value: Comparison) -> Self {
        value.as_sql().to_string()
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Value carried by a filter leaf.
///
/// Untagged for serde: JSON booleans, integers, floats, strings, arrays and
/// `null` map onto the matching variant. Timestamps arrive as text or
/// integers and become [`FilterValue::Timestamp`] through an encoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    IntList(Vec<i64>),
    TextList(Vec<String>),
    Timestamp(DateTime<Utc>),
}

impl FilterValue {
    pub fn is_list(&self) -> bool {
        matches!(self, FilterValue::IntList(_) | FilterValue::TextList(_))
    }

    /// Wrap the value as a bind parameter.
    pub fn to_param(&self) -> Param {
        match self {
            FilterValue::Null => Param::new(Option::<String>::None),
            FilterValue::Bool(v) => Param::new(*v),
            FilterValue::Int(v) => Param::new(*v),
            FilterValue::Float(v) => Param::new(*v),
            FilterValue::Text(v) => Param::new(v.clone()),
            FilterValue::IntList(v) => Param::new(v.clone()),
            FilterValue::TextList(v) => Param::new(v.clone()),
            FilterValue::Timestamp(v) => Param::new(*v),
        }
    }
}

impl From<bool> for FilterValue {
    fn from(v: bool) -> Self {
        FilterValue::Bool(v)
    }
}

impl From<i64> for FilterValue {
    fn from(v: i64) -> Self {
        FilterValue::Int(v)
    }
}

impl From<i32> for FilterValue {
    fn from(v: i32) -> Self {
        FilterValue::Int(v.into())
    }
}

impl From<f64> for FilterValue {
    fn from(v: f64) -> Self {
        FilterValue::Float(v)
    }
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        FilterValue::Text(v.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(v: String) -> Self {
        FilterValue::Text(v)
    }
}

impl From<DateTime<Utc>> for FilterValue {
    fn from(v: DateTime<Utc>) -> Self {
        FilterValue::Timestamp(v)
    }
}

impl From<Vec<i64>> for FilterValue {
    fn from(v: Vec<i64>) -> Self {
        FilterValue::IntList(v)
    }
}

impl From<Vec<String>> for FilterValue {
    fn from(v: Vec<String>) -> Self {
        FilterValue::TextList(v)
    }
}

/// Leaf comparison: `column comparison value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// `column` or `fk.column`
    pub column: String,
    pub comparison: Comparison,
    pub value: FilterValue,
}

impl Filter {
    pub fn new(column: impl Into<String>, comparison: Comparison, value: impl Into<FilterValue>) -> Self {
        Self {
            column: column.into(),
            comparison,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connective {
    And,
    Or,
}

/// AND/OR node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterNode {
    pub connective: Connective,
    pub nodes: Vec<FilterExpr>,
}

/// A filter tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterExpr {
    Node(FilterNode),
    Leaf(Filter),
}

impl FilterExpr {
    /// Leaf shorthand.
    pub fn leaf(column: impl Into<String>, comparison: Comparison, value: impl Into<FilterValue>) -> Self {
        FilterExpr::Leaf(Filter::new(column, comparison, value))
    }

    pub fn and(nodes: Vec<FilterExpr>) -> Self {
        FilterExpr::Node(FilterNode {
            connective: Connective::And,
            nodes,
        })
    }

    pub fn or(nodes: Vec<FilterExpr>) -> Self {
        FilterExpr::Node(FilterNode {
            connective: Connective::Or,
            nodes,
        })
    }

    /// Every leaf of the tree, walked without recursion.
    pub fn leaves_mut(&mut self) -> Vec<&mut Filter> {
        let mut leaves = Vec::new();
        let mut stack = vec![self];
        while let Some(expr) = stack.pop() {
            match expr {
                FilterExpr::Leaf(filter) => leaves.push(filter),
                FilterExpr::Node(node) => stack.extend(node.nodes.iter_mut()),
            }
        }
        leaves
    }
}

impl From<Filter> for FilterExpr {
    fn from(f: Filter) -> Self {
        FilterExpr::Leaf(f)
    }
}

#[cfg(test)]
mod tests;
