//! the filter language used by bulk delete and purge: a flat list of
//! field comparisons evaluated against repository attributes.

use serde::{Deserialize, Serialize};

/// comparison operator carried by a query item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregator {
    Eq,
    Neq,
    Like,
    Nlike,
    In,
    Nin,
    /// boolean negation: matches when the field value parses as `false`
    Not,
}

impl Aggregator {
    /// Compare a rendered field value against the query value.
    ///
    /// All fields are compared as strings, including numeric ones: `in`
    /// on a count field is lexical membership in the comma-separated
    /// list, not a numeric range.
    pub fn matches(&self, actual: &str, expected: &str) -> bool {
        match self {
            Aggregator::Eq => actual == expected,
            Aggregator::Neq => actual != expected,
            Aggregator::Like => actual.contains(expected),
            Aggregator::Nlike => !actual.contains(expected),
            Aggregator::In => expected.split(',').any(|v| v.trim() == actual),
            Aggregator::Nin => !expected.split(',').any(|v| v.trim() == actual),
            Aggregator::Not => matches!(actual.parse::<bool>(), Ok(false)),
        }
    }
}

/// logical grouping operator carried on the wire with each query.
///
/// Present for wire compatibility only: evaluation walks items with the
/// caller's inclusive flag and never consults this field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Oper {
    Or,
    And,
    Nor,
    Nand,
}

impl Default for Oper {
    fn default() -> Self {
        Oper::Or
    }
}

/// one field comparison: `key <aggregator> value`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryItem {
    pub key: String,
    pub value: String,
    pub aggregator: Aggregator,
}

impl QueryItem {
    pub fn new(key: impl Into<String>, value: impl Into<String>, aggregator: Aggregator) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            aggregator,
        }
    }
}

/// a group of query items
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    #[serde(default)]
    pub items: Vec<QueryItem>,
    #[serde(default)]
    pub oper: Oper,
}

impl Query {
    pub fn new(items: Vec<QueryItem>) -> Self {
        Self {
            items,
            oper: Oper::Or,
        }
    }
}
