//! Query types passed to the store
//!
//! The filter model is deliberately small: a conjunction of field
//! predicates. Stores translate it to their native query language; the
//! in-memory store evaluates it directly through [`Filter::matches`].

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::record::{compare_values, Record};

/// Comparison operator of a single predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    /// field == value
    Eq(Value),
    /// field != value
    Ne(Value),
    /// field > value
    Gt(Value),
    /// field >= value
    Gte(Value),
    /// field < value
    Lt(Value),
    /// field <= value
    Lte(Value),
    /// field is one of the listed values
    In(Vec<Value>),
}

/// A predicate on one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Field name
    pub field: String,
    /// Operator and operand
    pub op: Op,
}

impl Condition {
    /// Evaluate against a record. A missing field only satisfies `Ne`.
    pub fn matches(&self, record: &Record) -> bool {
        let Some(actual) = record.get(&self.field) else {
            return matches!(self.op, Op::Ne(_));
        };
        match &self.op {
            Op::Eq(v) => compare_values(actual, v) == Ordering::Equal,
            Op::Ne(v) => compare_values(actual, v) != Ordering::Equal,
            Op::Gt(v) => compare_values(actual, v) == Ordering::Greater,
            Op::Gte(v) => compare_values(actual, v) != Ordering::Less,
            Op::Lt(v) => compare_values(actual, v) == Ordering::Less,
            Op::Lte(v) => compare_values(actual, v) != Ordering::Greater,
            Op::In(vs) => vs
                .iter()
                .any(|v| compare_values(actual, v) == Ordering::Equal),
        }
    }
}

/// Conjunction of predicates. The empty filter matches every row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// All conditions must hold
    pub conditions: Vec<Condition>,
}

impl Filter {
    /// Filter that matches every row
    pub fn all() -> Self {
        Self::default()
    }

    /// Add a predicate
    pub fn and(mut self, field: impl Into<String>, op: Op) -> Self {
        self.conditions.push(Condition {
            field: field.into(),
            op,
        });
        self
    }

    /// Shorthand for `and(field, Op::Eq(value))`
    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and(field, Op::Eq(value.into()))
    }

    /// Original filter narrowed to an explicit key set
    pub fn with_key_set(&self, key: &str, keys: Vec<Value>) -> Self {
        self.clone().and(key, Op::In(keys))
    }

    /// Evaluate against a record
    pub fn matches(&self, record: &Record) -> bool {
        self.conditions.iter().all(|c| c.matches(record))
    }

    /// True if the filter has no conditions
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Ascending
    #[default]
    Asc,
    /// Descending
    Desc,
}

/// One ordering term
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    /// Field to sort on
    pub field: String,
    /// Sort direction
    pub direction: Direction,
}

impl OrderBy {
    /// Ascending order on `field`
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    /// Descending order on `field`
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
        }
    }
}

/// Compare two records by an ordering list; ties keep their input order
/// when used with a stable sort.
pub fn compare_by(order: &[OrderBy], a: &Record, b: &Record) -> Ordering {
    for term in order {
        let null = Value::Null;
        let l = a.get(&term.field).unwrap_or(&null);
        let r = b.get(&term.field).unwrap_or(&null);
        let ord = match term.direction {
            Direction::Asc => compare_values(l, r),
            Direction::Desc => compare_values(r, l),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// A paged read: `filter`, sorted by `order`, skipping `offset`, at most `limit`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindQuery {
    /// Row predicate
    pub filter: Filter,
    /// Rows to skip
    pub offset: u64,
    /// Maximum rows to return
    pub limit: Option<u64>,
    /// Sort order
    pub order: Vec<OrderBy>,
    /// When set, return only these fields
    pub attributes: Option<Vec<String>>,
}

impl FindQuery {
    /// Query over `filter` with no paging
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }

    /// Set offset and limit
    pub fn window(mut self, offset: u64, limit: u64) -> Self {
        self.offset = offset;
        self.limit = Some(limit);
        self
    }

    /// Set the order
    pub fn order(mut self, order: Vec<OrderBy>) -> Self {
        self.order = order;
        self
    }

    /// Restrict the returned fields
    pub fn attributes(mut self, fields: Vec<String>) -> Self {
        self.attributes = Some(fields);
        self
    }
}

/// Options forwarded to `bulk_create`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOptions {
    /// Skip rows whose primary key already exists instead of failing
    #[serde(default)]
    pub ignore_duplicates: bool,
}

/// Result of an `update` call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateOutcome {
    /// Number of rows changed
    pub affected: u64,
    /// Updated rows, if the store returns them
    #[serde(default)]
    pub rows: Vec<Record>,
}

/// Transaction isolation level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    /// Read committed
    ReadCommitted,
    /// Repeatable read
    RepeatableRead,
    /// Serializable
    Serializable,
}

/// Handle to an open store transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxnId(pub u64);

impl std::fmt::Display for TxnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "txn-{}", self.0)
    }
}
