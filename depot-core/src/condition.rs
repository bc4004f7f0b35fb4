use crate::{RowLabeled, Value};
use std::cmp::Ordering;

/// A typed predicate over a row, used by query specs instead of SQL
/// `WHERE` strings so that any record store can evaluate it.
///
/// Comparisons follow [`Value::compare`]: a null or mixed-type comparison
/// never matches. Use [`Condition::is_null`] to match nulls explicitly. A
/// column absent from the row reads as [`Value::Null`].
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Matches every row.
    All,
    Eq(String, Value),
    Ne(String, Value),
    Lt(String, Value),
    Le(String, Value),
    Gt(String, Value),
    Ge(String, Value),
    IsNull(String),
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq(column.into(), value.into())
    }

    pub fn ne(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Ne(column.into(), value.into())
    }

    pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Lt(column.into(), value.into())
    }

    pub fn le(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Le(column.into(), value.into())
    }

    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Gt(column.into(), value.into())
    }

    pub fn ge(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Ge(column.into(), value.into())
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Self::IsNull(column.into())
    }

    pub fn and(self, other: Condition) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Condition) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    pub fn not(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Reference evaluation against a materialized row, used by in-memory
    /// backends.
    pub fn matches(&self, row: &RowLabeled) -> bool {
        let cell = |column: &str| row.get_column(column).unwrap_or(&Value::Null);
        let cmp = |column: &str, value: &Value| cell(column).compare(value);
        match self {
            Self::All => true,
            Self::Eq(c, v) => cmp(c, v) == Some(Ordering::Equal),
            Self::Ne(c, v) => matches!(cmp(c, v), Some(o) if o != Ordering::Equal),
            Self::Lt(c, v) => cmp(c, v) == Some(Ordering::Less),
            Self::Le(c, v) => matches!(cmp(c, v), Some(Ordering::Less | Ordering::Equal)),
            Self::Gt(c, v) => cmp(c, v) == Some(Ordering::Greater),
            Self::Ge(c, v) => matches!(cmp(c, v), Some(Ordering::Greater | Ordering::Equal)),
            Self::IsNull(c) => cell(c).is_null(),
            Self::And(l, r) => l.matches(row) && r.matches(row),
            Self::Or(l, r) => l.matches(row) || r.matches(row),
            Self::Not(inner) => !inner.matches(row),
        }
    }
}

impl Default for Condition {
    fn default() -> Self {
        Self::All
    }
}
