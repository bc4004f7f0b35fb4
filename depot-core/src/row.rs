use crate::{BackendResult, Value};
use std::{collections::VecDeque, sync::Arc};

/// Shared reference-counted column name list.
pub type RowNames = Arc<[String]>;
/// Owned row value slice matching `RowNames` length.
pub type Row = Box<[Value]>;

/// A row with its corresponding column labels.
#[derive(Debug, Clone, PartialEq)]
pub struct RowLabeled {
    /// Column names.
    pub labels: RowNames,
    /// Data values (aligned by index with `labels`).
    pub values: Row,
}

impl RowLabeled {
    pub fn new(labels: RowNames, values: Row) -> Self {
        Self { labels, values }
    }

    /// Build a row from `(column, value)` pairs. Convenient for resolvers
    /// mapping objects to rows.
    pub fn from_pairs<S, I>(pairs: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = (S, Value)>,
    {
        let (labels, values): (Vec<String>, Vec<Value>) =
            pairs.into_iter().map(|(k, v)| (k.into(), v)).unzip();
        Self {
            labels: labels.into(),
            values: values.into(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.labels
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get_column(&self, name: &str) -> Option<&Value> {
        self.labels
            .iter()
            .position(|v| v == name)
            .map(|i| &self.values[i])
    }
}

/// Sequential, forward-only, finite reader over a result set.
///
/// Backends must return an empty cursor rather than signalling "no rows"
/// any other way. Resources are released on drop.
pub trait Cursor: Send {
    /// The next row, or `None` once the cursor is exhausted.
    fn next_row(&mut self) -> BackendResult<Option<RowLabeled>>;
}

/// In-memory [`Cursor`] over already materialized rows.
#[derive(Debug, Default)]
pub struct RowsCursor {
    rows: VecDeque<RowLabeled>,
}

impl RowsCursor {
    pub fn new(rows: impl IntoIterator<Item = RowLabeled>) -> Self {
        Self {
            rows: rows.into_iter().collect(),
        }
    }

    /// A cursor with zero rows.
    pub fn empty() -> Self {
        Self::default()
    }
}

impl Cursor for RowsCursor {
    fn next_row(&mut self) -> BackendResult<Option<RowLabeled>> {
        Ok(self.rows.pop_front())
    }
}
