use anyhow::anyhow;
use depot_core::{
    Backend, BackendResult, Cursor, DeleteQuery, InsertQuery, RawQuery, RowLabeled, RowsCursor,
    SelectQuery, UpdateQuery, Value,
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

#[derive(Debug, Clone, Default)]
struct Table {
    next_id: i64,
    rows: Vec<RowLabeled>,
}

impl Table {
    fn new() -> Self {
        Self {
            next_id: 1,
            rows: Vec::new(),
        }
    }
}

struct Tx {
    snapshot: HashMap<String, Table>,
    successful: bool,
}

#[derive(Default)]
struct State {
    tables: HashMap<String, Table>,
    tx: Option<Tx>,
}

/// Heap-backed storage engine: rows live in per-table vectors, queries
/// evaluate their conditions against every row.
///
/// Tables are created on first insert; selecting from an unknown table
/// yields an empty cursor. Identifiers are allocated per table from a
/// monotonically increasing counter and materialized into the insert
/// query's key column when the incoming row carries it as null.
///
/// Transactions are implemented by snapshotting the whole table map on
/// begin and restoring it on rollback, which gives exact begin/commit/
/// rollback semantics at the cost of a full copy. Raw statements are not
/// supported: there is no interpreter to run them against, so
/// [`Backend::raw_query`] and [`Backend::exec_raw`] fail.
pub struct MemoryBackend {
    state: Mutex<State>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    /// A copy of a table's rows, mainly for inspection in tests.
    pub fn rows(&self, table: &str) -> Vec<RowLabeled> {
        self.lock()
            .tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("memory backend lock poisoned")
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Overwrite (or append) one column of a row.
fn set_column(row: &mut RowLabeled, name: &str, value: Value) {
    match row.labels.iter().position(|l| l == name) {
        Some(i) => row.values[i] = value,
        None => {
            let mut labels: Vec<String> = row.labels.to_vec();
            let mut values: Vec<Value> = row.values.to_vec();
            labels.push(name.to_owned());
            values.push(value);
            row.labels = labels.into();
            row.values = values.into();
        }
    }
}

/// Keep only the requested columns, in the requested order. Unknown
/// columns read as null.
fn project(row: &RowLabeled, columns: &[String]) -> RowLabeled {
    let labels: Arc<[String]> = columns.to_vec().into();
    let values: Vec<Value> = columns
        .iter()
        .map(|c| row.get_column(c).cloned().unwrap_or(Value::Null))
        .collect();
    RowLabeled::new(labels, values.into())
}

impl Backend for MemoryBackend {
    fn query(&self, query: &SelectQuery) -> BackendResult<Box<dyn Cursor>> {
        let state = self.lock();
        let Some(table) = state.tables.get(query.table()) else {
            return Ok(Box::new(RowsCursor::empty()));
        };
        let limit = query.limit().unwrap_or(u64::MAX);
        let rows: Vec<RowLabeled> = table
            .rows
            .iter()
            .filter(|row| query.condition().matches(row))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .map(|row| match query.columns() {
                Some(columns) => project(row, columns),
                None => row.clone(),
            })
            .collect();
        log::trace!("select from {} matched {} row(s)", query.table(), rows.len());
        Ok(Box::new(RowsCursor::new(rows)))
    }

    fn raw_query(&self, query: &RawQuery) -> BackendResult<Box<dyn Cursor>> {
        Err(anyhow!(
            "memory backend cannot run raw statements: `{}`",
            query.sql()
        ))
    }

    fn insert(&self, query: &InsertQuery, row: &RowLabeled) -> BackendResult<i64> {
        let mut state = self.lock();
        let table = state
            .tables
            .entry(query.table().to_owned())
            .or_insert_with(Table::new);
        let mut stored = row.clone();
        let id = match query.key_column() {
            Some(key) => match stored.get_column(key).and_then(Value::as_i64) {
                Some(id) => {
                    table.next_id = table.next_id.max(id + 1);
                    id
                }
                None => {
                    let id = table.next_id;
                    table.next_id += 1;
                    set_column(&mut stored, key, Value::from(id));
                    id
                }
            },
            None => {
                let id = table.next_id;
                table.next_id += 1;
                id
            }
        };
        table.rows.push(stored);
        Ok(id)
    }

    fn update(&self, query: &UpdateQuery, row: &RowLabeled) -> BackendResult<u64> {
        let mut state = self.lock();
        let Some(table) = state.tables.get_mut(query.table()) else {
            return Ok(0);
        };
        let mut updated = 0;
        for stored in table
            .rows
            .iter_mut()
            .filter(|stored| query.condition().matches(stored))
        {
            for (label, value) in row.labels.iter().zip(row.values.iter()) {
                set_column(stored, label, value.clone());
            }
            updated += 1;
        }
        Ok(updated)
    }

    fn delete(&self, query: &DeleteQuery) -> BackendResult<u64> {
        let mut state = self.lock();
        let Some(table) = state.tables.get_mut(query.table()) else {
            return Ok(0);
        };
        let before = table.rows.len();
        table.rows.retain(|row| !query.condition().matches(row));
        Ok((before - table.rows.len()) as u64)
    }

    fn exec_raw(&self, query: &RawQuery) -> BackendResult<()> {
        Err(anyhow!(
            "memory backend cannot run raw statements: `{}`",
            query.sql()
        ))
    }

    fn begin_transaction(&self) -> BackendResult<()> {
        let mut state = self.lock();
        if state.tx.is_some() {
            return Err(anyhow!("a transaction is already open"));
        }
        state.tx = Some(Tx {
            snapshot: state.tables.clone(),
            successful: false,
        });
        Ok(())
    }

    fn set_transaction_successful(&self) -> BackendResult<()> {
        let mut state = self.lock();
        match &mut state.tx {
            Some(tx) => {
                tx.successful = true;
                Ok(())
            }
            None => Err(anyhow!("no open transaction to mark successful")),
        }
    }

    fn end_transaction(&self) -> BackendResult<()> {
        let mut state = self.lock();
        match state.tx.take() {
            Some(tx) => {
                if !tx.successful {
                    log::debug!("rolling back to snapshot of {} table(s)", tx.snapshot.len());
                    state.tables = tx.snapshot;
                }
                Ok(())
            }
            None => Err(anyhow!("no open transaction to end")),
        }
    }
}
