use crate::{
    Backend, BackendResult, ChangesStream, Cursor, DeleteQuery, Entity, InsertQuery, RawQuery,
    RowLabeled, RowsCursor, SelectQuery, UpdateQuery, Value,
};
use anyhow::anyhow;
use futures::StreamExt;
use std::{
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicI64, Ordering},
    },
    time::Duration,
};

pub(crate) fn init_logs() {
    let mut logger = env_logger::builder();
    logger
        .is_test(true)
        .format_file(true)
        .format_line_number(true);
    if std::env::var("RUST_LOG").is_err() {
        logger.filter_level(log::LevelFilter::Warn);
    }
    let _ = logger.try_init();
}

/// Assert that a changes stream has nothing to deliver.
pub(crate) async fn idle(stream: &mut ChangesStream) {
    let next = tokio::time::timeout(Duration::from_millis(20), stream.next()).await;
    assert!(next.is_err(), "stream should not have yielded");
}

/// Scriptable backend recording transaction calls; reads return empty
/// cursors, writes return configured counts.
pub(crate) struct StubBackend {
    pub(crate) update_rows: u64,
    pub(crate) delete_rows: u64,
    pub(crate) fail_writes: bool,
    fail_reads: AtomicBool,
    transactions: bool,
    next_id: AtomicI64,
    tx_log: Mutex<Vec<&'static str>>,
    exec_log: Mutex<Vec<String>>,
}

impl Default for StubBackend {
    fn default() -> Self {
        Self {
            update_rows: 1,
            delete_rows: 1,
            fail_writes: false,
            fail_reads: AtomicBool::new(false),
            transactions: true,
            next_id: AtomicI64::new(1),
            tx_log: Mutex::new(Vec::new()),
            exec_log: Mutex::new(Vec::new()),
        }
    }
}

impl StubBackend {
    pub(crate) fn without_transactions() -> Self {
        Self {
            transactions: false,
            ..Self::default()
        }
    }

    pub(crate) fn with_update_rows(rows: u64) -> Self {
        Self {
            update_rows: rows,
            ..Self::default()
        }
    }

    pub(crate) fn with_delete_rows(rows: u64) -> Self {
        Self {
            delete_rows: rows,
            ..Self::default()
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    /// Make every subsequent read fail.
    pub(crate) fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::Relaxed);
    }

    pub(crate) fn transaction_log(&self) -> Vec<&'static str> {
        self.tx_log.lock().unwrap().clone()
    }

    pub(crate) fn executed(&self) -> Vec<String> {
        self.exec_log.lock().unwrap().clone()
    }

    fn check(&self) -> BackendResult<()> {
        if self.fail_writes {
            Err(anyhow!("stub backend failure"))
        } else {
            Ok(())
        }
    }
}

impl Backend for StubBackend {
    fn query(&self, _query: &SelectQuery) -> BackendResult<Box<dyn Cursor>> {
        if self.fail_reads.load(Ordering::Relaxed) {
            return Err(anyhow!("stub backend read failure"));
        }
        Ok(Box::new(RowsCursor::empty()))
    }

    fn raw_query(&self, _query: &RawQuery) -> BackendResult<Box<dyn Cursor>> {
        if self.fail_reads.load(Ordering::Relaxed) {
            return Err(anyhow!("stub backend read failure"));
        }
        Ok(Box::new(RowsCursor::empty()))
    }

    fn insert(&self, _query: &InsertQuery, _row: &RowLabeled) -> BackendResult<i64> {
        self.check()?;
        Ok(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn update(&self, _query: &UpdateQuery, _row: &RowLabeled) -> BackendResult<u64> {
        self.check()?;
        Ok(self.update_rows)
    }

    fn delete(&self, _query: &DeleteQuery) -> BackendResult<u64> {
        self.check()?;
        Ok(self.delete_rows)
    }

    fn exec_raw(&self, query: &RawQuery) -> BackendResult<()> {
        self.check()?;
        self.exec_log.lock().unwrap().push(query.sql().to_owned());
        Ok(())
    }

    fn supports_transactions(&self) -> bool {
        self.transactions
    }

    fn begin_transaction(&self) -> BackendResult<()> {
        self.tx_log.lock().unwrap().push("begin");
        Ok(())
    }

    fn set_transaction_successful(&self) -> BackendResult<()> {
        self.tx_log.lock().unwrap().push("set_successful");
        Ok(())
    }

    fn end_transaction(&self) -> BackendResult<()> {
        self.tx_log.lock().unwrap().push("end");
        Ok(())
    }
}

/// Minimal entity for exercising the default resolvers.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TestUser {
    pub(crate) id: Option<i64>,
    pub(crate) name: String,
}

impl TestUser {
    pub(crate) fn named(name: &str) -> Self {
        Self {
            id: None,
            name: name.to_owned(),
        }
    }
}

impl Entity for TestUser {
    fn table() -> &'static str {
        "users"
    }

    fn identity(&self) -> Option<i64> {
        self.id
    }

    fn set_identity(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn to_row(&self) -> RowLabeled {
        RowLabeled::from_pairs([
            ("id", Value::Int64(self.id)),
            ("name", Value::from(self.name.clone())),
        ])
    }

    fn from_row(row: &RowLabeled) -> BackendResult<Self> {
        Ok(Self {
            id: row.get_column("id").and_then(Value::as_i64),
            name: row
                .get_column("name")
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow!("users row is missing the name column"))?
                .to_owned(),
        })
    }
}
