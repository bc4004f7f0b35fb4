use crate::{Cursor, DeleteQuery, InsertQuery, RawQuery, RowLabeled, SelectQuery, UpdateQuery};

/// Error currency of backends and resolvers. The engine wraps these into
/// [`crate::Error::Operation`] with the failing operation's description.
pub type BackendError = anyhow::Error;
pub type BackendResult<T> = anyhow::Result<T>;

/// The row/cursor-oriented store the engine runs against.
///
/// Calls are synchronous and blocking; implementations must be safe for
/// concurrent calls (`&self` from any thread), but each individual call
/// blocks its calling thread. Query methods must return an empty cursor
/// rather than any "no result" sentinel.
///
/// Backends do not publish change notifications themselves; the engine
/// computes and routes them from the query specs.
pub trait Backend: Send + Sync {
    /// Run a structured read and return a cursor over the result set.
    fn query(&self, query: &SelectQuery) -> BackendResult<Box<dyn Cursor>>;

    /// Run a raw statement that produces rows.
    fn raw_query(&self, query: &RawQuery) -> BackendResult<Box<dyn Cursor>>;

    /// Insert `row` and return the identifier of the new row.
    fn insert(&self, query: &InsertQuery, row: &RowLabeled) -> BackendResult<i64>;

    /// Overwrite the payload columns of every row matching the predicate;
    /// returns the number of rows affected.
    fn update(&self, query: &UpdateQuery, row: &RowLabeled) -> BackendResult<u64>;

    /// Delete every row matching the predicate; returns the number of
    /// rows deleted.
    fn delete(&self, query: &DeleteQuery) -> BackendResult<u64>;

    /// Run a raw statement that produces no rows.
    fn exec_raw(&self, query: &RawQuery) -> BackendResult<()>;

    /// Whether begin/commit/rollback below are real. When false the
    /// engine still defers and aggregates notifications inside a
    /// transaction scope, but writes are not atomic at the store level.
    fn supports_transactions(&self) -> bool {
        true
    }

    fn begin_transaction(&self) -> BackendResult<()>;

    /// Flag the open transaction to commit on [`Backend::end_transaction`].
    fn set_transaction_successful(&self) -> BackendResult<()>;

    /// Commit if flagged successful, roll back otherwise.
    fn end_transaction(&self) -> BackendResult<()>;
}
