use crate::{
    Backend, ChangeBus, Changes, ChangesStream, DeleteBuilder, ExecRawBuilder, GetBuilder,
    PutBuilder,
};
use std::{
    collections::{BTreeSet, HashSet},
    sync::Mutex,
};

/// The storage handle: a backend plus the change bus and transaction
/// state that belong to it.
///
/// Every write performed through the prepared operations of one `Depot`
/// publishes its change scope on that instance's bus; there is no
/// global state, so isolated instances can coexist (and be created
/// freely in tests). Writes performed against the backend directly
/// bypass notification; use [`Depot::notify`] to announce them manually.
pub struct Depot<B: Backend> {
    pub(crate) backend: B,
    pub(crate) bus: ChangeBus,
    pub(crate) tx: Mutex<TxState>,
}

#[derive(Default)]
pub(crate) struct TxState {
    pub(crate) depth: u32,
    pub(crate) any_rollback: bool,
    pub(crate) pending: HashSet<Changes>,
}

impl<B: Backend> Depot<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            bus: ChangeBus::new(),
            tx: Mutex::new(TxState::default()),
        }
    }

    /// Direct access to the backing store. Reads and writes made through
    /// it do not publish change notifications.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Prepare a "put" (insert or update) of a typed object.
    pub fn put(&self) -> PutBuilder<'_, B> {
        PutBuilder::new(self)
    }

    /// Prepare a "get" returning objects, a single object or a raw
    /// cursor.
    pub fn get(&self) -> GetBuilder<'_, B> {
        GetBuilder::new(self)
    }

    /// Prepare a "delete" of a typed object or by query.
    pub fn delete(&self) -> DeleteBuilder<'_, B> {
        DeleteBuilder::new(self)
    }

    /// Prepare a raw statement with explicitly declared change scope.
    pub fn exec_raw(&self) -> ExecRawBuilder<'_, B> {
        ExecRawBuilder::new(self)
    }

    /// Subscribe to changes affecting any of the given tables or tags.
    /// Empty interest sets yield a stream that never fires.
    pub fn observe(
        &self,
        tables: impl IntoIterator<Item = impl Into<String>>,
        tags: impl IntoIterator<Item = impl Into<String>>,
    ) -> ChangesStream {
        let tables: BTreeSet<String> = tables.into_iter().map(Into::into).collect();
        let tags: BTreeSet<String> = tags.into_iter().map(Into::into).collect();
        self.bus.subscribe(tables, tags)
    }

    /// Subscribe to changes of one table.
    pub fn observe_table(&self, table: impl Into<String>) -> ChangesStream {
        self.observe([table.into()], [] as [String; 0])
    }

    /// Subscribe to changes of one tag.
    pub fn observe_tag(&self, tag: impl Into<String>) -> ChangesStream {
        self.observe([] as [String; 0], [tag.into()])
    }

    /// Announce changes to subscribers.
    ///
    /// This is the routing point every write operation goes through:
    /// outside a transaction the changes are published immediately;
    /// while a transaction is open they are parked in its pending set
    /// and published as one aggregated event only if the transaction
    /// commits.
    pub fn notify(&self, changes: Changes) {
        let mut tx = self.tx.lock().expect("transaction state lock poisoned");
        if tx.depth > 0 {
            log::trace!("transaction open, deferring changes: {changes}");
            tx.pending.insert(changes);
            return;
        }
        drop(tx);
        self.bus.publish(&changes);
    }
}
