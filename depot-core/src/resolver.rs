use crate::{
    Backend, BackendResult, Changes, Condition, Cursor, DeleteQuery, Entity, InsertQuery,
    RawQuery, RowLabeled, SelectQuery, UpdateQuery,
};
use anyhow::anyhow;
use std::{collections::BTreeSet, marker::PhantomData};

/// Result of a put: the engine decided insert-vs-update from the
/// object's identity, never both.
///
/// `Inserted` implies the identity was null before the call; `Updated`
/// implies it was non-null. `Updated { rows: 0 }` means "was not
/// updated" and is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Inserted { id: i64 },
    Updated { rows: u64 },
    Ignored,
}

impl PutOutcome {
    pub fn was_inserted(&self) -> bool {
        matches!(self, Self::Inserted { .. })
    }

    pub fn was_updated(&self) -> bool {
        matches!(self, Self::Updated { .. })
    }

    pub fn inserted_id(&self) -> Option<i64> {
        match self {
            Self::Inserted { id } => Some(*id),
            _ => None,
        }
    }

    pub fn rows_updated(&self) -> Option<u64> {
        match self {
            Self::Updated { rows } => Some(*rows),
            _ => None,
        }
    }

    /// Whether the write changed anything; only writes with effect
    /// publish a notification.
    pub fn has_effect(&self) -> bool {
        match self {
            Self::Inserted { .. } => true,
            Self::Updated { rows } => *rows > 0,
            Self::Ignored => false,
        }
    }
}

/// Put strategy for one entity type. Stateless and shared across
/// concurrent operations; implementations must not cache the in-flight
/// object.
pub trait PutResolver<T>: Send + Sync {
    /// Read the object's identity and either insert (null identity) or
    /// update by identity (non-null). Backend failures propagate
    /// unchanged.
    fn perform_put(&self, backend: &dyn Backend, object: &T) -> BackendResult<PutOutcome>;

    /// Side-effecting hook invoked exactly once per successful
    /// [`PutResolver::perform_put`], after the write and before any
    /// notification. The default does nothing.
    fn after_put(&self, object: &mut T, outcome: &PutOutcome) {
        let _ = (object, outcome);
    }

    /// The change scope a put of `object` affects.
    fn affects(&self, object: &T) -> Changes;
}

/// Where a get reads from: a structured select or a raw statement.
#[derive(Debug, Clone, PartialEq)]
pub enum GetSource {
    Select(SelectQuery),
    Raw(RawQuery),
}

impl GetSource {
    /// Run the read against the backend.
    pub fn run(&self, backend: &dyn Backend) -> BackendResult<Box<dyn Cursor>> {
        match self {
            Self::Select(query) => backend.query(query),
            Self::Raw(query) => backend.raw_query(query),
        }
    }

    /// Tables this read depends on, for live query refresh.
    pub fn observed_tables(&self) -> BTreeSet<String> {
        match self {
            Self::Select(query) => BTreeSet::from([query.table().to_owned()]),
            Self::Raw(query) => query.observes_tables().clone(),
        }
    }

    /// Tags this read depends on.
    pub fn observed_tags(&self) -> BTreeSet<String> {
        match self {
            Self::Select(query) => query.observes_tags().clone(),
            Self::Raw(query) => query.observes_tags().clone(),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Select(query) => format!("get from table {}", query.table()),
            Self::Raw(query) => format!("raw get `{}`", query.sql()),
        }
    }
}

impl From<SelectQuery> for GetSource {
    fn from(value: SelectQuery) -> Self {
        Self::Select(value)
    }
}

impl From<RawQuery> for GetSource {
    fn from(value: RawQuery) -> Self {
        Self::Raw(value)
    }
}

/// Get strategy: run the read and map rows back to objects. Pure: must
/// not mutate backend state, safe to call repeatedly.
pub trait GetResolver<T>: Send + Sync {
    fn perform_get(&self, backend: &dyn Backend, source: &GetSource)
    -> BackendResult<Box<dyn Cursor>>;

    fn map_from_row(&self, row: &RowLabeled) -> BackendResult<T>;
}

/// Delete strategy for one entity type.
pub trait DeleteResolver<T>: Send + Sync {
    /// Delete the rows backing `object`; returns the number of rows
    /// removed.
    fn perform_delete(&self, backend: &dyn Backend, object: &T) -> BackendResult<u64>;

    /// The change scope a delete of `object` affects.
    fn affects(&self, object: &T) -> Changes;
}

/// Resolver used when a builder gets no explicit one: maps through the
/// [`Entity`] contract. Zero-sized, one shared strategy per type.
pub struct DefaultResolver<T>(PhantomData<fn() -> T>);

impl<T> DefaultResolver<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for DefaultResolver<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for DefaultResolver<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T: Entity> PutResolver<T> for DefaultResolver<T> {
    fn perform_put(&self, backend: &dyn Backend, object: &T) -> BackendResult<PutOutcome> {
        let row = object.to_row();
        match object.identity() {
            None => {
                let query = InsertQuery::builder()
                    .table(T::table())
                    .key_column(T::identity_column())
                    .build()?;
                let id = backend.insert(&query, &row)?;
                Ok(PutOutcome::Inserted { id })
            }
            Some(id) => {
                let query = UpdateQuery::builder()
                    .table(T::table())
                    .condition(Condition::eq(T::identity_column(), id))
                    .build()?;
                let rows = backend.update(&query, &row)?;
                Ok(PutOutcome::Updated { rows })
            }
        }
    }

    fn after_put(&self, object: &mut T, outcome: &PutOutcome) {
        if let PutOutcome::Inserted { id } = outcome {
            object.set_identity(*id);
        }
    }

    fn affects(&self, _object: &T) -> Changes {
        Changes::table(T::table())
    }
}

impl<T: Entity> GetResolver<T> for DefaultResolver<T> {
    fn perform_get(
        &self,
        backend: &dyn Backend,
        source: &GetSource,
    ) -> BackendResult<Box<dyn Cursor>> {
        source.run(backend)
    }

    fn map_from_row(&self, row: &RowLabeled) -> BackendResult<T> {
        T::from_row(row)
    }
}

impl<T: Entity> DeleteResolver<T> for DefaultResolver<T> {
    fn perform_delete(&self, backend: &dyn Backend, object: &T) -> BackendResult<u64> {
        let Some(id) = object.identity() else {
            return Err(anyhow!(
                "cannot delete a {} entity that has no identity",
                T::table()
            ));
        };
        let query = DeleteQuery::builder()
            .table(T::table())
            .condition(Condition::eq(T::identity_column(), id))
            .build()?;
        backend.delete(&query)
    }

    fn affects(&self, _object: &T) -> Changes {
        Changes::table(T::table())
    }
}
