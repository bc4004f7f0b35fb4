use crate::{
    Backend, ChangesStream, Cursor, DefaultResolver, Depot, Entity, Error, GetResolver, GetSource,
    RawQuery, Result, SelectQuery,
};
use futures::{Stream, StreamExt};

/// Entry point of `depot.get()`.
pub struct GetBuilder<'a, B: Backend> {
    depot: &'a Depot<B>,
}

impl<'a, B: Backend> GetBuilder<'a, B> {
    pub(crate) fn new(depot: &'a Depot<B>) -> Self {
        Self { depot }
    }

    /// Read a list of entities through their default resolver.
    pub fn list_of<T: Entity>(self) -> GetListBuilder<'a, B, T, DefaultResolver<T>> {
        self.list_with(DefaultResolver::new())
    }

    /// Read a list of any objects through an explicit resolver.
    pub fn list_with<T, R: GetResolver<T>>(self, resolver: R) -> GetListBuilder<'a, B, T, R> {
        GetListBuilder {
            depot: self.depot,
            source: None,
            resolver,
            _marker: std::marker::PhantomData,
        }
    }

    /// Read at most one entity through its default resolver.
    pub fn object_of<T: Entity>(self) -> GetObjectBuilder<'a, B, T, DefaultResolver<T>> {
        self.object_with(DefaultResolver::new())
    }

    /// Read at most one object through an explicit resolver.
    pub fn object_with<T, R: GetResolver<T>>(self, resolver: R) -> GetObjectBuilder<'a, B, T, R> {
        GetObjectBuilder {
            depot: self.depot,
            source: None,
            resolver,
            _marker: std::marker::PhantomData,
        }
    }

    /// Read a raw row cursor, no object mapping.
    pub fn cursor(self) -> GetCursorBuilder<'a, B> {
        GetCursorBuilder {
            depot: self.depot,
            source: None,
        }
    }

    /// Count the rows a query matches.
    pub fn count(self) -> GetCountBuilder<'a, B> {
        GetCountBuilder {
            depot: self.depot,
            source: None,
        }
    }
}

fn required_source(source: Option<GetSource>) -> Result<GetSource> {
    source.ok_or_else(|| Error::configuration("get requires a query or a raw query"))
}

/// Re-run a read on every matching change event.
///
/// The subscription is opened by the caller before the first run, so a
/// write landing between preparation and the first poll is not lost: it
/// sits in the subscriber channel and triggers a refresh. An error ends
/// the stream after being yielded. A source with no observed tables or
/// tags produces the first result and then stays silent.
fn refresh_on_changes<V>(
    mut events: ChangesStream,
    run: impl Fn() -> Result<V>,
) -> impl Stream<Item = Result<V>> {
    async_stream::stream! {
        match run() {
            Ok(value) => yield Ok(value),
            Err(e) => {
                yield Err(e);
                return;
            }
        }
        while events.next().await.is_some() {
            match run() {
                Ok(value) => yield Ok(value),
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }
    }
}

pub struct GetListBuilder<'a, B: Backend, T, R> {
    depot: &'a Depot<B>,
    source: Option<GetSource>,
    resolver: R,
    _marker: std::marker::PhantomData<fn() -> T>,
}

pub struct GetObjectBuilder<'a, B: Backend, T, R> {
    depot: &'a Depot<B>,
    source: Option<GetSource>,
    resolver: R,
    _marker: std::marker::PhantomData<fn() -> T>,
}

pub struct GetCursorBuilder<'a, B: Backend> {
    depot: &'a Depot<B>,
    source: Option<GetSource>,
}

impl<'a, B: Backend, T, R> GetListBuilder<'a, B, T, R> {
    pub fn with_query(mut self, query: SelectQuery) -> Self {
        self.source = Some(query.into());
        self
    }

    pub fn with_raw_query(mut self, query: RawQuery) -> Self {
        self.source = Some(query.into());
        self
    }

    pub fn with_resolver<R2: GetResolver<T>>(self, resolver: R2) -> GetListBuilder<'a, B, T, R2> {
        GetListBuilder {
            depot: self.depot,
            source: self.source,
            resolver,
            _marker: std::marker::PhantomData,
        }
    }

    pub fn prepare(self) -> Result<PreparedGetList<'a, B, T, R>>
    where
        R: GetResolver<T>,
    {
        Ok(PreparedGetList {
            depot: self.depot,
            source: required_source(self.source)?,
            resolver: self.resolver,
            _marker: std::marker::PhantomData,
        })
    }
}

impl<'a, B: Backend, T, R> GetObjectBuilder<'a, B, T, R> {
    pub fn with_query(mut self, query: SelectQuery) -> Self {
        self.source = Some(query.into());
        self
    }

    pub fn with_raw_query(mut self, query: RawQuery) -> Self {
        self.source = Some(query.into());
        self
    }

    pub fn with_resolver<R2: GetResolver<T>>(self, resolver: R2) -> GetObjectBuilder<'a, B, T, R2> {
        GetObjectBuilder {
            depot: self.depot,
            source: self.source,
            resolver,
            _marker: std::marker::PhantomData,
        }
    }

    pub fn prepare(self) -> Result<PreparedGetObject<'a, B, T, R>>
    where
        R: GetResolver<T>,
    {
        Ok(PreparedGetObject {
            depot: self.depot,
            source: required_source(self.source)?,
            resolver: self.resolver,
            _marker: std::marker::PhantomData,
        })
    }
}

impl<'a, B: Backend> GetCursorBuilder<'a, B> {
    pub fn with_query(mut self, query: SelectQuery) -> Self {
        self.source = Some(query.into());
        self
    }

    pub fn with_raw_query(mut self, query: RawQuery) -> Self {
        self.source = Some(query.into());
        self
    }

    pub fn prepare(self) -> Result<PreparedGetCursor<'a, B>> {
        Ok(PreparedGetCursor {
            depot: self.depot,
            source: required_source(self.source)?,
        })
    }
}

pub struct GetCountBuilder<'a, B: Backend> {
    depot: &'a Depot<B>,
    source: Option<GetSource>,
}

impl<'a, B: Backend> GetCountBuilder<'a, B> {
    pub fn with_query(mut self, query: SelectQuery) -> Self {
        self.source = Some(query.into());
        self
    }

    pub fn with_raw_query(mut self, query: RawQuery) -> Self {
        self.source = Some(query.into());
        self
    }

    pub fn prepare(self) -> Result<PreparedGetCount<'a, B>> {
        Ok(PreparedGetCount {
            depot: self.depot,
            source: required_source(self.source)?,
        })
    }
}

/// A prepared list read. Reusable: every [`PreparedGetList::execute`]
/// runs the query again.
pub struct PreparedGetList<'a, B: Backend, T, R: GetResolver<T>> {
    depot: &'a Depot<B>,
    source: GetSource,
    resolver: R,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<'a, B: Backend, T, R: GetResolver<T>> PreparedGetList<'a, B, T, R> {
    pub fn execute(&self) -> Result<Vec<T>> {
        let wrap = |e| Error::operation(self.source.describe(), e);
        let mut cursor = self
            .resolver
            .perform_get(self.depot.backend(), &self.source)
            .map_err(wrap)?;
        let mut objects = Vec::new();
        while let Some(row) = cursor.next_row().map_err(wrap)? {
            objects.push(self.resolver.map_from_row(&row).map_err(wrap)?);
        }
        Ok(objects)
    }

    /// Auto-refreshing stream: emits the current result immediately, then
    /// a fresh result after every change touching the source's observed
    /// tables or tags. Ends after yielding the first error.
    pub fn stream(self) -> impl Stream<Item = Result<Vec<T>>> {
        let events = self
            .depot
            .observe(self.source.observed_tables(), self.source.observed_tags());
        refresh_on_changes(events, move || self.execute())
    }
}

/// A prepared single-object read: the first row of the result, if any.
pub struct PreparedGetObject<'a, B: Backend, T, R: GetResolver<T>> {
    depot: &'a Depot<B>,
    source: GetSource,
    resolver: R,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<'a, B: Backend, T, R: GetResolver<T>> PreparedGetObject<'a, B, T, R> {
    pub fn execute(&self) -> Result<Option<T>> {
        let wrap = |e| Error::operation(self.source.describe(), e);
        let mut cursor = self
            .resolver
            .perform_get(self.depot.backend(), &self.source)
            .map_err(wrap)?;
        match cursor.next_row().map_err(wrap)? {
            Some(row) => Ok(Some(self.resolver.map_from_row(&row).map_err(wrap)?)),
            None => Ok(None),
        }
    }

    /// Auto-refreshing stream of the (optional) object; see
    /// [`PreparedGetList::stream`].
    pub fn stream(self) -> impl Stream<Item = Result<Option<T>>> {
        let events = self
            .depot
            .observe(self.source.observed_tables(), self.source.observed_tags());
        refresh_on_changes(events, move || self.execute())
    }
}

/// A prepared cursor read, handing the backend cursor to the caller.
pub struct PreparedGetCursor<'a, B: Backend> {
    depot: &'a Depot<B>,
    source: GetSource,
}

impl<'a, B: Backend> PreparedGetCursor<'a, B> {
    pub fn execute(&self) -> Result<Box<dyn Cursor>> {
        self.source
            .run(self.depot.backend())
            .map_err(|e| Error::operation(self.source.describe(), e))
    }

    /// Auto-refreshing stream of cursors; see [`PreparedGetList::stream`].
    pub fn stream(self) -> impl Stream<Item = Result<Box<dyn Cursor>>> {
        let events = self
            .depot
            .observe(self.source.observed_tables(), self.source.observed_tags());
        refresh_on_changes(events, move || self.execute())
    }
}

/// A prepared row count: drains the cursor and counts, leaving row
/// contents untouched.
pub struct PreparedGetCount<'a, B: Backend> {
    depot: &'a Depot<B>,
    source: GetSource,
}

impl<'a, B: Backend> PreparedGetCount<'a, B> {
    pub fn execute(&self) -> Result<u64> {
        let wrap = |e| Error::operation(self.source.describe(), e);
        let mut cursor = self.source.run(self.depot.backend()).map_err(wrap)?;
        let mut count = 0;
        while cursor.next_row().map_err(wrap)?.is_some() {
            count += 1;
        }
        Ok(count)
    }

    /// Auto-refreshing stream of counts; see [`PreparedGetList::stream`].
    pub fn stream(self) -> impl Stream<Item = Result<u64>> {
        let events = self
            .depot
            .observe(self.source.observed_tables(), self.source.observed_tags());
        refresh_on_changes(events, move || self.execute())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{StubBackend, TestUser};
    use crate::{Changes, Condition};
    use std::time::Duration;

    fn users_query() -> SelectQuery {
        SelectQuery::builder()
            .table("users")
            .condition(Condition::eq("name", "Ann"))
            .build()
            .unwrap()
    }

    #[test]
    fn missing_source_is_a_configuration_error() {
        let depot = Depot::new(StubBackend::default());
        let err = depot.get().list_of::<TestUser>().prepare().err().unwrap();
        assert!(err.is_configuration());
    }

    #[test]
    fn list_maps_rows_through_the_resolver() {
        let depot = Depot::new(StubBackend::default());
        let users = depot
            .get()
            .list_of::<TestUser>()
            .with_query(users_query())
            .prepare()
            .unwrap()
            .execute()
            .unwrap();
        // the stub backend serves empty cursors
        assert!(users.is_empty());
    }

    #[test]
    fn object_of_empty_result_is_none() {
        let depot = Depot::new(StubBackend::default());
        let user = depot
            .get()
            .object_of::<TestUser>()
            .with_query(users_query())
            .prepare()
            .unwrap()
            .execute()
            .unwrap();
        assert_eq!(user, None);
    }

    #[test]
    fn cursor_get_returns_the_raw_cursor() {
        let depot = Depot::new(StubBackend::default());
        let mut cursor = depot
            .get()
            .cursor()
            .with_query(users_query())
            .prepare()
            .unwrap()
            .execute()
            .unwrap();
        assert!(cursor.next_row().unwrap().is_none());
    }

    #[test]
    fn count_drains_the_cursor() {
        let depot = Depot::new(StubBackend::default());
        let count = depot
            .get()
            .count()
            .with_query(users_query())
            .prepare()
            .unwrap()
            .execute()
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn stream_emits_cold_start_then_refreshes_on_changes() {
        let depot = Depot::new(StubBackend::default());
        let stream = depot
            .get()
            .list_of::<TestUser>()
            .with_query(users_query())
            .prepare()
            .unwrap()
            .stream();
        futures::pin_mut!(stream);

        // cold start, no write needed
        assert!(stream.next().await.unwrap().unwrap().is_empty());

        depot.notify(Changes::table("users"));
        assert!(stream.next().await.unwrap().unwrap().is_empty());

        // unrelated change does not refresh
        depot.notify(Changes::table("cars"));
        let refresh = tokio::time::timeout(Duration::from_millis(20), stream.next()).await;
        assert!(refresh.is_err());
    }

    #[tokio::test]
    async fn raw_stream_without_observed_scope_emits_once() {
        let depot = Depot::new(StubBackend::default());
        let stream = depot
            .get()
            .cursor()
            .with_raw_query(RawQuery::builder().sql("SELECT 1").build().unwrap())
            .prepare()
            .unwrap()
            .stream();
        futures::pin_mut!(stream);

        assert!(stream.next().await.is_some());
        depot.notify(Changes::table("users"));
        let refresh = tokio::time::timeout(Duration::from_millis(20), stream.next()).await;
        assert!(refresh.is_err());
    }

    #[tokio::test]
    async fn stream_ends_after_an_error() {
        let depot = Depot::new(StubBackend::default());
        depot.backend().fail_reads();
        let stream = depot
            .get()
            .list_of::<TestUser>()
            .with_query(users_query())
            .prepare()
            .unwrap()
            .stream();
        futures::pin_mut!(stream);

        assert!(stream.next().await.unwrap().is_err());
        assert!(stream.next().await.is_none());
    }
}
