use crate::{
    Backend, DefaultResolver, Depot, Entity, Error, PutOutcome, PutResolver, Result, stream,
};
use futures::Stream;

/// Entry point of `depot.put()`.
pub struct PutBuilder<'a, B: Backend> {
    depot: &'a Depot<B>,
}

impl<'a, B: Backend> PutBuilder<'a, B> {
    pub(crate) fn new(depot: &'a Depot<B>) -> Self {
        Self { depot }
    }

    /// Put an entity through its default resolver.
    pub fn object<T: Entity>(self, object: &'a mut T) -> PutObjectBuilder<'a, B, T, DefaultResolver<T>> {
        PutObjectBuilder {
            depot: self.depot,
            object,
            resolver: DefaultResolver::new(),
        }
    }

    /// Put any object through an explicit resolver (no [`Entity`]
    /// implementation required).
    pub fn object_with<T, R: PutResolver<T>>(
        self,
        object: &'a mut T,
        resolver: R,
    ) -> PutObjectBuilder<'a, B, T, R> {
        PutObjectBuilder {
            depot: self.depot,
            object,
            resolver,
        }
    }

    /// Put a batch of entities through their default resolver.
    pub fn objects<T: Entity>(
        self,
        objects: &'a mut [T],
    ) -> PutObjectsBuilder<'a, B, T, DefaultResolver<T>> {
        PutObjectsBuilder {
            depot: self.depot,
            objects,
            resolver: DefaultResolver::new(),
        }
    }

    /// Put a batch of any objects through an explicit resolver.
    pub fn objects_with<T, R: PutResolver<T>>(
        self,
        objects: &'a mut [T],
        resolver: R,
    ) -> PutObjectsBuilder<'a, B, T, R> {
        PutObjectsBuilder {
            depot: self.depot,
            objects,
            resolver,
        }
    }
}

pub struct PutObjectBuilder<'a, B: Backend, T, R> {
    depot: &'a Depot<B>,
    object: &'a mut T,
    resolver: R,
}

impl<'a, B: Backend, T, R> PutObjectBuilder<'a, B, T, R> {
    /// Replace the resolver.
    pub fn with_resolver<R2: PutResolver<T>>(self, resolver: R2) -> PutObjectBuilder<'a, B, T, R2> {
        PutObjectBuilder {
            depot: self.depot,
            object: self.object,
            resolver,
        }
    }

    pub fn prepare(self) -> Result<PreparedPut<'a, B, T, R>>
    where
        R: PutResolver<T>,
    {
        Ok(PreparedPut {
            depot: self.depot,
            object: self.object,
            resolver: self.resolver,
        })
    }
}

/// A prepared put: insert-vs-update is decided by the resolver from the
/// object's identity at execute time.
pub struct PreparedPut<'a, B: Backend, T, R: PutResolver<T>> {
    depot: &'a Depot<B>,
    object: &'a mut T,
    resolver: R,
}

impl<'a, B: Backend, T, R: PutResolver<T>> PreparedPut<'a, B, T, R> {
    /// Run the put against the backend. On success the resolver's
    /// `after_put` hook runs (writing back a generated id), then the
    /// change scope is announced, but only if the write had effect:
    /// `Updated { rows: 0 }` publishes nothing.
    pub fn execute(&mut self) -> Result<PutOutcome> {
        let changes = self.resolver.affects(self.object);
        let outcome = self
            .resolver
            .perform_put(self.depot.backend(), self.object)
            .map_err(|e| Error::operation(format!("put affecting {changes}"), e))?;
        self.resolver.after_put(self.object, &outcome);
        if outcome.has_effect() {
            self.depot.notify(changes);
        }
        Ok(outcome)
    }

    /// One-shot stream around [`PreparedPut::execute`].
    pub fn into_stream(mut self) -> impl Stream<Item = Result<PutOutcome>> {
        stream::once(async move { self.execute() })
    }
}

pub struct PutObjectsBuilder<'a, B: Backend, T, R> {
    depot: &'a Depot<B>,
    objects: &'a mut [T],
    resolver: R,
}

impl<'a, B: Backend, T, R> PutObjectsBuilder<'a, B, T, R> {
    /// Replace the resolver.
    pub fn with_resolver<R2: PutResolver<T>>(
        self,
        resolver: R2,
    ) -> PutObjectsBuilder<'a, B, T, R2> {
        PutObjectsBuilder {
            depot: self.depot,
            objects: self.objects,
            resolver,
        }
    }

    pub fn prepare(self) -> Result<PreparedPutObjects<'a, B, T, R>>
    where
        R: PutResolver<T>,
    {
        Ok(PreparedPutObjects {
            depot: self.depot,
            objects: self.objects,
            resolver: self.resolver,
        })
    }
}

/// A prepared batch put.
///
/// The whole batch runs inside one transaction scope: subscribers see at
/// most one aggregated event, and a failing element rolls every earlier
/// write of the batch back (on backends without transaction support the
/// notification aggregation still holds but earlier writes stay).
pub struct PreparedPutObjects<'a, B: Backend, T, R: PutResolver<T>> {
    depot: &'a Depot<B>,
    objects: &'a mut [T],
    resolver: R,
}

impl<'a, B: Backend, T, R: PutResolver<T>> PreparedPutObjects<'a, B, T, R> {
    /// Put every object in order; returns one outcome per object.
    pub fn execute(&mut self) -> Result<Vec<PutOutcome>> {
        let mut tx = self.depot.begin_transaction()?;
        let mut outcomes = Vec::with_capacity(self.objects.len());
        for object in self.objects.iter_mut() {
            let changes = self.resolver.affects(object);
            let outcome = self
                .resolver
                .perform_put(self.depot.backend(), object)
                .map_err(|e| Error::operation(format!("put affecting {changes}"), e))?;
            self.resolver.after_put(object, &outcome);
            if outcome.has_effect() {
                self.depot.notify(changes);
            }
            outcomes.push(outcome);
        }
        tx.mark_successful()?;
        tx.end()?;
        Ok(outcomes)
    }

    /// One-shot stream around [`PreparedPutObjects::execute`].
    pub fn into_stream(mut self) -> impl Stream<Item = Result<Vec<PutOutcome>>> {
        stream::once(async move { self.execute() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{StubBackend, TestUser, idle};
    use futures::StreamExt;

    #[tokio::test]
    async fn null_identity_inserts_and_writes_back_the_id() {
        let depot = Depot::new(StubBackend::default());
        let mut observer = depot.observe_table("users");
        let mut user = TestUser::named("Ann");

        let outcome = depot.put().object(&mut user).prepare().unwrap().execute().unwrap();

        assert_eq!(outcome, PutOutcome::Inserted { id: 1 });
        assert_eq!(user.id, Some(1));
        assert!(observer.next().await.is_some());
    }

    #[tokio::test]
    async fn present_identity_updates() {
        let depot = Depot::new(StubBackend::default());
        let mut user = TestUser {
            id: Some(42),
            name: "Ann".into(),
        };

        let outcome = depot.put().object(&mut user).prepare().unwrap().execute().unwrap();

        assert_eq!(outcome, PutOutcome::Updated { rows: 1 });
        assert_eq!(user.id, Some(42));
    }

    #[tokio::test]
    async fn update_of_zero_rows_publishes_nothing() {
        let depot = Depot::new(StubBackend::with_update_rows(0));
        let mut observer = depot.observe_table("users");
        let mut user = TestUser {
            id: Some(42),
            name: "Ann".into(),
        };

        let outcome = depot.put().object(&mut user).prepare().unwrap().execute().unwrap();

        assert_eq!(outcome, PutOutcome::Updated { rows: 0 });
        idle(&mut observer).await;
    }

    #[tokio::test]
    async fn backend_failure_surfaces_as_operation_error() {
        let depot = Depot::new(StubBackend::failing());
        let mut observer = depot.observe_table("users");
        let mut user = TestUser::named("Ann");

        let err = depot
            .put()
            .object(&mut user)
            .prepare()
            .unwrap()
            .execute()
            .unwrap_err();

        assert!(matches!(err, Error::Operation { .. }));
        assert_eq!(user.id, None);
        idle(&mut observer).await;
    }

    #[tokio::test]
    async fn batch_put_publishes_one_aggregated_event() {
        let depot = Depot::new(StubBackend::default());
        let mut observer = depot.observe_table("users");
        let mut users = [TestUser::named("Ann"), TestUser::named("Bob")];

        let outcomes = depot
            .put()
            .objects(&mut users)
            .prepare()
            .unwrap()
            .execute()
            .unwrap();

        assert_eq!(
            outcomes,
            [PutOutcome::Inserted { id: 1 }, PutOutcome::Inserted { id: 2 }]
        );
        assert_eq!(users[0].id, Some(1));
        assert_eq!(users[1].id, Some(2));
        assert!(observer.next().await.is_some());
        idle(&mut observer).await;
        assert_eq!(
            depot.backend().transaction_log(),
            ["begin", "set_successful", "end"]
        );
    }

    #[tokio::test]
    async fn failing_batch_rolls_back_and_stays_silent() {
        let depot = Depot::new(StubBackend::failing());
        let mut observer = depot.observe_table("users");
        let mut users = [TestUser::named("Ann"), TestUser::named("Bob")];

        let err = depot
            .put()
            .objects(&mut users)
            .prepare()
            .unwrap()
            .execute()
            .unwrap_err();

        assert!(matches!(err, Error::Operation { .. }));
        idle(&mut observer).await;
        assert_eq!(depot.backend().transaction_log(), ["begin", "end"]);
    }

    #[tokio::test]
    async fn ineffective_batch_publishes_nothing() {
        let depot = Depot::new(StubBackend::with_update_rows(0));
        let mut observer = depot.observe_table("users");
        let mut users = [TestUser {
            id: Some(1),
            name: "Ann".into(),
        }];

        let outcomes = depot
            .put()
            .objects(&mut users)
            .prepare()
            .unwrap()
            .execute()
            .unwrap();

        assert_eq!(outcomes, [PutOutcome::Updated { rows: 0 }]);
        idle(&mut observer).await;
    }

    #[tokio::test]
    async fn one_shot_stream_emits_the_outcome() {
        let depot = Depot::new(StubBackend::default());
        let mut user = TestUser::named("Ann");

        let prepared = depot.put().object(&mut user).prepare().unwrap();
        let results: Vec<_> = prepared.into_stream().collect().await;

        assert_eq!(results.len(), 1);
        assert_eq!(*results[0].as_ref().unwrap(), PutOutcome::Inserted { id: 1 });
    }
}
