use crate::{
    Backend, DefaultResolver, DeleteQuery, DeleteResolver, Depot, Entity, Error, Result, stream,
};
use futures::Stream;

/// Entry point of `depot.delete()`.
pub struct DeleteBuilder<'a, B: Backend> {
    depot: &'a Depot<B>,
}

impl<'a, B: Backend> DeleteBuilder<'a, B> {
    pub(crate) fn new(depot: &'a Depot<B>) -> Self {
        Self { depot }
    }

    /// Delete every row matching a query.
    pub fn by_query(self, query: DeleteQuery) -> DeleteByQueryBuilder<'a, B> {
        DeleteByQueryBuilder {
            depot: self.depot,
            query,
        }
    }

    /// Delete the row backing an entity, through its default resolver.
    pub fn object<T: Entity>(self, object: &'a T) -> DeleteObjectBuilder<'a, B, T, DefaultResolver<T>> {
        DeleteObjectBuilder {
            depot: self.depot,
            object,
            resolver: DefaultResolver::new(),
        }
    }

    /// Delete any object through an explicit resolver.
    pub fn object_with<T, R: DeleteResolver<T>>(
        self,
        object: &'a T,
        resolver: R,
    ) -> DeleteObjectBuilder<'a, B, T, R> {
        DeleteObjectBuilder {
            depot: self.depot,
            object,
            resolver,
        }
    }

    /// Delete a batch of entities through their default resolver.
    pub fn objects<T: Entity>(
        self,
        objects: &'a [T],
    ) -> DeleteObjectsBuilder<'a, B, T, DefaultResolver<T>> {
        DeleteObjectsBuilder {
            depot: self.depot,
            objects,
            resolver: DefaultResolver::new(),
        }
    }

    /// Delete a batch of any objects through an explicit resolver.
    pub fn objects_with<T, R: DeleteResolver<T>>(
        self,
        objects: &'a [T],
        resolver: R,
    ) -> DeleteObjectsBuilder<'a, B, T, R> {
        DeleteObjectsBuilder {
            depot: self.depot,
            objects,
            resolver,
        }
    }
}

pub struct DeleteByQueryBuilder<'a, B: Backend> {
    depot: &'a Depot<B>,
    query: DeleteQuery,
}

impl<'a, B: Backend> DeleteByQueryBuilder<'a, B> {
    pub fn prepare(self) -> Result<PreparedDeleteByQuery<'a, B>> {
        Ok(PreparedDeleteByQuery {
            depot: self.depot,
            query: self.query,
        })
    }
}

/// A prepared delete-by-query. Affects its table plus the tags the query
/// declares.
pub struct PreparedDeleteByQuery<'a, B: Backend> {
    depot: &'a Depot<B>,
    query: DeleteQuery,
}

impl<'a, B: Backend> PreparedDeleteByQuery<'a, B> {
    /// Run the delete; announces the change scope only when at least one
    /// row was removed.
    pub fn execute(&self) -> Result<u64> {
        let rows = self
            .depot
            .backend()
            .delete(&self.query)
            .map_err(|e| Error::operation(format!("delete from table {}", self.query.table()), e))?;
        if rows > 0 {
            self.depot.notify(self.query.affects());
        }
        Ok(rows)
    }

    /// One-shot stream around [`PreparedDeleteByQuery::execute`].
    pub fn into_stream(self) -> impl Stream<Item = Result<u64>> {
        stream::once(async move { self.execute() })
    }
}

pub struct DeleteObjectBuilder<'a, B: Backend, T, R> {
    depot: &'a Depot<B>,
    object: &'a T,
    resolver: R,
}

impl<'a, B: Backend, T, R> DeleteObjectBuilder<'a, B, T, R> {
    /// Replace the resolver.
    pub fn with_resolver<R2: DeleteResolver<T>>(
        self,
        resolver: R2,
    ) -> DeleteObjectBuilder<'a, B, T, R2> {
        DeleteObjectBuilder {
            depot: self.depot,
            object: self.object,
            resolver,
        }
    }

    pub fn prepare(self) -> Result<PreparedDeleteObject<'a, B, T, R>>
    where
        R: DeleteResolver<T>,
    {
        Ok(PreparedDeleteObject {
            depot: self.depot,
            object: self.object,
            resolver: self.resolver,
        })
    }
}

/// A prepared delete of one object.
pub struct PreparedDeleteObject<'a, B: Backend, T, R: DeleteResolver<T>> {
    depot: &'a Depot<B>,
    object: &'a T,
    resolver: R,
}

impl<'a, B: Backend, T, R: DeleteResolver<T>> PreparedDeleteObject<'a, B, T, R> {
    pub fn execute(&self) -> Result<u64> {
        let changes = self.resolver.affects(self.object);
        let rows = self
            .resolver
            .perform_delete(self.depot.backend(), self.object)
            .map_err(|e| Error::operation(format!("delete affecting {changes}"), e))?;
        if rows > 0 {
            self.depot.notify(changes);
        }
        Ok(rows)
    }

    /// One-shot stream around [`PreparedDeleteObject::execute`].
    pub fn into_stream(self) -> impl Stream<Item = Result<u64>> {
        stream::once(async move { self.execute() })
    }
}

pub struct DeleteObjectsBuilder<'a, B: Backend, T, R> {
    depot: &'a Depot<B>,
    objects: &'a [T],
    resolver: R,
}

impl<'a, B: Backend, T, R> DeleteObjectsBuilder<'a, B, T, R> {
    /// Replace the resolver.
    pub fn with_resolver<R2: DeleteResolver<T>>(
        self,
        resolver: R2,
    ) -> DeleteObjectsBuilder<'a, B, T, R2> {
        DeleteObjectsBuilder {
            depot: self.depot,
            objects: self.objects,
            resolver,
        }
    }

    pub fn prepare(self) -> Result<PreparedDeleteObjects<'a, B, T, R>>
    where
        R: DeleteResolver<T>,
    {
        Ok(PreparedDeleteObjects {
            depot: self.depot,
            objects: self.objects,
            resolver: self.resolver,
        })
    }
}

/// A prepared batch delete.
///
/// The whole batch runs inside one transaction scope: subscribers see at
/// most one aggregated event, and a failing element rolls every earlier
/// delete of the batch back (on backends without transaction support the
/// notification aggregation still holds but earlier deletes stay).
pub struct PreparedDeleteObjects<'a, B: Backend, T, R: DeleteResolver<T>> {
    depot: &'a Depot<B>,
    objects: &'a [T],
    resolver: R,
}

impl<'a, B: Backend, T, R: DeleteResolver<T>> PreparedDeleteObjects<'a, B, T, R> {
    /// Delete every object in order; returns the rows removed per object.
    pub fn execute(&self) -> Result<Vec<u64>> {
        let mut tx = self.depot.begin_transaction()?;
        let mut removed = Vec::with_capacity(self.objects.len());
        for object in self.objects {
            let changes = self.resolver.affects(object);
            let rows = self
                .resolver
                .perform_delete(self.depot.backend(), object)
                .map_err(|e| Error::operation(format!("delete affecting {changes}"), e))?;
            if rows > 0 {
                self.depot.notify(changes);
            }
            removed.push(rows);
        }
        tx.mark_successful()?;
        tx.end()?;
        Ok(removed)
    }

    /// One-shot stream around [`PreparedDeleteObjects::execute`].
    pub fn into_stream(self) -> impl Stream<Item = Result<Vec<u64>>> {
        stream::once(async move { self.execute() })
    }
}
