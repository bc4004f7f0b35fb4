use crate::{Backend, Depot, Error, RawQuery, Result, stream};
use futures::Stream;

/// Entry point of `depot.exec_raw()`.
pub struct ExecRawBuilder<'a, B: Backend> {
    depot: &'a Depot<B>,
    query: Option<RawQuery>,
}

impl<'a, B: Backend> ExecRawBuilder<'a, B> {
    pub(crate) fn new(depot: &'a Depot<B>) -> Self {
        Self { depot, query: None }
    }

    pub fn with_query(mut self, query: RawQuery) -> Self {
        self.query = Some(query);
        self
    }

    pub fn prepare(self) -> Result<PreparedExecRaw<'a, B>> {
        let query = self
            .query
            .ok_or_else(|| Error::configuration("exec_raw requires a raw query"))?;
        Ok(PreparedExecRaw {
            depot: self.depot,
            query,
        })
    }
}

/// A prepared raw statement.
///
/// The engine cannot see inside the statement, so notification relies
/// entirely on the scope the query declared: a statement with affected
/// tables or tags publishes them after success, one without publishes
/// nothing at all.
pub struct PreparedExecRaw<'a, B: Backend> {
    depot: &'a Depot<B>,
    query: RawQuery,
}

impl<'a, B: Backend> PreparedExecRaw<'a, B> {
    pub fn execute(&self) -> Result<()> {
        self.depot
            .backend()
            .exec_raw(&self.query)
            .map_err(|e| Error::operation(format!("raw exec `{}`", self.query.sql()), e))?;
        if let Some(changes) = self.query.affects() {
            self.depot.notify(changes);
        }
        Ok(())
    }

    /// One-shot stream around [`PreparedExecRaw::execute`].
    pub fn into_stream(self) -> impl Stream<Item = Result<()>> {
        stream::once(async move { self.execute() })
    }
}
