use crate::{Backend, Changes, Depot, Error, Result};

impl<B: Backend> Depot<B> {
    /// Open a transaction scope.
    ///
    /// While any [`Transaction`] guard is alive, writes route their
    /// change scopes into a shared pending set instead of the bus; no
    /// subscriber observes a partially committed batch. Nested calls
    /// reuse the outer transaction (reference counted): only the
    /// outermost [`Transaction::end`] touches the backend and publishes.
    ///
    /// Transactions on one `Depot` share a single scope; interleaving
    /// them from multiple threads requires the same external discipline
    /// the backing store itself would.
    pub fn begin_transaction(&self) -> Result<Transaction<'_, B>> {
        let mut tx = self.tx.lock().expect("transaction state lock poisoned");
        if tx.depth == 0 {
            if self.backend.supports_transactions() {
                self.backend
                    .begin_transaction()
                    .map_err(|e| Error::operation("transaction begin", e))?;
            }
            tx.any_rollback = false;
            tx.pending.clear();
        }
        tx.depth += 1;
        Ok(Transaction {
            depot: self,
            marked: false,
            done: false,
        })
    }
}

/// Scoped transaction guard.
///
/// The idiom mirrors the classic begin/setSuccessful/end discipline:
///
/// ```text
/// let mut tx = depot.begin_transaction()?;
/// // ... writes ...
/// tx.mark_successful()?;
/// tx.end()?;
/// ```
///
/// Ending (or dropping) the guard without [`Transaction::mark_successful`]
/// is a rollback: the backend transaction is rolled back and all pending
/// change notifications are discarded. An error thrown by a write inside
/// the scope leaves the transaction open; it is this guard going out of
/// scope that closes it on every exit path.
pub struct Transaction<'d, B: Backend> {
    depot: &'d Depot<B>,
    marked: bool,
    done: bool,
}

impl<B: Backend> Transaction<'_, B> {
    /// Flag this scope to commit. Calling it twice is an error.
    pub fn mark_successful(&mut self) -> Result<()> {
        if self.marked {
            return Err(Error::transaction_state(
                "transaction already marked successful",
            ));
        }
        self.marked = true;
        Ok(())
    }

    /// Close the scope. On the outermost guard this commits (if every
    /// guard in the scope was marked successful) or rolls back, and on
    /// commit publishes the union of all pending changes as exactly one
    /// event, and only after the backend commit succeeded.
    pub fn end(mut self) -> Result<()> {
        self.finish()
    }

    fn finish(&mut self) -> Result<()> {
        self.done = true;
        let (commit, pending) = {
            let mut tx = self
                .depot
                .tx
                .lock()
                .expect("transaction state lock poisoned");
            tx.depth -= 1;
            if !self.marked {
                tx.any_rollback = true;
            }
            if tx.depth > 0 {
                return Ok(());
            }
            let commit = !tx.any_rollback;
            tx.any_rollback = false;
            (commit, std::mem::take(&mut tx.pending))
        };
        let backend = self.depot.backend();
        if backend.supports_transactions() {
            if commit {
                backend
                    .set_transaction_successful()
                    .and_then(|()| backend.end_transaction())
                    .map_err(|e| Error::operation("transaction commit", e))?;
            } else {
                backend
                    .end_transaction()
                    .map_err(|e| Error::operation("transaction rollback", e))?;
            }
        }
        if commit {
            let mut merged: Option<Changes> = None;
            for changes in pending {
                match &mut merged {
                    None => merged = Some(changes),
                    Some(m) => m.merge(&changes),
                }
            }
            if let Some(changes) = merged {
                log::debug!("transaction committed, notifying {changes}");
                self.depot.bus.publish(&changes);
            }
        } else if !pending.is_empty() {
            log::debug!(
                "transaction rolled back, discarding {} pending change set(s)",
                pending.len()
            );
        }
        Ok(())
    }
}

impl<B: Backend> Drop for Transaction<'_, B> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        if let Err(e) = self.finish() {
            log::error!("closing dropped transaction failed: {e:#}");
        }
    }
}
