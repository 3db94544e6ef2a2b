use tracing::warn;

use crate::{BatchOp, Storage, TableError};

/// The writes of one multi-key operation.
///
/// On stores with an atomic batch every write is buffered and applied by
/// [`Writes::commit`]. Otherwise writes hit the store immediately and the
/// keys inserted so far are remembered so that [`Writes::undo`] can remove
/// them again.
pub(crate) struct Writes<'s, S: Storage> {
    store: &'s mut S,
    table: &'s str,
    pending: Option<Vec<BatchOp>>,
    inserted: Vec<Vec<u8>>,
    applied: usize,
}

impl<'s, S: Storage> Writes<'s, S> {
    pub(crate) fn new(store: &'s mut S, table: &'s str) -> Self {
        Self {
            store,
            table,
            pending: S::ATOMIC_BATCH.then(Vec::new),
            inserted: Vec::new(),
            applied: 0,
        }
    }

    pub(crate) fn put(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<(), TableError<S::Error>> {
        if let Some(pending) = &mut self.pending {
            pending.push(BatchOp::Insert { key, value });
            return Ok(());
        }
        self.store.put(&key, &value).map_err(TableError::Storage)?;
        self.inserted.push(key);
        self.applied += 1;
        Ok(())
    }

    pub(crate) fn delete(&mut self, key: Vec<u8>) -> Result<(), TableError<S::Error>> {
        if let Some(pending) = &mut self.pending {
            pending.push(BatchOp::Delete { key });
            return Ok(());
        }
        self.store.delete(&key).map_err(TableError::Storage)?;
        self.applied += 1;
        Ok(())
    }

    /// Applies buffered writes, if any.
    pub(crate) fn commit(self) -> Result<(), TableError<S::Error>> {
        match self.pending {
            Some(ops) if !ops.is_empty() => self.store.batch(ops).map_err(TableError::Storage),
            _ => Ok(()),
        }
    }

    /// Deletes every key inserted so far, newest first.
    ///
    /// Returns `cause` unchanged if nothing reached the store, otherwise a
    /// [`TableError::Consistency`] naming the cause and each failed delete.
    pub(crate) fn undo(self, cause: TableError<S::Error>) -> TableError<S::Error> {
        if self.applied == 0 {
            return cause;
        }
        let mut failures = Vec::new();
        for key in self.inserted.iter().rev() {
            if let Err(e) = self.store.delete(key) {
                warn!(table = self.table, error = %e, "rollback delete failed");
                failures.push(e.to_string());
            }
        }
        let mut message = format!(
            "{}: {cause}; rolled back {} of {} writes",
            self.table,
            self.inserted.len() - failures.len(),
            self.inserted.len()
        );
        if !failures.is_empty() {
            message.push_str(&format!("; rollback failed: {}", failures.join(", ")));
        }
        TableError::Consistency(message)
    }

    /// Gives up without compensation, logging when the store was left
    /// half updated.
    pub(crate) fn abandon(self, operation: &str, cause: TableError<S::Error>) -> TableError<S::Error> {
        if self.applied > 0 {
            warn!(
                table = self.table,
                operation,
                applied = self.applied,
                error = %cause,
                "operation half applied"
            );
        }
        cause
    }
}
