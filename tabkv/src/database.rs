use crate::{
    FieldValue, Record, RecordKey, Storage, Table, TableError, unique_index::UniqueIndex,
    wrap::Wrap,
};

/// Owns a store and hands out entity handles over it.
pub struct Database<S: Storage> {
    store: S,
}

impl<S: Storage> Database<S> {
    /// Creates a new [`Database`] over any storage backend.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Handle to the record of `table` under `key`.
    pub fn entity<'a, E: Record, K: RecordKey>(
        &'a mut self,
        table: &'a Table<E, K>,
        key: K,
    ) -> Wrap<'a, S, E, K> {
        Wrap::new(&mut self.store, table, key)
    }

    /// Handle to the record that claimed `value` in a unique index, if any.
    ///
    /// # Errors
    ///
    /// Returns a [`TableError`] if the lookup fails.
    pub fn find_unique<'a, E: Record, K: RecordKey, T: FieldValue>(
        &'a mut self,
        index: &UniqueIndex<'a, E, K, T>,
        value: &T,
    ) -> Result<Option<Wrap<'a, S, E, K>>, TableError<S::Error>> {
        match index.lookup(&self.store, value) {
            Ok(key) => Ok(Some(Wrap::new(&mut self.store, index.table(), key))),
            Err(TableError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Consumes the database, returning the store.
    pub fn dissolve(self) -> S {
        self.store
    }
}
