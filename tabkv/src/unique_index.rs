use crate::{
    Column, Field, FieldValue, Record, RecordKey, Storage, Table, TableError,
    codec::KeyError,
    serialization::{decode_value, encode_value},
    table::IndexSpec,
};

/// A unique index over one column of a [`Table`].
///
/// Entries are keyed by `(prefix, value)` and carry the owning primary key.
pub struct UniqueIndex<'t, E, K, T> {
    table: &'t Table<E, K>,
    spec: &'t IndexSpec<E>,
    column: Column<E, T>,
}

impl<'t, E: Record, K: RecordKey, T: FieldValue> UniqueIndex<'t, E, K, T> {
    pub(crate) fn new(table: &'t Table<E, K>, spec: &'t IndexSpec<E>, column: Column<E, T>) -> Self {
        Self {
            table,
            spec,
            column,
        }
    }

    #[must_use]
    pub fn table(&self) -> &'t Table<E, K> {
        self.table
    }

    #[must_use]
    pub fn prefix(&self) -> &'t str {
        &self.spec.prefix
    }

    /// Claims `value` for `pk`.
    ///
    /// The check and the write are two separate store calls; concurrent
    /// writers claiming the same value must be serialized by the caller.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::AlreadyExists`] if the value is claimed.
    pub fn insert<S: Storage>(
        &self,
        store: &mut S,
        value: &T,
        pk: &K,
    ) -> Result<(), TableError<S::Error>> {
        let key = self.entry_key(value)?;
        if store.has(&key).map_err(TableError::Storage)? {
            return Err(TableError::AlreadyExists(self.column.name()));
        }
        let payload = encode_value(pk, self.table.serialization_config())?;
        store.put(&key, &payload).map_err(TableError::Storage)
    }

    /// Releases `value`. Releasing an unclaimed value is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::NilArgument`] for a nil value, or the storage
    /// failure.
    pub fn delete<S: Storage>(&self, store: &mut S, value: &T) -> Result<(), TableError<S::Error>> {
        let key = self.entry_key(value)?;
        store.delete(&key).map_err(TableError::Storage)
    }

    /// Returns the primary key that claimed `value`.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::NotFound`] if nobody claimed it.
    pub fn lookup<S: Storage>(&self, store: &S, value: &T) -> Result<K, TableError<S::Error>> {
        let key = self.entry_key(value)?;
        let payload = store
            .get(&key)
            .map_err(TableError::Storage)?
            .ok_or(TableError::NotFound)?;
        Ok(decode_value(&payload, self.table.serialization_config())?)
    }

    fn entry_key<X>(&self, value: &T) -> Result<Vec<u8>, TableError<X>> {
        let mut key = self.spec.key();
        key.push(value)
            .map_err(|e| TableError::from_key(self.column.name(), e))?;
        Ok(key.finish())
    }
}

/// Key of the unique entry for `record`: `(prefix, value)`.
pub(crate) fn entry_key<E>(spec: &IndexSpec<E>, record: &E) -> Result<Vec<u8>, KeyError> {
    let mut key = spec.key();
    spec.field.push_key(record, &mut key)?;
    Ok(key.finish())
}
