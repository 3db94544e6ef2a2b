use crate::{
    Column, EncodingError, Field, FieldRef, FieldValue, Record, RecordKey, Storage, StorageMode,
    Table, TableError,
    codec,
    serialization::{decode_value, encode_value},
    writes::Writes,
};

type Entry = (Vec<u8>, Vec<u8>);

/// Reads and writes the primary records of a [`Table`].
///
/// Combined tables keep one blob per record under `(prefix, pk)`. Split
/// tables keep one cell per column under `(prefix, field id, pk)`; the cell
/// of the primary key column marks that the record exists.
pub struct PrimaryStore<'t, E, K> {
    table: &'t Table<E, K>,
}

impl<E, K> Clone for PrimaryStore<'_, E, K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E, K> Copy for PrimaryStore<'_, E, K> {}

impl<'t, E: Record, K: RecordKey> PrimaryStore<'t, E, K> {
    pub(crate) fn new(table: &'t Table<E, K>) -> Self {
        Self { table }
    }

    /// # Errors
    ///
    /// Returns a [`TableError`] if the key cannot be encoded or the read fails.
    pub fn exists<S: Storage>(&self, store: &S, pk: &K) -> Result<bool, TableError<S::Error>> {
        self.exists_raw(store, &self.encode_key(pk)?)
    }

    /// Reads the whole record.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::NotFound`] if there is no record under `pk`.
    pub fn get<S: Storage>(&self, store: &S, pk: &K) -> Result<E, TableError<S::Error>> {
        self.get_raw(store, &self.encode_key(pk)?)
    }

    /// Reads a single field; split tables read only that field's cell.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::NotFound`] if there is no record under `pk`.
    pub fn get_field<S: Storage, T: FieldValue>(
        &self,
        store: &S,
        pk: &K,
        column: &Column<E, T>,
    ) -> Result<T, TableError<S::Error>> {
        self.get_field_raw(store, &self.encode_key(pk)?, column)
    }

    /// Writes the whole record, replacing what is stored under `pk`.
    ///
    /// # Errors
    ///
    /// Returns a [`TableError`] if encoding or a write fails; split writes
    /// stop at the first failing cell.
    pub fn put<S: Storage>(
        &self,
        store: &mut S,
        pk: &K,
        record: &E,
    ) -> Result<(), TableError<S::Error>> {
        let entries = self.entries(&self.encode_key(pk)?, record)?;
        let mut writes = Writes::new(store, self.table.name());
        for (key, value) in entries {
            if let Err(e) = writes.put(key, value) {
                return Err(writes.abandon("put", e));
            }
        }
        writes.commit()
    }

    /// Writes a single field. Combined tables rewrite the whole blob and
    /// need the record to exist.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::NotFound`] for a missing combined record, or
    /// the encoding or storage failure.
    pub fn put_field<S: Storage, T: FieldValue>(
        &self,
        store: &mut S,
        pk: &K,
        column: &Column<E, T>,
        value: &T,
    ) -> Result<(), TableError<S::Error>> {
        let pk = self.encode_key(pk)?;
        match self.table.mode() {
            StorageMode::Combined => {
                let mut record = self.get_raw(store, &pk)?;
                column.set(&mut record, value.clone());
                let blob = encode_value(&record, self.table.serialization_config())?;
                store
                    .put(&self.table.record_key(&pk), &blob)
                    .map_err(TableError::Storage)
            }
            StorageMode::Split => {
                let key = self.cell_key(column.id(), &pk)?;
                let cell = encode_value(value, self.table.serialization_config())?;
                store.put(&key, &cell).map_err(TableError::Storage)
            }
        }
    }

    /// Removes the record. Removing a missing record is not an error.
    ///
    /// # Errors
    ///
    /// Returns the first storage failure.
    pub fn delete<S: Storage>(&self, store: &mut S, pk: &K) -> Result<(), TableError<S::Error>> {
        let keys = self.keys(&self.encode_key(pk)?)?;
        let mut writes = Writes::new(store, self.table.name());
        for key in keys {
            if let Err(e) = writes.delete(key) {
                return Err(writes.abandon("delete", e));
            }
        }
        writes.commit()
    }

    pub(crate) fn encode_key<X>(&self, pk: &K) -> Result<Vec<u8>, TableError<X>> {
        codec::encode(pk).map_err(|e| TableError::from_key(self.table.primary_column().name(), e))
    }

    fn cell_key<X>(&self, field_id: u32, pk: &[u8]) -> Result<Vec<u8>, TableError<X>> {
        Ok(self
            .table
            .cell_key(field_id, pk)
            .map_err(EncodingError::from)?)
    }

    fn existence_key<X>(&self, pk: &[u8]) -> Result<Vec<u8>, TableError<X>> {
        match self.table.mode() {
            StorageMode::Combined => Ok(self.table.record_key(pk)),
            StorageMode::Split => self.cell_key(self.table.primary_column().id(), pk),
        }
    }

    pub(crate) fn exists_raw<S: Storage>(
        &self,
        store: &S,
        pk: &[u8],
    ) -> Result<bool, TableError<S::Error>> {
        store
            .has(&self.existence_key(pk)?)
            .map_err(TableError::Storage)
    }

    pub(crate) fn get_raw<S: Storage>(&self, store: &S, pk: &[u8]) -> Result<E, TableError<S::Error>> {
        let config = self.table.serialization_config();
        let marker = store
            .get(&self.existence_key(pk)?)
            .map_err(TableError::Storage)?
            .ok_or(TableError::NotFound)?;
        if self.table.mode() == StorageMode::Combined {
            return Ok(decode_value(&marker, config)?);
        }

        let primary_id = self.table.primary_column().id();
        let mut record = E::default();
        for column in self.table.columns() {
            if column.id() == primary_id {
                column.decode_cell(&mut record, &marker, config)?;
                continue;
            }
            let cell = store
                .get(&self.cell_key(column.id(), pk)?)
                .map_err(TableError::Storage)?
                .ok_or_else(|| self.missing_cell(column.name()))?;
            column.decode_cell(&mut record, &cell, config)?;
        }
        Ok(record)
    }

    pub(crate) fn get_field_raw<S: Storage, T: FieldValue>(
        &self,
        store: &S,
        pk: &[u8],
        column: &Column<E, T>,
    ) -> Result<T, TableError<S::Error>> {
        if self.table.mode() == StorageMode::Combined {
            return Ok(column.get(&self.get_raw(store, pk)?).clone());
        }
        let cell = store
            .get(&self.cell_key(column.id(), pk)?)
            .map_err(TableError::Storage)?;
        match cell {
            Some(bytes) => Ok(decode_value(&bytes, self.table.serialization_config())?),
            None if self.exists_raw(store, pk)? => Err(self.missing_cell(column.name())),
            None => Err(TableError::NotFound),
        }
    }

    /// Key-value pairs holding `record`; the existence marker comes last.
    pub(crate) fn entries<X>(&self, pk: &[u8], record: &E) -> Result<Vec<Entry>, TableError<X>> {
        self.changed_entries(pk, record, |_| true)
    }

    /// Like [`Self::entries`], restricted to the columns accepted by
    /// `changed` in split tables. Combined tables always rewrite the blob.
    pub(crate) fn changed_entries<X>(
        &self,
        pk: &[u8],
        record: &E,
        changed: impl Fn(&FieldRef<E>) -> bool,
    ) -> Result<Vec<Entry>, TableError<X>> {
        let config = self.table.serialization_config();
        if self.table.mode() == StorageMode::Combined {
            let blob = encode_value(record, config)?;
            return Ok(vec![(self.table.record_key(pk), blob)]);
        }
        let mut entries = Vec::with_capacity(self.table.columns().len());
        for column in self.split_order().filter(|c| changed(*c)) {
            entries.push((
                self.cell_key(column.id(), pk)?,
                column.encode_cell(record, config)?,
            ));
        }
        Ok(entries)
    }

    /// Every key of the record; the existence marker comes last.
    pub(crate) fn keys<X>(&self, pk: &[u8]) -> Result<Vec<Vec<u8>>, TableError<X>> {
        if self.table.mode() == StorageMode::Combined {
            return Ok(vec![self.table.record_key(pk)]);
        }
        self.split_order()
            .map(|column| self.cell_key(column.id(), pk))
            .collect()
    }

    fn split_order(&self) -> impl Iterator<Item = &'t FieldRef<E>> {
        let primary_id = self.table.primary_column().id();
        let columns = self.table.columns();
        columns
            .iter()
            .filter(move |c| c.id() != primary_id)
            .chain(columns.iter().filter(move |c| c.id() == primary_id))
    }

    fn missing_cell<X>(&self, field: &str) -> TableError<X> {
        TableError::Consistency(format!(
            "{}: cell {field} is missing from an existing record",
            self.table.name()
        ))
    }
}
