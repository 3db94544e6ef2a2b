//! Per-entity operations.
//!
//! A [`Wrap`] binds one primary key of one table to a store and keeps the
//! record, its sort entries and its unique entries in step. Stores without
//! an atomic batch get a best-effort saga: creates undo their own writes on
//! failure, while modifications and removals stop at the first failure and
//! log that the record was left half updated.

use tracing::debug;

use crate::{
    Column, Field, FieldRef, FieldValue, Record, RecordKey, Storage, StorageMode, Table,
    TableError,
    serialization::encode_value,
    sort_index, unique_index,
    table::Event,
    writes::Writes,
};

/// What a [`Wrap`] knows about the existence of its record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Existence {
    /// Not checked yet.
    #[default]
    Unknown,
    Absent,
    Present,
}

/// Handle to the record of `table` stored under `key`.
///
/// The handle caches whether the record exists and its encoded key, so it is
/// meant for a short sequence of operations by a single writer.
pub struct Wrap<'s, S: Storage, E, K> {
    store: &'s mut S,
    table: &'s Table<E, K>,
    key: K,
    existence: Existence,
    encoded_key: Option<Vec<u8>>,
}

impl<'s, S: Storage, E: Record, K: RecordKey> Wrap<'s, S, E, K> {
    pub fn new(store: &'s mut S, table: &'s Table<E, K>, key: K) -> Self {
        Self {
            store,
            table,
            key,
            existence: Existence::Unknown,
            encoded_key: None,
        }
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn existence(&self) -> Existence {
        self.existence
    }

    /// Whether the record exists, probing the store only once.
    ///
    /// # Errors
    ///
    /// Returns a [`TableError`] if the key cannot be encoded or the existence check fails.
    pub fn exists(&mut self) -> Result<bool, TableError<S::Error>> {
        match self.existence {
            Existence::Present => return Ok(true),
            Existence::Absent => return Ok(false),
            Existence::Unknown => {}
        }
        let pk = self.encoded_key()?;
        let exists = self.table.primary().exists_raw(&*self.store, &pk)?;
        self.existence = if exists {
            Existence::Present
        } else {
            Existence::Absent
        };
        Ok(exists)
    }

    /// # Errors
    ///
    /// Returns [`TableError::NotFound`] if the record does not exist.
    pub fn ensure_exists(&mut self) -> Result<(), TableError<S::Error>> {
        if self.exists()? {
            Ok(())
        } else {
            Err(TableError::NotFound)
        }
    }

    /// # Errors
    ///
    /// Returns [`TableError::AlreadyExists`] if the record exists.
    pub fn ensure_absent(&mut self) -> Result<(), TableError<S::Error>> {
        if self.exists()? {
            Err(TableError::AlreadyExists("record"))
        } else {
            Ok(())
        }
    }

    /// Creates the record from `E::default()` as modified by `init`.
    ///
    /// A primary key left at its default value is filled with the key of
    /// this handle. Every key is encoded and every unique value is checked
    /// before the first write.
    ///
    /// # Errors
    ///
    /// - [`TableError::AlreadyExists`] if the record or a unique value exists,
    ///   with nothing written.
    /// - [`TableError::NilArgument`] if an indexed field is nil.
    /// - [`TableError::PrimaryKeyMismatch`] if `init` set another key.
    /// - [`TableError::Consistency`] if a write failed after an earlier one
    ///   succeeded; the earlier writes have been deleted again unless the
    ///   message says otherwise.
    pub fn create<F: FnOnce(&mut E)>(&mut self, init: F) -> Result<(), TableError<S::Error>> {
        let table = self.table;
        let mut record = E::default();
        init(&mut record);

        let primary = table.primary_column();
        if *primary.get(&record) == K::default() {
            primary.set(&mut record, self.key.clone());
        } else if *primary.get(&record) != self.key {
            return Err(TableError::PrimaryKeyMismatch);
        }
        if self.exists()? {
            return Err(TableError::AlreadyExists("record"));
        }

        let pk = self.encoded_key()?;
        let config = table.serialization_config();
        let pk_value = encode_value(&self.key, config)?;

        let mut entries = table.primary().entries(&pk, &record)?;
        for spec in table.sort_specs() {
            let key = sort_index::entry_key(spec, &record, &pk)
                .map_err(|e| TableError::from_key(spec.field.name(), e))?;
            entries.push((
                key,
                sort_index::entry_payload(spec, &record, &pk_value, config)?,
            ));
        }
        for spec in table.unique_specs() {
            let key = unique_index::entry_key(spec, &record)
                .map_err(|e| TableError::from_key(spec.field.name(), e))?;
            if self.store.has(&key).map_err(TableError::Storage)? {
                return Err(TableError::AlreadyExists(spec.field.name()));
            }
            entries.push((key, pk_value.clone()));
        }

        let mut writes = Writes::new(&mut *self.store, table.name());
        for (key, value) in entries {
            if let Err(e) = writes.put(key, value) {
                return Err(writes.undo(e));
            }
        }
        writes.commit()?;

        self.existence = Existence::Present;
        debug!(table = table.name(), key = ?self.key, "record created");
        table.notify(&Event::Insert {
            key: &self.key,
            record: &record,
        });
        Ok(())
    }

    /// Reads the whole record.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::NotFound`] if the record does not exist.
    pub fn get(&mut self) -> Result<E, TableError<S::Error>> {
        let pk = self.encoded_key()?;
        let result = self.table.primary().get_raw(&*self.store, &pk);
        self.track(result)
    }

    /// Reads one field; split tables read only its cell.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::NotFound`] if the record does not exist.
    pub fn get_field<T: FieldValue>(
        &mut self,
        column: &Column<E, T>,
    ) -> Result<T, TableError<S::Error>> {
        let pk = self.encoded_key()?;
        let result = self.table.primary().get_field_raw(&*self.store, &pk, column);
        self.track(result)
    }

    /// Sets one field, moving its index entries along.
    ///
    /// Does nothing if the field already holds `value`. Split tables without
    /// watchers read and write only the affected cell.
    ///
    /// # Errors
    ///
    /// - [`TableError::PrimaryKeyImmutable`] for the primary key column.
    /// - [`TableError::NotFound`] if the record does not exist.
    /// - [`TableError::AlreadyExists`] if the new value of a unique field is
    ///   claimed, with nothing written.
    /// - [`TableError::NilArgument`] if an indexed field would become nil.
    pub fn set_field<T: FieldValue>(
        &mut self,
        column: &Column<E, T>,
        value: T,
    ) -> Result<(), TableError<S::Error>> {
        let table = self.table;
        if column.id() == table.primary_column().id() {
            return Err(TableError::PrimaryKeyImmutable);
        }
        if table.mode() == StorageMode::Combined || table.has_watchers() {
            return self.modify(|record| column.set(record, value));
        }
        if !table.columns().iter().any(|c| c.id() == column.id()) {
            return Err(TableError::Consistency(format!(
                "{}: column {} is not stored by this table",
                table.name(),
                column.name()
            )));
        }

        let pk = self.encoded_key()?;
        let result = table.primary().get_field_raw(&*self.store, &pk, column);
        let old = self.track(result)?;
        if old == value {
            return Ok(());
        }
        let mut before = E::default();
        column.set(&mut before, old);
        let mut after = E::default();
        column.set(&mut after, value);

        self.rewrite(&pk, &before, &after, |field| field.id() == column.id())?;
        debug!(table = table.name(), key = ?self.key, field = column.name(), "field updated");
        Ok(())
    }

    /// Applies `f` to the record and rewrites whatever it changed.
    ///
    /// Index entries are rewritten only for the columns whose value changed.
    ///
    /// # Errors
    ///
    /// Same as [`Wrap::set_field`].
    pub fn modify<F: FnOnce(&mut E)>(&mut self, f: F) -> Result<(), TableError<S::Error>> {
        let table = self.table;
        let pk = self.encoded_key()?;
        let result = table.primary().get_raw(&*self.store, &pk);
        let before = self.track(result)?;
        let mut after = before.clone();
        f(&mut after);

        let primary = table.primary_column();
        if primary.get(&before) != primary.get(&after) {
            return Err(TableError::PrimaryKeyImmutable);
        }
        let changed = match table.mode() {
            StorageMode::Combined => {
                let config = table.serialization_config();
                encode_value(&before, config)? != encode_value(&after, config)?
            }
            StorageMode::Split => table
                .columns()
                .iter()
                .any(|column| !column.same_value(&before, &after)),
        };
        if !changed {
            return Ok(());
        }

        self.rewrite(&pk, &before, &after, |field| {
            !field.same_value(&before, &after)
        })?;
        debug!(table = table.name(), key = ?self.key, "record updated");
        table.notify(&Event::Update {
            key: &self.key,
            before: &before,
            after: &after,
        });
        Ok(())
    }

    /// Removes the record with all of its index entries.
    ///
    /// Returns `false` if there was nothing to remove.
    ///
    /// # Errors
    ///
    /// Returns the first storage failure; entries deleted before it stay
    /// deleted.
    pub fn remove(&mut self) -> Result<bool, TableError<S::Error>> {
        if !self.exists()? {
            return Ok(false);
        }
        let table = self.table;
        let pk = self.encoded_key()?;
        let result = table.primary().get_raw(&*self.store, &pk);
        let record = match self.track(result) {
            Ok(record) => record,
            Err(TableError::NotFound) => return Ok(false),
            Err(e) => return Err(e),
        };

        let mut deletes = Vec::new();
        for spec in table.sort_specs() {
            deletes.push(
                sort_index::entry_key(spec, &record, &pk)
                    .map_err(|e| TableError::from_key(spec.field.name(), e))?,
            );
        }
        for spec in table.unique_specs() {
            deletes.push(
                unique_index::entry_key(spec, &record)
                    .map_err(|e| TableError::from_key(spec.field.name(), e))?,
            );
        }
        deletes.extend(table.primary().keys(&pk)?);

        let mut writes = Writes::new(&mut *self.store, table.name());
        if let Err(e) = apply(&mut writes, deletes, Vec::new()) {
            return Err(writes.abandon("remove", e));
        }
        writes.commit()?;

        self.existence = Existence::Absent;
        debug!(table = table.name(), key = ?self.key, "record removed");
        table.notify(&Event::Delete {
            key: &self.key,
            record: &record,
        });
        Ok(true)
    }

    /// Moves the index entries of the fields accepted by `changed` from
    /// `before` to `after` and writes the new field values.
    fn rewrite(
        &mut self,
        pk: &[u8],
        before: &E,
        after: &E,
        changed: impl Fn(&FieldRef<E>) -> bool,
    ) -> Result<(), TableError<S::Error>> {
        let table = self.table;
        let config = table.serialization_config();
        let pk_value = encode_value(&self.key, config)?;

        let mut deletes = Vec::new();
        let mut inserts = Vec::new();
        for spec in table.sort_specs().iter().filter(|s| changed(&s.field)) {
            let name = spec.field.name();
            deletes.push(
                sort_index::entry_key(spec, before, pk)
                    .map_err(|e| TableError::from_key(name, e))?,
            );
            inserts.push((
                sort_index::entry_key(spec, after, pk)
                    .map_err(|e| TableError::from_key(name, e))?,
                sort_index::entry_payload(spec, after, &pk_value, config)?,
            ));
        }
        for spec in table.unique_specs().iter().filter(|s| changed(&s.field)) {
            let name = spec.field.name();
            deletes.push(
                unique_index::entry_key(spec, before)
                    .map_err(|e| TableError::from_key(name, e))?,
            );
            let key = unique_index::entry_key(spec, after)
                .map_err(|e| TableError::from_key(name, e))?;
            if self.store.has(&key).map_err(TableError::Storage)? {
                return Err(TableError::AlreadyExists(name));
            }
            inserts.push((key, pk_value.clone()));
        }
        let mut puts = table.primary().changed_entries(pk, after, &changed)?;
        puts.extend(inserts);

        let mut writes = Writes::new(&mut *self.store, table.name());
        if let Err(e) = apply(&mut writes, deletes, puts) {
            return Err(writes.abandon("modify", e));
        }
        writes.commit()
    }

    fn encoded_key(&mut self) -> Result<Vec<u8>, TableError<S::Error>> {
        if let Some(pk) = &self.encoded_key {
            return Ok(pk.clone());
        }
        let pk = self.table.primary().encode_key(&self.key)?;
        self.encoded_key = Some(pk.clone());
        Ok(pk)
    }

    /// Updates the existence cache from the outcome of a record read.
    fn track<T>(
        &mut self,
        result: Result<T, TableError<S::Error>>,
    ) -> Result<T, TableError<S::Error>> {
        match &result {
            Ok(_) => self.existence = Existence::Present,
            Err(TableError::NotFound) => self.existence = Existence::Absent,
            Err(_) => {}
        }
        result
    }
}

/// Deletes, then puts, stopping at the first failure.
fn apply<S: Storage>(
    writes: &mut Writes<'_, S>,
    deletes: Vec<Vec<u8>>,
    puts: Vec<(Vec<u8>, Vec<u8>)>,
) -> Result<(), TableError<S::Error>> {
    for key in deletes {
        writes.delete(key)?;
    }
    for (key, value) in puts {
        writes.put(key, value)?;
    }
    Ok(())
}
