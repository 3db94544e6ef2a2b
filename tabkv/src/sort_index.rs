use core::marker::PhantomData;

use tracing::trace;

use crate::{
    Column, Cursor, EncodingError, Field, FieldValue, Record, RecordKey, Storage, Table,
    TableError,
    codec::{self, KeyBuilder, KeyError},
    serialization::{ValueConfig, decode_value, encode_value},
    table::IndexSpec,
};

/// Scan direction of a sort index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Ascending by value, then by primary key.
    #[default]
    Forward,
    /// Descending by value, then by primary key.
    Backward,
}

/// Position of the last entry returned by a scan.
///
/// Passing it to the next scan continues strictly after (forward) or
/// before (backward) that entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Resume<K, T> {
    pub last_value: T,
    pub last_key: K,
}

impl<K, T> Resume<K, T> {
    pub fn new(last_key: K, last_value: T) -> Self {
        Self {
            last_value,
            last_key,
        }
    }
}

impl<K, T> From<(K, T)> for Resume<K, T> {
    fn from((last_key, last_value): (K, T)) -> Self {
        Self::new(last_key, last_value)
    }
}

/// A sort index over one column of a [`Table`].
///
/// Entries are keyed by `(prefix, value, pk)` and carry `(pk, value)`, so
/// scans never touch the primary records.
pub struct SortIndex<'t, E, K, T> {
    table: &'t Table<E, K>,
    spec: &'t IndexSpec<E>,
    column: Column<E, T>,
}

impl<'t, E: Record, K: RecordKey, T: FieldValue> SortIndex<'t, E, K, T> {
    pub(crate) fn new(table: &'t Table<E, K>, spec: &'t IndexSpec<E>, column: Column<E, T>) -> Self {
        Self {
            table,
            spec,
            column,
        }
    }

    #[must_use]
    pub fn prefix(&self) -> &'t str {
        &self.spec.prefix
    }

    /// Writes the entry of `pk` holding `value`.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::NilArgument`] for a nil value, or the encoding
    /// or storage failure.
    pub fn insert<S: Storage>(
        &self,
        store: &mut S,
        value: &T,
        pk: &K,
    ) -> Result<(), TableError<S::Error>> {
        let key = self.entry_key(value, pk)?;
        let payload = encode_value(&(pk, value), self.table.serialization_config())?;
        store.put(&key, &payload).map_err(TableError::Storage)
    }

    /// Removes the entry of `pk` holding `value`.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::NilArgument`] for a nil value, or the storage
    /// failure.
    pub fn delete<S: Storage>(
        &self,
        store: &mut S,
        value: &T,
        pk: &K,
    ) -> Result<(), TableError<S::Error>> {
        let key = self.entry_key(value, pk)?;
        store.delete(&key).map_err(TableError::Storage)
    }

    /// Removes the entry of `pk`, reading its current value from the
    /// primary store first.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::NotFound`] if the record does not exist.
    pub fn delete_by_pk<S: Storage>(&self, store: &mut S, pk: &K) -> Result<(), TableError<S::Error>> {
        let value = self.table.primary().get_field(store, pk, &self.column)?;
        self.delete(store, &value, pk)
    }

    /// Lazily scans entries in ascending order.
    ///
    /// `start` is inclusive and `end` exclusive; `None` leaves that side
    /// open. A `resume` token replaces the lower bound.
    ///
    /// # Errors
    ///
    /// Returns a [`TableError`] if a bound cannot be encoded or the cursor
    /// cannot be created.
    pub fn scan_forward<'s, S: Storage>(
        &self,
        store: &'s S,
        start: Option<&T>,
        end: Option<&T>,
        resume: Option<&Resume<K, T>>,
    ) -> Result<Scan<'s, S, K, T>, TableError<S::Error>> {
        let lower = match (resume, start) {
            (Some(resume), _) => {
                let mut key = self.resume_key(resume)?;
                key.push_min();
                key.finish()
            }
            (None, Some(start)) => self.bound(start, None)?,
            (None, None) => self.open_bound(codec::MIN_KEY),
        };
        let upper = match end {
            Some(end) => self.bound(end, None)?,
            None => self.open_bound(codec::MAX_KEY),
        };
        trace!(index = self.prefix(), "forward scan");
        let cursor = store
            .new_iterator(&lower, &upper)
            .map_err(TableError::Storage)?;
        Ok(Scan::new(cursor, self.table.serialization_config()))
    }

    /// Lazily scans entries in descending order.
    ///
    /// `start` is inclusive and `end` exclusive, so `start` is the larger
    /// bound. A `resume` token replaces the upper bound.
    ///
    /// # Errors
    ///
    /// Returns a [`TableError`] if a bound cannot be encoded or the cursor
    /// cannot be created.
    pub fn scan_backward<'s, S: Storage>(
        &self,
        store: &'s S,
        start: Option<&T>,
        end: Option<&T>,
        resume: Option<&Resume<K, T>>,
    ) -> Result<Scan<'s, S, K, T>, TableError<S::Error>> {
        let upper = match (resume, start) {
            (Some(resume), _) => self.resume_key(resume)?.finish(),
            (None, Some(start)) => self.bound(start, Some(codec::MAX_KEY))?,
            (None, None) => self.open_bound(codec::MAX_KEY),
        };
        let lower = match end {
            Some(end) => self.bound(end, Some(codec::MAX_KEY))?,
            None => self.open_bound(codec::MIN_KEY),
        };
        trace!(index = self.prefix(), "backward scan");
        let cursor = store
            .new_reverse_iterator(&lower, &upper)
            .map_err(TableError::Storage)?;
        Ok(Scan::new(cursor, self.table.serialization_config()))
    }

    /// Calls `f` with each entry and its position until it returns `false`.
    ///
    /// # Errors
    ///
    /// Returns the first scan failure.
    pub fn for_each<S: Storage, F>(
        &self,
        store: &S,
        direction: Direction,
        start: Option<&T>,
        end: Option<&T>,
        resume: Option<&Resume<K, T>>,
        mut f: F,
    ) -> Result<(), TableError<S::Error>>
    where
        F: FnMut(&K, &T, usize) -> bool,
    {
        let scan = match direction {
            Direction::Forward => self.scan_forward(store, start, end, resume)?,
            Direction::Backward => self.scan_backward(store, start, end, resume)?,
        };
        for (idx, entry) in scan.enumerate() {
            let (key, value) = entry?;
            if !f(&key, &value, idx) {
                break;
            }
        }
        Ok(())
    }

    fn entry_key<X>(&self, value: &T, pk: &K) -> Result<Vec<u8>, TableError<X>> {
        let mut key = self.spec.key();
        key.push(value)
            .map_err(|e| TableError::from_key(self.column.name(), e))?;
        key.push(pk)
            .map_err(|e| TableError::from_key(self.table.primary_column().name(), e))?;
        Ok(key.finish())
    }

    fn resume_key<X>(&self, resume: &Resume<K, T>) -> Result<KeyBuilder, TableError<X>> {
        let mut key = self.spec.key();
        key.push(&resume.last_value)
            .map_err(|e| TableError::from_key(self.column.name(), e))?;
        key.push(&resume.last_key)
            .map_err(|e| TableError::from_key(self.table.primary_column().name(), e))?;
        Ok(key)
    }

    fn bound<X>(&self, value: &T, suffix: Option<&[u8]>) -> Result<Vec<u8>, TableError<X>> {
        let mut key = self.spec.key();
        key.push(value)
            .map_err(|e| TableError::from_key(self.column.name(), e))?;
        if let Some(suffix) = suffix {
            key.push_encoded(suffix);
        }
        Ok(key.finish())
    }

    fn open_bound(&self, sentinel: &[u8]) -> Vec<u8> {
        let mut key = self.spec.key();
        key.push_encoded(sentinel);
        key.finish()
    }
}

/// Key of the sort entry for `record`: `(prefix, value, pk)`.
pub(crate) fn entry_key<E>(spec: &IndexSpec<E>, record: &E, pk: &[u8]) -> Result<Vec<u8>, KeyError> {
    let mut key = spec.key();
    spec.field.push_key(record, &mut key)?;
    key.push_encoded(pk);
    Ok(key.finish())
}

/// Payload of the sort entry for `record`.
///
/// Bincode writes a pair as its two elements back to back, so the payload is
/// the serialized primary key followed by the serialized field value.
pub(crate) fn entry_payload<E>(
    spec: &IndexSpec<E>,
    record: &E,
    pk_value: &[u8],
    config: ValueConfig,
) -> Result<Vec<u8>, EncodingError> {
    let mut payload = pk_value.to_vec();
    payload.extend(spec.field.encode_cell(record, config)?);
    Ok(payload)
}

/// A lazy scan over a sort index, yielding `(pk, value)` pairs.
///
/// The underlying cursor is released when the scan is exhausted, dropped or
/// explicitly [released](Scan::release).
pub struct Scan<'s, S: Storage + 's, K, T> {
    cursor: Option<S::Cursor<'s>>,
    config: ValueConfig,
    _marker: PhantomData<fn() -> (K, T)>,
}

impl<'s, S: Storage + 's, K, T> Scan<'s, S, K, T> {
    fn new(cursor: S::Cursor<'s>, config: ValueConfig) -> Self {
        Self {
            cursor: Some(cursor),
            config,
            _marker: PhantomData,
        }
    }

    /// Stops the scan and releases the store cursor.
    pub fn release(mut self) {
        self.close();
    }

    fn close(&mut self) {
        if let Some(cursor) = self.cursor.take() {
            cursor.release();
        }
    }
}

impl<'s, S, K, T> Iterator for Scan<'s, S, K, T>
where
    S: Storage + 's,
    K: RecordKey,
    T: FieldValue,
{
    type Item = Result<(K, T), TableError<S::Error>>;

    fn next(&mut self) -> Option<Self::Item> {
        let cursor = self.cursor.as_mut()?;
        let decoded = match cursor.entry() {
            Some((_, payload)) => decode_value::<(K, T)>(payload, self.config),
            None => {
                self.close();
                return None;
            }
        };
        if let Err(e) = cursor.advance() {
            self.close();
            return Some(Err(TableError::Storage(e)));
        }
        Some(decoded.map_err(TableError::from))
    }
}

impl<'s, S: Storage + 's, K, T> Drop for Scan<'s, S, K, T> {
    fn drop(&mut self) {
        self.close();
    }
}
