use core::fmt::{Debug, Display};

/// A single write of a [`Storage::batch`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Insert { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

/// A positioned iterator over a key range of a [`Storage`].
///
/// A fresh cursor is positioned on the first entry of its range, if any.
pub trait Cursor {
    type Error;

    /// The entry under the cursor, or `None` once the range is exhausted.
    fn entry(&self) -> Option<(&[u8], &[u8])>;

    /// Moves to the next entry in iteration order.
    ///
    /// # Errors
    ///
    /// Returns the backend error if the next entry cannot be read.
    fn advance(&mut self) -> Result<(), Self::Error>;

    fn valid(&self) -> bool {
        self.entry().is_some()
    }

    fn key(&self) -> Option<&[u8]> {
        self.entry().map(|(key, _)| key)
    }

    fn value(&self) -> Option<&[u8]> {
        self.entry().map(|(_, value)| value)
    }

    /// Releases the resources held by the cursor.
    fn release(self)
    where
        Self: Sized,
    {
    }
}

/// An ordered key-value store, the backend of every table.
///
/// Keys are compared byte-lexicographically. Implementations must not hold
/// any record level knowledge: all structure lives in the keys produced by
/// [`codec`](crate::codec).
pub trait Storage {
    /// Error type returned by storage operations.
    type Error: Debug + Display;
    /// Cursor type returned by the iterator constructors.
    type Cursor<'a>: Cursor<Error = Self::Error>
    where
        Self: 'a;

    /// Whether [`Storage::batch`] applies all of its operations or none.
    const ATOMIC_BATCH: bool = false;

    /// Should retrieve the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns the backend error if the read fails.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Should store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns the backend error if the write fails.
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), Self::Error>;

    /// Should remove `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns the backend error if the write fails.
    fn delete(&mut self, key: &[u8]) -> Result<(), Self::Error>;

    /// Should return a cursor over `[start, end)` in ascending key order.
    ///
    /// # Errors
    ///
    /// Returns the backend error if the cursor cannot be created.
    fn new_iterator<'a>(&'a self, start: &[u8], end: &[u8])
    -> Result<Self::Cursor<'a>, Self::Error>;

    /// Should return a cursor over `[start, end)` in descending key order.
    ///
    /// # Errors
    ///
    /// Returns the backend error if the cursor cannot be created.
    fn new_reverse_iterator<'a>(
        &'a self,
        start: &[u8],
        end: &[u8],
    ) -> Result<Self::Cursor<'a>, Self::Error>;

    /// # Errors
    ///
    /// Returns the backend error if the read fails.
    fn has(&self, key: &[u8]) -> Result<bool, Self::Error> {
        Ok(self.get(key)?.is_some())
    }

    /// Calls `f` for every entry of `[start, end)` until it returns `false`.
    ///
    /// # Errors
    ///
    /// Returns the backend error if iteration fails.
    fn iterate<F>(&self, start: &[u8], end: &[u8], reverse: bool, mut f: F) -> Result<(), Self::Error>
    where
        F: FnMut(&[u8], &[u8]) -> bool,
    {
        let mut cursor = if reverse {
            self.new_reverse_iterator(start, end)?
        } else {
            self.new_iterator(start, end)?
        };
        while let Some((key, value)) = cursor.entry() {
            if !f(key, value) {
                break;
            }
            cursor.advance()?;
        }
        cursor.release();
        Ok(())
    }

    /// Applies a list of writes in order.
    ///
    /// The default stops at the first failure, leaving earlier writes in
    /// place. Backends that can do better set [`Storage::ATOMIC_BATCH`].
    ///
    /// # Errors
    ///
    /// Returns the first backend error.
    fn batch(&mut self, ops: Vec<BatchOp>) -> Result<(), Self::Error> {
        for op in ops {
            match op {
                BatchOp::Insert { key, value } => self.put(&key, &value)?,
                BatchOp::Delete { key } => self.delete(&key)?,
            }
        }
        Ok(())
    }
}
