use std::{
    collections::BTreeMap,
    fmt::Display,
    ops::Bound,
    sync::atomic::{AtomicUsize, Ordering},
};

use crate::traits::{Cursor, Storage};

/// A memory-based storage implementation using a [`BTreeMap`].
///
/// Keeps all data in memory and counts the cursors that are still open,
/// which makes it the reference backend for tests.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    map: BTreeMap<Vec<u8>, Vec<u8>>,
    open_cursors: AtomicUsize,
}

/// Error type for [`MemoryStorage`] operations.
///
/// [`MemoryStorage`] operations don't actually fail, so this is an empty error type.
#[derive(Debug, PartialEq, Eq)]
pub struct MemoryStorageError;
impl Display for MemoryStorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Memory storage operations do not fail")
    }
}

impl std::error::Error for MemoryStorageError {}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Number of cursors created and not yet released.
    #[must_use]
    pub fn open_cursors(&self) -> usize {
        self.open_cursors.load(Ordering::Relaxed)
    }

    /// All stored keys, in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = &[u8]> {
        self.map.keys().map(Vec::as_slice)
    }

    fn cursor<'a>(&'a self, start: &[u8], end: &[u8], reverse: bool) -> MemoryCursor<'a> {
        self.open_cursors.fetch_add(1, Ordering::Relaxed);
        let mut iter: Box<dyn Iterator<Item = (&'a Vec<u8>, &'a Vec<u8>)> + 'a> = if start > end {
            Box::new(std::iter::empty())
        } else {
            let range = self
                .map
                .range::<[u8], _>((Bound::Included(start), Bound::Excluded(end)));
            if reverse {
                Box::new(range.rev())
            } else {
                Box::new(range)
            }
        };
        let current = iter.next();
        MemoryCursor {
            iter,
            current,
            open: &self.open_cursors,
        }
    }
}

/// Cursor over a [`MemoryStorage`] range.
pub struct MemoryCursor<'a> {
    iter: Box<dyn Iterator<Item = (&'a Vec<u8>, &'a Vec<u8>)> + 'a>,
    current: Option<(&'a Vec<u8>, &'a Vec<u8>)>,
    open: &'a AtomicUsize,
}

impl Cursor for MemoryCursor<'_> {
    type Error = MemoryStorageError;

    fn entry(&self) -> Option<(&[u8], &[u8])> {
        self.current
            .map(|(key, value)| (key.as_slice(), value.as_slice()))
    }

    fn advance(&mut self) -> Result<(), Self::Error> {
        self.current = self.iter.next();
        Ok(())
    }
}

impl Drop for MemoryCursor<'_> {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::Relaxed);
    }
}

impl Storage for MemoryStorage {
    type Error = MemoryStorageError;
    type Cursor<'a> = MemoryCursor<'a>;

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Self::Error> {
        Ok(self.map.get(key).cloned())
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), Self::Error> {
        self.map.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), Self::Error> {
        self.map.remove(key);
        Ok(())
    }

    fn has(&self, key: &[u8]) -> Result<bool, Self::Error> {
        Ok(self.map.contains_key(key))
    }

    fn new_iterator<'a>(
        &'a self,
        start: &[u8],
        end: &[u8],
    ) -> Result<Self::Cursor<'a>, Self::Error> {
        Ok(self.cursor(start, end, false))
    }

    fn new_reverse_iterator<'a>(
        &'a self,
        start: &[u8],
        end: &[u8],
    ) -> Result<Self::Cursor<'a>, Self::Error> {
        Ok(self.cursor(start, end, true))
    }
}
