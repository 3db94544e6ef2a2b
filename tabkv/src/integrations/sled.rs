use std::error::Error;
use std::fmt::Display;

use sled::IVec;

use crate::{BatchOp, Cursor, Storage};

/// Error type for [`SledStorage`] operations.
#[derive(Debug)]
pub enum SledStorageError {
    /// Sled database error
    Sled(sled::Error),
}

impl Display for SledStorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sled(e) => write!(f, "Sled error: {e}"),
        }
    }
}

impl Error for SledStorageError {}

impl From<sled::Error> for SledStorageError {
    fn from(e: sled::Error) -> Self {
        Self::Sled(e)
    }
}

/// A sled-based storage implementation.
///
/// Sled applies batches atomically, so entity operations on this backend are
/// all-or-nothing instead of relying on compensating deletes.
#[derive(Debug, Clone)]
pub struct SledStorage {
    db: sled::Db,
}

impl SledStorage {
    /// Create a new temporary sled storage, removed when dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created.
    pub fn new() -> Result<Self, SledStorageError> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    /// Open a sled database at the specified path
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, SledStorageError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Create a sled database with custom configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn with_config(config: &sled::Config) -> Result<Self, SledStorageError> {
        let db = config.open()?;
        Ok(Self { db })
    }

    /// Get a reference to the underlying sled database
    #[must_use]
    pub fn db(&self) -> &sled::Db {
        &self.db
    }

    fn cursor(&self, start: &[u8], end: &[u8], reverse: bool) -> Result<SledCursor, SledStorageError> {
        let mut iter: Box<dyn Iterator<Item = sled::Result<(IVec, IVec)>>> = if start >= end {
            Box::new(std::iter::empty())
        } else if reverse {
            Box::new(self.db.range(start..end).rev())
        } else {
            Box::new(self.db.range(start..end))
        };
        let current = iter.next().transpose()?;
        Ok(SledCursor { iter, current })
    }
}

/// Cursor over a [`SledStorage`] range.
pub struct SledCursor {
    iter: Box<dyn Iterator<Item = sled::Result<(IVec, IVec)>>>,
    current: Option<(IVec, IVec)>,
}

impl Cursor for SledCursor {
    type Error = SledStorageError;

    fn entry(&self) -> Option<(&[u8], &[u8])> {
        self.current
            .as_ref()
            .map(|(key, value)| (key.as_ref(), value.as_ref()))
    }

    fn advance(&mut self) -> Result<(), Self::Error> {
        self.current = self.iter.next().transpose()?;
        Ok(())
    }
}

impl Storage for SledStorage {
    type Error = SledStorageError;
    type Cursor<'a> = SledCursor;

    const ATOMIC_BATCH: bool = true;

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Self::Error> {
        Ok(self.db.get(key)?.map(|ivec| ivec.to_vec()))
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), Self::Error> {
        self.db.insert(key, value)?;
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), Self::Error> {
        self.db.remove(key)?;
        Ok(())
    }

    fn has(&self, key: &[u8]) -> Result<bool, Self::Error> {
        Ok(self.db.contains_key(key)?)
    }

    fn new_iterator<'a>(
        &'a self,
        start: &[u8],
        end: &[u8],
    ) -> Result<Self::Cursor<'a>, Self::Error> {
        self.cursor(start, end, false)
    }

    fn new_reverse_iterator<'a>(
        &'a self,
        start: &[u8],
        end: &[u8],
    ) -> Result<Self::Cursor<'a>, Self::Error> {
        self.cursor(start, end, true)
    }

    fn batch(&mut self, ops: Vec<BatchOp>) -> Result<(), Self::Error> {
        let mut batch = sled::Batch::default();

        for op in ops {
            match op {
                BatchOp::Insert { key, value } => {
                    batch.insert(key, value);
                }
                BatchOp::Delete { key } => {
                    batch.remove(key);
                }
            }
        }

        self.db.apply_batch(batch)?;
        Ok(())
    }
}
