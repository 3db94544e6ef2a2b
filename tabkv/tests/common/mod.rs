#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use tabkv::{
    BatchOp, Cursor, MemoryCursor, MemoryStorage, SchemaError, Storage, Table, TableBuilder,
    columns,
};
use thiserror::Error;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Demo {
    pub name: String,
    pub owner: String,
    pub title: String,
    pub like_count: u64,
    pub tag: Option<String>,
}

columns![Demo {
    name: String = 1,
    owner: String = 2,
    title: String = 3,
    like_count: u64 = 4,
    tag: Option<String> = 5,
}];

impl Demo {
    pub fn new(owner: &str, title: &str, like_count: u64) -> Self {
        Self {
            owner: owner.into(),
            title: title.into(),
            like_count,
            ..Self::default()
        }
    }
}

fn indexed(builder: TableBuilder<Demo, String>) -> TableBuilder<Demo, String> {
    builder
        .sort(Demo::LIKE_COUNT)
        .sort(Demo::OWNER)
        .unique(Demo::TITLE)
}

/// One blob per record, likes and owner sorted, title unique.
pub fn demo_table() -> Result<Table<Demo, String>, SchemaError> {
    indexed(Table::builder("demo", Demo::NAME)).build()
}

/// Same indexes as [`demo_table`], one cell per column.
pub fn split_demo_table() -> Result<Table<Demo, String>, SchemaError> {
    indexed(Table::builder("demo", Demo::NAME).split().columns(Demo::columns())).build()
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FaultError {
    #[error("injected fault on put #{0}")]
    Put(usize),
    #[error("injected fault on delete")]
    Delete,
    #[error("memory storage failed")]
    Memory,
}

/// A [`MemoryStorage`] that fails chosen writes. With `ATOMIC` set it
/// advertises an atomic batch and applies batches all or nothing.
#[derive(Debug, Default)]
pub struct FaultyStorage<const ATOMIC: bool> {
    pub inner: MemoryStorage,
    pub batches: usize,
    puts: usize,
    deletes: usize,
    fail_put: Option<usize>,
    fail_delete: Option<usize>,
    fail_deletes: bool,
}

impl<const ATOMIC: bool> FaultyStorage<ATOMIC> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the `nth` put from now on, counting from one.
    pub fn fail_put(&mut self, nth: usize) {
        self.puts = 0;
        self.fail_put = Some(nth);
    }

    /// Fails the `nth` delete from now on, counting from one.
    pub fn fail_delete(&mut self, nth: usize) {
        self.deletes = 0;
        self.fail_delete = Some(nth);
    }

    pub fn fail_deletes(&mut self) {
        self.fail_deletes = true;
    }

    pub fn heal(&mut self) {
        self.fail_put = None;
        self.fail_delete = None;
        self.fail_deletes = false;
    }
}

pub struct FaultyCursor<'a>(MemoryCursor<'a>);

impl Cursor for FaultyCursor<'_> {
    type Error = FaultError;

    fn entry(&self) -> Option<(&[u8], &[u8])> {
        self.0.entry()
    }

    fn advance(&mut self) -> Result<(), FaultError> {
        self.0.advance().map_err(|_| FaultError::Memory)
    }
}

impl<const ATOMIC: bool> Storage for FaultyStorage<ATOMIC> {
    type Error = FaultError;
    type Cursor<'a> = FaultyCursor<'a>;

    const ATOMIC_BATCH: bool = ATOMIC;

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, FaultError> {
        self.inner.get(key).map_err(|_| FaultError::Memory)
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), FaultError> {
        self.puts += 1;
        if self.fail_put == Some(self.puts) {
            return Err(FaultError::Put(self.puts));
        }
        self.inner.put(key, value).map_err(|_| FaultError::Memory)
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), FaultError> {
        self.deletes += 1;
        if self.fail_deletes || self.fail_delete == Some(self.deletes) {
            return Err(FaultError::Delete);
        }
        self.inner.delete(key).map_err(|_| FaultError::Memory)
    }

    fn new_iterator<'a>(&'a self, start: &[u8], end: &[u8]) -> Result<FaultyCursor<'a>, FaultError> {
        let cursor = self
            .inner
            .new_iterator(start, end)
            .map_err(|_| FaultError::Memory)?;
        Ok(FaultyCursor(cursor))
    }

    fn new_reverse_iterator<'a>(
        &'a self,
        start: &[u8],
        end: &[u8],
    ) -> Result<FaultyCursor<'a>, FaultError> {
        let cursor = self
            .inner
            .new_reverse_iterator(start, end)
            .map_err(|_| FaultError::Memory)?;
        Ok(FaultyCursor(cursor))
    }

    fn batch(&mut self, ops: Vec<BatchOp>) -> Result<(), FaultError> {
        self.batches += 1;
        if !ATOMIC {
            for op in ops {
                match op {
                    BatchOp::Insert { key, value } => self.put(&key, &value)?,
                    BatchOp::Delete { key } => self.delete(&key)?,
                }
            }
            return Ok(());
        }

        let puts = ops
            .iter()
            .filter(|op| matches!(op, BatchOp::Insert { .. }))
            .count();
        let first = self.puts + 1;
        self.puts += puts;
        if let Some(nth) = self.fail_put.filter(|nth| (first..=self.puts).contains(nth)) {
            return Err(FaultError::Put(nth));
        }
        let deletes = ops.iter().any(|op| matches!(op, BatchOp::Delete { .. }));
        if deletes && self.fail_deletes {
            return Err(FaultError::Delete);
        }
        self.inner.batch(ops).map_err(|_| FaultError::Memory)
    }
}
