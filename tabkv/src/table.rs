//! Table descriptors.
//!
//! A [`Table`] describes how records of one type are laid out in a store:
//! the key prefixes, the storage mode, the primary key column, the static
//! column list and the indexed columns. It is built once and shared by every
//! operation on that record type.

use core::fmt::{self, Debug};
use std::sync::Arc;

use crate::{
    Column, Field, FieldRef, FieldValue, Record, RecordKey, SchemaError,
    codec::{self, KeyBuilder},
    primary::PrimaryStore,
    serialization::ValueConfig,
    sort_index::SortIndex,
    unique_index::UniqueIndex,
};

/// How the record itself is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageMode {
    /// One serialized blob per record.
    #[default]
    Combined,
    /// One cell per column, keyed by field id.
    Split,
}

/// A change reported to table watchers after it was applied.
#[derive(Debug)]
pub enum Event<'a, E, K> {
    Insert {
        key: &'a K,
        record: &'a E,
    },
    /// `before` and `after` are full records, also in split tables.
    Update {
        key: &'a K,
        before: &'a E,
        after: &'a E,
    },
    Delete {
        key: &'a K,
        record: &'a E,
    },
}

/// Callback invoked for every applied [`Event`].
pub type Watcher<E, K> = Arc<dyn Fn(&Event<'_, E, K>) + Send + Sync>;

pub(crate) struct IndexSpec<E> {
    pub(crate) prefix: String,
    /// Encoded `prefix` component, the start of every entry key.
    pub(crate) prefix_key: Vec<u8>,
    pub(crate) field: FieldRef<E>,
}

impl<E> IndexSpec<E> {
    fn new(prefix: String, field: FieldRef<E>) -> Result<Self, SchemaError> {
        let prefix_key = prefix_key(&prefix)?;
        Ok(Self {
            prefix,
            prefix_key,
            field,
        })
    }

    pub(crate) fn key(&self) -> KeyBuilder {
        let mut key = KeyBuilder::new();
        key.push_encoded(&self.prefix_key);
        key
    }
}

fn prefix_key(prefix: &str) -> Result<Vec<u8>, SchemaError> {
    if prefix.is_empty() {
        return Err(SchemaError::EmptyName);
    }
    codec::encode(prefix).map_err(|_| SchemaError::EmptyName)
}

/// Descriptor of a record type `E` keyed by `K`.
pub struct Table<E, K> {
    name: String,
    prefix: String,
    prefix_key: Vec<u8>,
    mode: StorageMode,
    primary: Column<E, K>,
    columns: Vec<FieldRef<E>>,
    sort: Vec<IndexSpec<E>>,
    unique: Vec<IndexSpec<E>>,
    config: ValueConfig,
    watchers: Vec<Watcher<E, K>>,
}

impl<E: Record, K: RecordKey> Table<E, K> {
    /// Starts a descriptor for table `name`, keyed by the `primary` column.
    pub fn builder(name: impl Into<String>, primary: Column<E, K>) -> TableBuilder<E, K> {
        TableBuilder {
            name: name.into(),
            prefix: None,
            mode: StorageMode::Combined,
            primary,
            columns: Vec::new(),
            sort: Vec::new(),
            unique: Vec::new(),
            config: ValueConfig::standard(),
            watchers: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[must_use]
    pub fn mode(&self) -> StorageMode {
        self.mode
    }

    #[must_use]
    pub fn primary_column(&self) -> Column<E, K> {
        self.primary
    }

    /// The static column list; empty for combined tables declared without one.
    #[must_use]
    pub fn columns(&self) -> &[FieldRef<E>] {
        &self.columns
    }

    #[must_use]
    pub fn serialization_config(&self) -> ValueConfig {
        self.config
    }

    /// Prefixes of the sort indexes, in declaration order.
    pub fn sort_prefixes(&self) -> impl Iterator<Item = &str> {
        self.sort.iter().map(|spec| spec.prefix.as_str())
    }

    /// Prefixes of the unique indexes, in declaration order.
    pub fn unique_prefixes(&self) -> impl Iterator<Item = &str> {
        self.unique.iter().map(|spec| spec.prefix.as_str())
    }

    /// Handle to the primary record store of this table.
    #[must_use]
    pub fn primary(&self) -> PrimaryStore<'_, E, K> {
        PrimaryStore::new(self)
    }

    /// Handle to the sort index over `column`, if the table declares one.
    pub fn sort_index<T: FieldValue>(
        &self,
        column: &Column<E, T>,
    ) -> Option<SortIndex<'_, E, K, T>> {
        self.sort
            .iter()
            .find(|spec| spec.field.id() == column.id())
            .map(|spec| SortIndex::new(self, spec, *column))
    }

    /// Handle to the unique index over `column`, if the table declares one.
    pub fn unique_index<T: FieldValue>(
        &self,
        column: &Column<E, T>,
    ) -> Option<UniqueIndex<'_, E, K, T>> {
        self.unique
            .iter()
            .find(|spec| spec.field.id() == column.id())
            .map(|spec| UniqueIndex::new(self, spec, *column))
    }

    pub(crate) fn sort_specs(&self) -> &[IndexSpec<E>] {
        &self.sort
    }

    pub(crate) fn unique_specs(&self) -> &[IndexSpec<E>] {
        &self.unique
    }

    /// Key of a combined record: `(prefix, pk)`.
    pub(crate) fn record_key(&self, pk: &[u8]) -> Vec<u8> {
        let mut key = KeyBuilder::new();
        key.push_encoded(&self.prefix_key).push_encoded(pk);
        key.finish()
    }

    /// Key of a split cell: `(prefix, field id, pk)`.
    pub(crate) fn cell_key(&self, field_id: u32, pk: &[u8]) -> Result<Vec<u8>, codec::KeyError> {
        let mut key = KeyBuilder::new();
        key.push_encoded(&self.prefix_key)
            .push(&field_id)?
            .push_encoded(pk);
        Ok(key.finish())
    }

    pub(crate) fn has_watchers(&self) -> bool {
        !self.watchers.is_empty()
    }

    pub(crate) fn notify(&self, event: &Event<'_, E, K>) {
        for watcher in &self.watchers {
            watcher(event);
        }
    }
}

impl<E, K> Debug for Table<E, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = |specs: &[IndexSpec<E>]| -> Vec<&'static str> {
            specs.iter().map(|spec| spec.field.name()).collect()
        };
        f.debug_struct("Table")
            .field("name", &self.name)
            .field("prefix", &self.prefix)
            .field("mode", &self.mode)
            .field("primary", &self.primary.name())
            .field("columns", &self.columns.len())
            .field("sort", &names(&self.sort))
            .field("unique", &names(&self.unique))
            .field("watchers", &self.watchers.len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Table`].
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use tabkv::{Table, columns};
///
/// #[derive(Debug, Clone, Default, Serialize, Deserialize)]
/// struct Demo {
///     id: String,
///     owner: String,
///     like_count: u64,
/// }
///
/// columns![Demo { id: String = 1, owner: String = 2, like_count: u64 = 3 }];
///
/// let table = Table::builder("demo", Demo::ID)
///     .sort(Demo::LIKE_COUNT)
///     .unique(Demo::OWNER)
///     .build()?;
/// assert_eq!(table.sort_prefixes().collect::<Vec<_>>(), ["demo.sort.like_count"]);
/// # Ok::<(), tabkv::SchemaError>(())
/// ```
pub struct TableBuilder<E, K> {
    name: String,
    prefix: Option<String>,
    mode: StorageMode,
    primary: Column<E, K>,
    columns: Vec<FieldRef<E>>,
    sort: Vec<(Option<String>, FieldRef<E>)>,
    unique: Vec<(Option<String>, FieldRef<E>)>,
    config: ValueConfig,
    watchers: Vec<Watcher<E, K>>,
}

impl<E: Record, K: RecordKey> TableBuilder<E, K> {
    /// Overrides the record key prefix, which defaults to the table name.
    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Stores one cell per column instead of one blob per record.
    #[must_use]
    pub fn split(mut self) -> Self {
        self.mode = StorageMode::Split;
        self
    }

    #[must_use]
    pub fn column<T: FieldValue>(mut self, column: Column<E, T>) -> Self {
        self.columns.push(column.erase());
        self
    }

    #[must_use]
    pub fn columns(mut self, columns: impl IntoIterator<Item = FieldRef<E>>) -> Self {
        self.columns.extend(columns);
        self
    }

    /// Adds a sort index over `column` under `"{table}.sort.{field}"`.
    #[must_use]
    pub fn sort<T: FieldValue>(mut self, column: Column<E, T>) -> Self {
        self.sort.push((None, column.erase()));
        self
    }

    #[must_use]
    pub fn sort_with_prefix<T: FieldValue>(
        mut self,
        column: Column<E, T>,
        prefix: impl Into<String>,
    ) -> Self {
        self.sort.push((Some(prefix.into()), column.erase()));
        self
    }

    /// Adds a unique index over `column` under `"{table}.unique.{field}"`.
    #[must_use]
    pub fn unique<T: FieldValue>(mut self, column: Column<E, T>) -> Self {
        self.unique.push((None, column.erase()));
        self
    }

    #[must_use]
    pub fn unique_with_prefix<T: FieldValue>(
        mut self,
        column: Column<E, T>,
        prefix: impl Into<String>,
    ) -> Self {
        self.unique.push((Some(prefix.into()), column.erase()));
        self
    }

    /// Replaces the bincode layout of records, cells and index payloads.
    ///
    /// Keys are not affected. Data written under one layout cannot be read
    /// back under another.
    #[must_use]
    pub fn serialization_config(mut self, config: ValueConfig) -> Self {
        self.config = config;
        self
    }

    /// Registers a callback for applied inserts, updates and deletes.
    #[must_use]
    pub fn watch(mut self, watcher: impl Fn(&Event<'_, E, K>) + Send + Sync + 'static) -> Self {
        self.watchers.push(Arc::new(watcher));
        self
    }

    /// Validates the descriptor.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] for an empty name, duplicate field ids,
    /// prefixes or indexes, and for split tables indexing a column missing
    /// from the column list.
    pub fn build(self) -> Result<Table<E, K>, SchemaError> {
        if self.name.is_empty() {
            return Err(SchemaError::EmptyName);
        }
        let prefix = self.prefix.unwrap_or_else(|| self.name.clone());

        let mut columns = self.columns;
        if !columns.iter().any(|c| c.id() == self.primary.id()) {
            columns.insert(0, self.primary.erase());
        }
        for (i, column) in columns.iter().enumerate() {
            if columns[..i].iter().any(|c| c.id() == column.id()) {
                return Err(SchemaError::DuplicateFieldId(column.id()));
            }
        }

        let mut prefixes = vec![prefix.clone()];
        let mut specs = |declared: Vec<(Option<String>, FieldRef<E>)>, kind: &str| {
            let mut built: Vec<IndexSpec<E>> = Vec::with_capacity(declared.len());
            for (custom, field) in declared {
                if built.iter().any(|s| s.field.id() == field.id()) {
                    return Err(SchemaError::DuplicateIndex(field.name()));
                }
                if self.mode == StorageMode::Split && !columns.iter().any(|c| c.id() == field.id())
                {
                    return Err(SchemaError::MissingColumn(field.name()));
                }
                let prefix =
                    custom.unwrap_or_else(|| format!("{}.{kind}.{}", self.name, field.name()));
                if prefixes.contains(&prefix) {
                    return Err(SchemaError::DuplicatePrefix(prefix));
                }
                prefixes.push(prefix.clone());
                built.push(IndexSpec::new(prefix, field)?);
            }
            Ok(built)
        };
        let sort = specs(self.sort, "sort")?;
        let unique = specs(self.unique, "unique")?;

        Ok(Table {
            prefix_key: prefix_key(&prefix)?,
            name: self.name,
            prefix,
            mode: self.mode,
            primary: self.primary,
            columns,
            sort,
            unique,
            config: self.config,
            watchers: self.watchers,
        })
    }
}
