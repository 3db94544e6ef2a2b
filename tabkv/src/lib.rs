//! # tabkv
//!
//! Typed records over an ordered key-value store, with sort and unique
//! secondary indexes kept consistent with the record without relying on
//! multi-key transactions.
//!
//! ## Features
//!
//! - Order-preserving key encoding for any `serde` value
//! - Combined (one blob per record) or split (one cell per field) storage
//! - Sort indexes with lazy, resumable forward and backward scans
//! - Unique indexes with point lookup
//! - Compensating rollback on plain stores, one atomic batch on stores that
//!   support it
//!
//! ```
//! use serde::{Deserialize, Serialize};
//! use tabkv::{Database, MemoryStorage, Table, columns};
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//! struct Post {
//!     id: String,
//!     author: String,
//!     likes: u64,
//! }
//!
//! columns![Post { id: String = 1, author: String = 2, likes: u64 = 3 }];
//!
//! let posts = Table::builder("post", Post::ID).sort(Post::LIKES).build()?;
//! let mut db = Database::new(MemoryStorage::new());
//!
//! db.entity(&posts, "hello".to_string()).create(|post| {
//!     post.author = "ann".into();
//!     post.likes = 3;
//! })?;
//!
//! let by_likes = posts.sort_index(&Post::LIKES).ok_or("no index")?;
//! let top: Vec<(String, u64)> = by_likes
//!     .scan_backward(db.store(), None, None, None)?
//!     .collect::<Result<_, _>>()?;
//! assert_eq!(top, [("hello".to_string(), 3)]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod codec;

mod btreemap;
mod column;
mod database;
mod errors;
mod primary;
mod serialization;
mod sort_index;
mod table;
mod traits;
mod unique_index;
mod wrap;
mod writes;

#[cfg(feature = "sled")]
mod integrations;

pub use btreemap::{MemoryCursor, MemoryStorage, MemoryStorageError};
pub use column::Column;
pub use database::Database;
pub use errors::{EncodingError, SchemaError, TableError};
pub use primary::PrimaryStore;
pub use serialization::{ValueConfig, decode_value, encode_value};
pub use sort_index::{Direction, Resume, Scan, SortIndex};
pub use table::{Event, StorageMode, Table, TableBuilder, Watcher};
pub use traits::*;
pub use unique_index::UniqueIndex;
pub use wrap::{Existence, Wrap};

#[cfg(feature = "sled")]
pub use integrations::sled::{SledCursor, SledStorage, SledStorageError};

#[doc(hidden)]
pub use paste::paste;
