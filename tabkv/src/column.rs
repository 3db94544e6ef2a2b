use core::fmt::{self, Debug};
use std::sync::Arc;

use crate::{
    EncodingError, Field, FieldRef, FieldValue, Record,
    codec::{KeyBuilder, KeyError},
    serialization::{ValueConfig, decode_value, encode_value},
};

/// A typed column of record `E` holding values of type `T`.
///
/// Columns are plain constants, usually declared with [`columns!`](crate::columns):
///
/// ```
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, Default, Serialize, Deserialize)]
/// struct Post {
///     id: u64,
///     title: String,
/// }
///
/// tabkv::columns![Post { id: u64 = 1, title: String = 2 }];
///
/// let mut post = Post::default();
/// Post::TITLE.set(&mut post, "hello".to_string());
/// assert_eq!(Post::TITLE.get(&post), "hello");
/// assert_eq!(Post::TITLE.id(), 2);
/// ```
pub struct Column<E, T> {
    name: &'static str,
    id: u32,
    get: fn(&E) -> &T,
    get_mut: fn(&mut E) -> &mut T,
}

impl<E, T> Column<E, T> {
    pub const fn new(
        name: &'static str,
        id: u32,
        get: fn(&E) -> &T,
        get_mut: fn(&mut E) -> &mut T,
    ) -> Self {
        Self {
            name,
            id,
            get,
            get_mut,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub const fn id(&self) -> u32 {
        self.id
    }

    pub fn get<'e>(&self, record: &'e E) -> &'e T {
        (self.get)(record)
    }

    pub fn get_mut<'e>(&self, record: &'e mut E) -> &'e mut T {
        (self.get_mut)(record)
    }

    pub fn set(&self, record: &mut E, value: T) {
        *(self.get_mut)(record) = value;
    }
}

impl<E: Record, T: FieldValue> Column<E, T> {
    /// Erases the value type so the column can join a table's column list.
    #[must_use]
    pub fn erase(self) -> FieldRef<E> {
        Arc::new(self)
    }
}

impl<E, T> Clone for Column<E, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E, T> Copy for Column<E, T> {}

impl<E, T> Debug for Column<E, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("name", &self.name)
            .field("id", &self.id)
            .finish()
    }
}

impl<E: Record, T: FieldValue> Field<E> for Column<E, T> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn id(&self) -> u32 {
        self.id
    }

    fn push_key(&self, record: &E, key: &mut KeyBuilder) -> Result<(), KeyError> {
        key.push(self.get(record))?;
        Ok(())
    }

    fn encode_cell(&self, record: &E, config: ValueConfig) -> Result<Vec<u8>, EncodingError> {
        encode_value(self.get(record), config)
    }

    fn decode_cell(
        &self,
        record: &mut E,
        bytes: &[u8],
        config: ValueConfig,
    ) -> Result<(), EncodingError> {
        self.set(record, decode_value(bytes, config)?);
        Ok(())
    }

    fn same_value(&self, a: &E, b: &E) -> bool {
        self.get(a) == self.get(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Account {
        id: u32,
        nickname: Option<String>,
    }

    fn nickname(account: &Account) -> &Option<String> {
        &account.nickname
    }

    fn nickname_mut(account: &mut Account) -> &mut Option<String> {
        &mut account.nickname
    }

    const NICKNAME: Column<Account, Option<String>> =
        Column::new("nickname", 2, nickname, nickname_mut);

    #[test]
    fn test_erased_cell_round_trip() -> anyhow::Result<()> {
        let field = NICKNAME.erase();
        let source = Account {
            id: 1,
            nickname: Some("kit".into()),
        };
        let bytes = field.encode_cell(&source, ValueConfig::standard())?;

        let mut target = Account::default();
        assert!(!field.same_value(&source, &target));
        field.decode_cell(&mut target, &bytes, ValueConfig::standard())?;
        assert!(field.same_value(&source, &target));
        assert_eq!(target.id, 0);
        Ok(())
    }

    #[test]
    fn test_nil_value_cannot_be_keyed() {
        let mut key = KeyBuilder::new();
        let result = NICKNAME.erase().push_key(&Account::default(), &mut key);
        assert_eq!(result, Err(KeyError::Nil));
    }
}
