use core::fmt::Debug;
use std::sync::Arc;

use serde::{Serialize, de::DeserializeOwned};

use crate::{EncodingError, ValueConfig, codec::KeyBuilder, codec::KeyError};

/// A type that can be stored as a table record.
///
/// Records are created from [`Default`] and filled in by the caller, so every
/// field must have a default value.
pub trait Record: Serialize + DeserializeOwned + Default + Clone + Debug + 'static {}
impl<T: Serialize + DeserializeOwned + Default + Clone + Debug + 'static> Record for T {}

/// A type that can be the primary key of a record.
///
/// The [`Default`] value stands for "unset" when a record is created.
pub trait RecordKey:
    Serialize + DeserializeOwned + Clone + PartialEq + Default + Debug + 'static
{
}
impl<T: Serialize + DeserializeOwned + Clone + PartialEq + Default + Debug + 'static> RecordKey
    for T
{
}

/// A type that can be held by a column.
pub trait FieldValue: Serialize + DeserializeOwned + Clone + PartialEq + Debug + 'static {}
impl<T: Serialize + DeserializeOwned + Clone + PartialEq + Debug + 'static> FieldValue for T {}

/// A column of record `E` with its value type erased.
///
/// Tables keep their column lists as [`FieldRef`]s so that split storage and
/// index maintenance can walk them without knowing each value type.
pub trait Field<E>: Send + Sync {
    fn name(&self) -> &'static str;

    /// Stable numeric id, part of the split storage key.
    fn id(&self) -> u32;

    /// Appends the field value of `record` as an ordered key component.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Nil`] for a nil value.
    fn push_key(&self, record: &E, key: &mut KeyBuilder) -> Result<(), KeyError>;

    /// Serializes the field value of `record`.
    ///
    /// # Errors
    ///
    /// Returns [`EncodingError::Serialize`] if the value cannot be serialized.
    fn encode_cell(&self, record: &E, config: ValueConfig) -> Result<Vec<u8>, EncodingError>;

    /// Overwrites the field of `record` with a value read from storage.
    ///
    /// # Errors
    ///
    /// Returns [`EncodingError::Deserialize`] if the bytes do not hold a value.
    fn decode_cell(
        &self,
        record: &mut E,
        bytes: &[u8],
        config: ValueConfig,
    ) -> Result<(), EncodingError>;

    /// Whether both records hold the same value in this field.
    fn same_value(&self, a: &E, b: &E) -> bool;
}

/// Shared handle to an erased column.
pub type FieldRef<E> = Arc<dyn Field<E>>;
