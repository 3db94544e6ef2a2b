use core::{
    error::Error,
    fmt::{self, Debug, Display},
};

use bincode::error::{DecodeError, EncodeError};

use crate::codec::KeyError;

/// Failure to turn a value into bytes or back.
#[derive(Debug)]
pub enum EncodingError {
    /// The value could not be encoded as an ordered key component.
    Key(KeyError),
    /// A record, cell or index payload could not be serialized.
    Serialize(EncodeError),
    /// Stored bytes could not be decoded, most likely caused by a schema
    /// mismatch or database corruption.
    Deserialize(DecodeError),
}

impl Display for EncodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(e) => write!(f, "Key encoding error: {e}"),
            Self::Serialize(e) => write!(f, "Value serialization error: {e}"),
            Self::Deserialize(e) => write!(f, "Value deserialization error: {e}"),
        }
    }
}

impl Error for EncodingError {}

impl From<KeyError> for EncodingError {
    fn from(e: KeyError) -> Self {
        Self::Key(e)
    }
}

impl From<EncodeError> for EncodingError {
    fn from(e: EncodeError) -> Self {
        Self::Serialize(e)
    }
}

impl From<DecodeError> for EncodingError {
    fn from(e: DecodeError) -> Self {
        Self::Deserialize(e)
    }
}

/// Errors returned by table operations, generic over the storage error `E`.
pub enum TableError<E> {
    /// The record does not exist, or a unique value is not claimed.
    NotFound,
    /// The record, or the named unique value, is already taken.
    AlreadyExists(&'static str),
    Encoding(EncodingError),
    /// The named indexed field holds a nil value, which cannot be keyed.
    NilArgument(&'static str),
    /// A multi-key operation failed after it started writing. The message
    /// names the cause and every rollback step that failed.
    Consistency(String),
    /// The record created through a wrapper carries a different primary key.
    PrimaryKeyMismatch,
    /// The primary key column cannot be modified.
    PrimaryKeyImmutable,
    /// Errors reported by the storage backend.
    Storage(E),
}

impl<E> TableError<E> {
    /// Maps a key encoding failure of the named field, turning a nil value
    /// into [`TableError::NilArgument`].
    pub(crate) fn from_key(field: &'static str, e: KeyError) -> Self {
        match e {
            KeyError::Nil => Self::NilArgument(field),
            other => Self::Encoding(EncodingError::Key(other)),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

impl<E> From<EncodingError> for TableError<E> {
    fn from(e: EncodingError) -> Self {
        Self::Encoding(e)
    }
}

impl<E: Debug> Debug for TableError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "NotFound"),
            Self::AlreadyExists(what) => f.debug_tuple("AlreadyExists").field(what).finish(),
            Self::Encoding(e) => f.debug_tuple("Encoding").field(e).finish(),
            Self::NilArgument(field) => f.debug_tuple("NilArgument").field(field).finish(),
            Self::Consistency(msg) => f.debug_tuple("Consistency").field(msg).finish(),
            Self::PrimaryKeyMismatch => write!(f, "PrimaryKeyMismatch"),
            Self::PrimaryKeyImmutable => write!(f, "PrimaryKeyImmutable"),
            Self::Storage(e) => f.debug_tuple("Storage").field(e).finish(),
        }
    }
}

impl<E: Display> Display for TableError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "Record not found"),
            Self::AlreadyExists(what) => write!(f, "Already exists: {what}"),
            Self::Encoding(e) => write!(f, "{e}"),
            Self::NilArgument(field) => write!(f, "Indexed field {field} is nil"),
            Self::Consistency(msg) => write!(f, "Consistency error: {msg}"),
            Self::PrimaryKeyMismatch => {
                write!(f, "Record primary key differs from the wrapper key")
            }
            Self::PrimaryKeyImmutable => write!(f, "Primary key cannot be modified"),
            Self::Storage(e) => write!(f, "Storage error: {e}"),
        }
    }
}

impl<E: Debug + Display> Error for TableError<E> {}

/// Errors detected while building a [`Table`](crate::Table) descriptor.
#[derive(Debug, PartialEq, Eq)]
pub enum SchemaError {
    /// The table name is empty.
    EmptyName,
    /// Two columns share a field id.
    DuplicateFieldId(u32),
    /// The same column was indexed twice with the same kind of index.
    DuplicateIndex(&'static str),
    /// Two key spaces of the table share a prefix.
    DuplicatePrefix(String),
    /// A split table indexes a column that is not in its column list.
    MissingColumn(&'static str),
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyName => write!(f, "Table name must not be empty"),
            Self::DuplicateFieldId(id) => write!(f, "Field id {id} is used twice"),
            Self::DuplicateIndex(field) => write!(f, "Field {field} is indexed twice"),
            Self::DuplicatePrefix(prefix) => write!(f, "Prefix {prefix:?} is used twice"),
            Self::MissingColumn(field) => {
                write!(f, "Indexed field {field} is missing from the column list")
            }
        }
    }
}

impl Error for SchemaError {}
