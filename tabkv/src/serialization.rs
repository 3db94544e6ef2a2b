//! Value encoding for record blobs, split cells and index payloads.

use bincode::{
    config,
    serde::{decode_from_slice, encode_to_vec},
};
use serde::{Serialize, de::DeserializeOwned};

use crate::EncodingError;

/// Bincode layout of stored values.
///
/// Starts from bincode's standard layout (little endian, variable length
/// integers). Size limits are not configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ValueConfig {
    big_endian: bool,
    fixed_int: bool,
}

impl ValueConfig {
    #[must_use]
    pub const fn standard() -> Self {
        Self {
            big_endian: false,
            fixed_int: false,
        }
    }

    #[must_use]
    pub const fn with_big_endian(self) -> Self {
        Self {
            big_endian: true,
            ..self
        }
    }

    #[must_use]
    pub const fn with_fixed_int_encoding(self) -> Self {
        Self {
            fixed_int: true,
            ..self
        }
    }
}

/// Serializes a value with the table's bincode configuration.
///
/// # Errors
///
/// Returns [`EncodingError::Serialize`] if the value cannot be serialized.
pub fn encode_value<T: Serialize + ?Sized>(
    value: &T,
    config: ValueConfig,
) -> Result<Vec<u8>, EncodingError> {
    let standard = config::standard();
    let bytes = match (config.big_endian, config.fixed_int) {
        (false, false) => encode_to_vec(value, standard)?,
        (false, true) => encode_to_vec(value, standard.with_fixed_int_encoding())?,
        (true, false) => encode_to_vec(value, standard.with_big_endian())?,
        (true, true) => encode_to_vec(
            value,
            standard.with_big_endian().with_fixed_int_encoding(),
        )?,
    };
    Ok(bytes)
}

/// Deserializes a value written by [`encode_value`] with the same config.
///
/// # Errors
///
/// Returns [`EncodingError::Deserialize`] if the bytes do not hold a `T`.
pub fn decode_value<T: DeserializeOwned>(
    bytes: &[u8],
    config: ValueConfig,
) -> Result<T, EncodingError> {
    let standard = config::standard();
    let (value, _) = match (config.big_endian, config.fixed_int) {
        (false, false) => decode_from_slice(bytes, standard)?,
        (false, true) => decode_from_slice(bytes, standard.with_fixed_int_encoding())?,
        (true, false) => decode_from_slice(bytes, standard.with_big_endian())?,
        (true, true) => decode_from_slice(
            bytes,
            standard.with_big_endian().with_fixed_int_encoding(),
        )?,
    };
    Ok(value)
}
