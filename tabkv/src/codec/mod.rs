//! Order-preserving key encoding.
//!
//! Every value written by [`encode`] starts with a one byte type tag and is
//! self-delimiting, so a composite key is simply the concatenation of its
//! components. Comparing two encodings byte by byte gives the same answer as
//! comparing the original values, which is what makes range scans over an
//! ordered key-value store work.
//!
//! ```
//! use tabkv::codec::{encode, encode_tuple, MIN};
//!
//! assert!(encode(&-5i64)? < encode(&3i64)?);
//! assert!(encode("apple")? < encode("banana")?);
//!
//! let entry = encode_tuple(&("likes", 100u64, "alice"))?;
//! let resume = encode_tuple(&("likes", 100u64, "alice", MIN))?;
//! assert!(entry < resume);
//! # Ok::<(), tabkv::codec::KeyError>(())
//! ```

mod ser;

use core::fmt::{self, Display};
use std::error::Error;

use serde::{Serialize, Serializer};

use ser::KeySerializer;

pub(crate) mod tag {
    pub const END: u8 = 0x00;
    pub const MIN: u8 = 0x01;
    pub const NIL: u8 = 0x02;
    pub const FALSE: u8 = 0x03;
    pub const TRUE: u8 = 0x04;
    pub const INT: u8 = 0x05;
    pub const UINT: u8 = 0x06;
    pub const INT128: u8 = 0x07;
    pub const UINT128: u8 = 0x08;
    pub const FLOAT: u8 = 0x09;
    pub const STR: u8 = 0x0A;
    pub const BYTES: u8 = 0x0B;
    pub const SOME: u8 = 0x0C;
    pub const SEQ: u8 = 0x0D;
    pub const VARIANT: u8 = 0x0E;
    pub const MAX: u8 = 0xFF;
}

/// Sorts below every encoded value.
pub const MIN_KEY: &[u8] = &[tag::MIN];
/// Sorts above every encoded value.
pub const MAX_KEY: &[u8] = &[tag::MAX];

pub(crate) const MIN_TOKEN: &str = "$tabkv::private::MinKey";
pub(crate) const MAX_TOKEN: &str = "$tabkv::private::MaxKey";

/// A serializable open-range marker, encoded as [`MIN_KEY`] or [`MAX_KEY`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentinel {
    Min,
    Max,
}

/// Shorthand for [`Sentinel::Min`].
pub const MIN: Sentinel = Sentinel::Min;
/// Shorthand for [`Sentinel::Max`].
pub const MAX: Sentinel = Sentinel::Max;

impl Serialize for Sentinel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Sentinel::Min => serializer.serialize_unit_struct(MIN_TOKEN),
            Sentinel::Max => serializer.serialize_unit_struct(MAX_TOKEN),
        }
    }
}

/// Errors raised while encoding a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// A key component was `None` or `()`, which cannot identify anything.
    Nil,
    /// The value has a shape without a meaningful order, such as a map.
    Unsupported(&'static str),
    /// Error reported by a `Serialize` implementation.
    Custom(String),
}

impl Display for KeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil => write!(f, "key component is nil"),
            Self::Unsupported(what) => write!(f, "{what} cannot be used in a key"),
            Self::Custom(msg) => write!(f, "{msg}"),
        }
    }
}

impl Error for KeyError {}

impl serde::ser::Error for KeyError {
    fn custom<T: Display>(msg: T) -> Self {
        KeyError::Custom(msg.to_string())
    }
}

/// Encodes a single key component.
///
/// # Errors
///
/// Returns [`KeyError::Nil`] for a top level `None` or unit value and
/// [`KeyError::Unsupported`] for maps.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, KeyError> {
    let mut out = Vec::new();
    encode_into(&mut out, value)?;
    Ok(out)
}

/// Appends the encoding of a single key component to `out`.
///
/// On error `out` may contain a partial encoding.
///
/// # Errors
///
/// See [`encode`].
pub fn encode_into<T: Serialize + ?Sized>(out: &mut Vec<u8>, value: &T) -> Result<(), KeyError> {
    value.serialize(&mut KeySerializer::component(out))
}

/// Encodes a Rust tuple as a composite key: the concatenation of each
/// element's component encoding, without outer framing.
///
/// Non-tuple values are encoded like [`encode`].
///
/// # Errors
///
/// Fails if any element fails to encode; a `None` element is nil.
pub fn encode_tuple<T: Serialize + ?Sized>(tuple: &T) -> Result<Vec<u8>, KeyError> {
    let mut out = Vec::new();
    tuple.serialize(&mut KeySerializer::tuple(&mut out))?;
    Ok(out)
}

/// Incremental builder producing the same bytes as [`encode_tuple`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyBuilder {
    buf: Vec<u8>,
}

impl KeyBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a key with a table or index prefix.
    ///
    /// # Errors
    ///
    /// Never fails for strings, but keeps the signature of [`KeyBuilder::push`].
    pub fn with_prefix(prefix: &str) -> Result<Self, KeyError> {
        let mut builder = Self::new();
        builder.push(prefix)?;
        Ok(builder)
    }

    /// Appends one component.
    ///
    /// # Errors
    ///
    /// See [`encode`].
    pub fn push<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<&mut Self, KeyError> {
        encode_into(&mut self.buf, value)?;
        Ok(self)
    }

    /// Appends a component that was already encoded with [`encode`].
    pub fn push_encoded(&mut self, component: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(component);
        self
    }

    pub fn push_min(&mut self) -> &mut Self {
        self.push_encoded(MIN_KEY)
    }

    pub fn push_max(&mut self) -> &mut Self {
        self.push_encoded(MAX_KEY)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use proptest::prelude::*;
    use serde::Serialize;

    use super::*;

    fn less<T: Serialize>(a: &T, b: &T) -> Result<bool, KeyError> {
        Ok(encode(a)? < encode(b)?)
    }

    fn float_or_zero() -> impl Strategy<Value = f64> {
        prop_oneof![Just(0.0f64), Just(-0.0), Just(1.5), -2.0f64..2.0]
    }

    proptest! {
        /// Property test: signed integers keep their order
        #[test]
        fn signed_order(a in any::<i64>(), b in any::<i64>()) {
            prop_assert_eq!(a.cmp(&b), encode(&a)?.cmp(&encode(&b)?));
        }

        /// Property test: unsigned integers keep their order
        #[test]
        fn unsigned_order(a in any::<u64>(), b in any::<u64>()) {
            prop_assert_eq!(a.cmp(&b), encode(&a)?.cmp(&encode(&b)?));
        }

        /// Property test: narrow integers share the wide encoding order
        #[test]
        fn narrow_order(a in any::<i16>(), b in any::<i16>()) {
            prop_assert_eq!(a.cmp(&b), encode(&a)?.cmp(&encode(&b)?));
        }

        /// Property test: strings keep their byte order, embedded zeros included
        #[test]
        fn string_order(a in "[a\\x00-\\x02z]{0,8}", b in "[a\\x00-\\x02z]{0,8}") {
            prop_assert_eq!(a.as_bytes().cmp(b.as_bytes()), encode(&a)?.cmp(&encode(&b)?));
        }

        /// Property test: finite floats keep their order
        #[test]
        fn float_order(a in -1.0e12f64..1.0e12, b in -1.0e12f64..1.0e12) {
            prop_assume!(a != b);
            prop_assert_eq!(a < b, encode(&a)? < encode(&b)?);
        }

        /// Property test: equal floats share one encoding, signed zeros included
        #[test]
        fn float_equality(a in float_or_zero(), b in float_or_zero()) {
            prop_assert_eq!(a == b, encode(&a)? == encode(&b)?);
            prop_assert_eq!(a == b, encode(&(a as f32))? == encode(&(b as f32))?);
        }

        /// Property test: tuples order component by component
        #[test]
        fn tuple_order(a in (any::<u32>(), "[ab]{0,3}"), b in (any::<u32>(), "[ab]{0,3}")) {
            prop_assert_eq!(a.cmp(&b), encode_tuple(&a)?.cmp(&encode_tuple(&b)?));
        }

        /// Property test: nested sequences compare like slices
        #[test]
        fn sequence_order(a in prop::collection::vec(any::<u8>(), 0..5), b in prop::collection::vec(any::<u8>(), 0..5)) {
            prop_assert_eq!(a.cmp(&b), encode(&a)?.cmp(&encode(&b)?));
        }

        /// Property test: sentinels bound every encoded value
        #[test]
        fn sentinels_bound_values(v in any::<i64>(), s in "\\PC*") {
            for encoded in [encode(&v)?, encode(&s)?] {
                prop_assert!(MIN_KEY < encoded.as_slice());
                prop_assert!(MAX_KEY > encoded.as_slice());
            }
        }
    }

    #[test]
    fn test_signed_zero_shares_key() -> Result<(), KeyError> {
        assert_eq!(encode(&-0.0f64)?, encode(&0.0f64)?);
        assert_eq!(encode(&-0.0f32)?, encode(&0.0f64)?);
        assert!(less(&-f64::MIN_POSITIVE, &-0.0f64)?);
        assert!(less(&-0.0f64, &f64::MIN_POSITIVE)?);
        Ok(())
    }

    #[test]
    fn test_integer_layout() -> Result<(), KeyError> {
        assert_eq!(hex::encode(encode(&1u8)?), "060000000000000001");
        assert_eq!(hex::encode(encode(&-1i32)?), "057fffffffffffffff");
        assert_eq!(hex::encode(encode(&0i64)?), "058000000000000000");
        Ok(())
    }

    #[test]
    fn test_string_escaping() -> Result<(), KeyError> {
        assert_eq!(encode("A")?, vec![tag::STR, b'A', 0x00, 0x00]);
        assert_eq!(
            encode("A\0")?,
            vec![tag::STR, b'A', 0x00, 0xFF, 0x00, 0x00]
        );
        assert!(less(&"Cat", &"Caterpillar")?);
        assert!(less(&"Aa", &"B")?);
        Ok(())
    }

    #[test]
    fn test_option_order() -> Result<(), KeyError> {
        assert!(less(&vec![None, Some(0u8)], &vec![Some(0u8), None])?);
        assert!(encode(&Some(1u8))? < encode(&Some(2u8))?);
        Ok(())
    }

    #[test]
    fn test_top_level_nil_rejected() {
        assert_eq!(encode(&Option::<u8>::None), Err(KeyError::Nil));
        assert_eq!(encode(&()), Err(KeyError::Nil));
        assert_eq!(
            encode_tuple(&("prefix", Option::<u8>::None)),
            Err(KeyError::Nil)
        );
    }

    #[test]
    fn test_maps_rejected() {
        let map: BTreeMap<u8, u8> = BTreeMap::new();
        assert!(matches!(encode(&map), Err(KeyError::Unsupported(_))));
    }

    #[test]
    fn test_struct_and_enum_order() -> Result<(), KeyError> {
        #[derive(Serialize)]
        struct Coin {
            amount: u64,
            symbol: String,
        }
        #[derive(Serialize)]
        enum Level {
            Low,
            High(u8),
        }

        let small = Coin {
            amount: 5,
            symbol: "ZZZ".into(),
        };
        let large = Coin {
            amount: 6,
            symbol: "AAA".into(),
        };
        assert!(less(&small, &large)?);
        assert!(less(&Level::Low, &Level::High(0))?);
        assert!(less(&Level::High(1), &Level::High(2))?);
        Ok(())
    }

    #[test]
    fn test_nested_prefix_does_not_collide() -> Result<(), KeyError> {
        // The shorter nested sequence must sort before any of its extensions,
        // even when the following component is large.
        let short = encode_tuple(&(vec![1u8], u64::MAX))?;
        let long = encode_tuple(&(vec![1u8, 0], 0u64))?;
        assert!(short < long);
        Ok(())
    }

    #[test]
    fn test_builder_matches_tuple() -> Result<(), KeyError> {
        let mut builder = KeyBuilder::with_prefix("table")?;
        builder.push(&7u32)?.push("key")?.push_min();
        assert_eq!(
            builder.finish(),
            encode_tuple(&("table", 7u32, "key", MIN))?
        );
        Ok(())
    }

    #[test]
    fn test_resume_bound_sorts_between_entries() -> Result<(), KeyError> {
        let entry = encode_tuple(&("idx", 3u64, "b"))?;
        let resume = encode_tuple(&("idx", 3u64, "b", MIN))?;
        let next = encode_tuple(&("idx", 3u64, "c"))?;
        let upper = encode_tuple(&("idx", MAX))?;
        assert!(entry < resume);
        assert!(resume < next);
        assert!(next < upper);
        Ok(())
    }
}
