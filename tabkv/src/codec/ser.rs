use serde::{
    Serialize, Serializer,
    ser::{
        Impossible, SerializeSeq, SerializeStruct, SerializeStructVariant, SerializeTuple,
        SerializeTupleStruct, SerializeTupleVariant,
    },
};

use super::{KeyError, MAX_TOKEN, MIN_TOKEN, tag};

const SIGN_64: u64 = 1 << 63;
const SIGN_128: u128 = 1 << 127;

/// Serde serializer writing the order-preserving key format into a buffer.
pub(crate) struct KeySerializer<'a> {
    out: &'a mut Vec<u8>,
    /// Nesting level; a nil value is only rejected at level zero.
    depth: usize,
    /// Whether a top level tuple is written as bare concatenation.
    flat_tuple: bool,
}

impl<'a> KeySerializer<'a> {
    pub(crate) fn component(out: &'a mut Vec<u8>) -> Self {
        Self {
            out,
            depth: 0,
            flat_tuple: false,
        }
    }

    pub(crate) fn tuple(out: &'a mut Vec<u8>) -> Self {
        Self {
            out,
            depth: 0,
            flat_tuple: true,
        }
    }

    fn nested(&mut self) -> KeySerializer<'_> {
        KeySerializer {
            out: &mut *self.out,
            depth: self.depth + 1,
            flat_tuple: false,
        }
    }

    fn write_escaped(&mut self, tag: u8, bytes: &[u8]) {
        self.out.reserve(bytes.len() + 3);
        self.out.push(tag);
        for &byte in bytes {
            self.out.push(byte);
            if byte == 0 {
                self.out.push(0xFF);
            }
        }
        self.out.extend_from_slice(&[0x00, 0x00]);
    }

    fn write_variant(&mut self, variant_index: u32) {
        self.out.push(tag::VARIANT);
        self.out.extend_from_slice(&variant_index.to_be_bytes());
    }

    fn open(&mut self) -> Compound<'_, 'a> {
        self.out.push(tag::SEQ);
        Compound {
            ser: self,
            framed: true,
        }
    }
}

pub(crate) struct Compound<'s, 'a> {
    ser: &'s mut KeySerializer<'a>,
    framed: bool,
}

impl Compound<'_, '_> {
    fn element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), KeyError> {
        if self.framed {
            value.serialize(&mut self.ser.nested())
        } else {
            value.serialize(&mut KeySerializer::component(&mut *self.ser.out))
        }
    }

    fn close(self) -> Result<(), KeyError> {
        if self.framed {
            self.ser.out.push(tag::END);
        }
        Ok(())
    }
}

impl<'s, 'a> Serializer for &'s mut KeySerializer<'a> {
    type Ok = ();
    type Error = KeyError;
    type SerializeSeq = Compound<'s, 'a>;
    type SerializeTuple = Compound<'s, 'a>;
    type SerializeTupleStruct = Compound<'s, 'a>;
    type SerializeTupleVariant = Compound<'s, 'a>;
    type SerializeMap = Impossible<(), KeyError>;
    type SerializeStruct = Compound<'s, 'a>;
    type SerializeStructVariant = Compound<'s, 'a>;

    fn is_human_readable(&self) -> bool {
        false
    }

    fn serialize_bool(self, v: bool) -> Result<(), KeyError> {
        self.out.push(if v { tag::TRUE } else { tag::FALSE });
        Ok(())
    }

    fn serialize_i8(self, v: i8) -> Result<(), KeyError> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i16(self, v: i16) -> Result<(), KeyError> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i32(self, v: i32) -> Result<(), KeyError> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i64(self, v: i64) -> Result<(), KeyError> {
        self.out.push(tag::INT);
        self.out
            .extend_from_slice(&((v as u64) ^ SIGN_64).to_be_bytes());
        Ok(())
    }

    fn serialize_i128(self, v: i128) -> Result<(), KeyError> {
        self.out.push(tag::INT128);
        self.out
            .extend_from_slice(&((v as u128) ^ SIGN_128).to_be_bytes());
        Ok(())
    }

    fn serialize_u8(self, v: u8) -> Result<(), KeyError> {
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u16(self, v: u16) -> Result<(), KeyError> {
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u32(self, v: u32) -> Result<(), KeyError> {
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u64(self, v: u64) -> Result<(), KeyError> {
        self.out.push(tag::UINT);
        self.out.extend_from_slice(&v.to_be_bytes());
        Ok(())
    }

    fn serialize_u128(self, v: u128) -> Result<(), KeyError> {
        self.out.push(tag::UINT128);
        self.out.extend_from_slice(&v.to_be_bytes());
        Ok(())
    }

    fn serialize_f32(self, v: f32) -> Result<(), KeyError> {
        self.serialize_f64(f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> Result<(), KeyError> {
        // Equal values must share a key, so -0.0 is written as 0.0.
        let v = if v == 0.0 { 0.0 } else { v };
        // Negative numbers have every bit flipped so that larger magnitudes
        // sort first; positive ones only need the sign bit set.
        let bits = v.to_bits();
        let ordered = if bits & SIGN_64 == 0 {
            bits ^ SIGN_64
        } else {
            !bits
        };
        self.out.push(tag::FLOAT);
        self.out.extend_from_slice(&ordered.to_be_bytes());
        Ok(())
    }

    fn serialize_char(self, v: char) -> Result<(), KeyError> {
        let mut buf = [0u8; 4];
        self.serialize_str(v.encode_utf8(&mut buf))
    }

    fn serialize_str(self, v: &str) -> Result<(), KeyError> {
        self.write_escaped(tag::STR, v.as_bytes());
        Ok(())
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<(), KeyError> {
        self.write_escaped(tag::BYTES, v);
        Ok(())
    }

    fn serialize_none(self) -> Result<(), KeyError> {
        if self.depth == 0 {
            return Err(KeyError::Nil);
        }
        self.out.push(tag::NIL);
        Ok(())
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<(), KeyError> {
        self.out.push(tag::SOME);
        value.serialize(&mut self.nested())
    }

    fn serialize_unit(self) -> Result<(), KeyError> {
        self.serialize_none()
    }

    fn serialize_unit_struct(self, name: &'static str) -> Result<(), KeyError> {
        match name {
            MIN_TOKEN => self.out.push(tag::MIN),
            MAX_TOKEN => self.out.push(tag::MAX),
            _ => return self.serialize_unit(),
        }
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        variant_index: u32,
        _variant: &'static str,
    ) -> Result<(), KeyError> {
        self.write_variant(variant_index);
        Ok(())
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<(), KeyError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        variant_index: u32,
        _variant: &'static str,
        value: &T,
    ) -> Result<(), KeyError> {
        self.write_variant(variant_index);
        value.serialize(&mut self.nested())
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Compound<'s, 'a>, KeyError> {
        Ok(self.open())
    }

    fn serialize_tuple(self, _len: usize) -> Result<Compound<'s, 'a>, KeyError> {
        if self.flat_tuple && self.depth == 0 {
            return Ok(Compound {
                ser: self,
                framed: false,
            });
        }
        Ok(self.open())
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Compound<'s, 'a>, KeyError> {
        Ok(self.open())
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Compound<'s, 'a>, KeyError> {
        self.write_variant(variant_index);
        Ok(self.open())
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, KeyError> {
        Err(KeyError::Unsupported("map"))
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Compound<'s, 'a>, KeyError> {
        Ok(self.open())
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Compound<'s, 'a>, KeyError> {
        self.write_variant(variant_index);
        Ok(self.open())
    }
}

impl SerializeSeq for Compound<'_, '_> {
    type Ok = ();
    type Error = KeyError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), KeyError> {
        self.element(value)
    }

    fn end(self) -> Result<(), KeyError> {
        self.close()
    }
}

impl SerializeTuple for Compound<'_, '_> {
    type Ok = ();
    type Error = KeyError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), KeyError> {
        self.element(value)
    }

    fn end(self) -> Result<(), KeyError> {
        self.close()
    }
}

impl SerializeTupleStruct for Compound<'_, '_> {
    type Ok = ();
    type Error = KeyError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), KeyError> {
        self.element(value)
    }

    fn end(self) -> Result<(), KeyError> {
        self.close()
    }
}

impl SerializeTupleVariant for Compound<'_, '_> {
    type Ok = ();
    type Error = KeyError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), KeyError> {
        self.element(value)
    }

    fn end(self) -> Result<(), KeyError> {
        self.close()
    }
}

impl SerializeStruct for Compound<'_, '_> {
    type Ok = ();
    type Error = KeyError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        _key: &'static str,
        value: &T,
    ) -> Result<(), KeyError> {
        self.element(value)
    }

    fn end(self) -> Result<(), KeyError> {
        self.close()
    }
}

impl SerializeStructVariant for Compound<'_, '_> {
    type Ok = ();
    type Error = KeyError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        _key: &'static str,
        value: &T,
    ) -> Result<(), KeyError> {
        self.element(value)
    }

    fn end(self) -> Result<(), KeyError> {
        self.close()
    }
}
