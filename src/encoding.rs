use std::collections::HashMap;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::AmfEncodingError;
use crate::refs::RefTables;
use crate::value::{Amf3Array, Amf3Object, AmfValue, Version};
use crate::{amf0, amf3};

/// Encode a single value as AMF0.
pub fn encode_amf0<T: Encode + ?Sized>(value: &T) -> Result<Bytes, AmfEncodingError> {
    encode_value(value, Version::Amf0)
}

/// Encode a single value as AMF3.
pub fn encode_amf3<T: Encode + ?Sized>(value: &T) -> Result<Bytes, AmfEncodingError> {
    encode_value(value, Version::Amf3)
}

pub fn encode_value<T: Encode + ?Sized>(
    value: &T,
    version: Version,
) -> Result<Bytes, AmfEncodingError> {
    let mut refs = RefTables::default();
    let mut encoder = EncoderState::new(BytesMut::new(), &mut refs, version);
    value.encode_amf(&mut encoder)?;
    Ok(encoder.into_bytes())
}

/// Values that can write themselves into an encoder context.
pub trait Encode {
    fn encode_amf(&self, encoder: &mut EncoderState<'_>) -> Result<(), AmfEncodingError>;
}

/// Type-driven recursive writer. Like the decoder, it carries the reference
/// tables of one top-level call and the currently active sub-version.
pub struct EncoderState<'a> {
    buf: BytesMut,
    refs: &'a mut RefTables,
    version: Version,
}

impl<'a> EncoderState<'a> {
    pub(crate) fn new(buf: BytesMut, refs: &'a mut RefTables, version: Version) -> Self {
        Self { buf, refs, version }
    }

    pub(crate) fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }

    pub(crate) fn put_value(&mut self, value: &AmfValue) -> Result<(), AmfEncodingError> {
        match value {
            AmfValue::Null => self.put_null(),
            AmfValue::Undefined => self.put_undefined(),
            AmfValue::Boolean(b) => self.put_boolean(*b),
            AmfValue::Number(n) => self.put_number(*n),
            AmfValue::Integer(i) => self.put_integer(*i)?,
            AmfValue::String(s) => self.put_string(s)?,
            AmfValue::StrictArray(values) => self.put_strict_array(values)?,
            AmfValue::Object(properties) => self.put_amf0_object(properties)?,
            AmfValue::TypedObject {
                class_name,
                properties,
            } => self.put_typed_object(class_name, properties)?,
            AmfValue::Amf3Array(array) => self.put_amf3_array(array)?,
            AmfValue::Amf3Object(object) => self.put_amf3_object(object)?,
        }
        Ok(())
    }

    fn put_null(&mut self) {
        match self.version {
            Version::Amf0 => self.buf.put_u8(amf0::NULL),
            Version::Amf3 => self.buf.put_u8(amf3::NULL),
        }
    }

    fn put_undefined(&mut self) {
        match self.version {
            Version::Amf0 => self.buf.put_u8(amf0::UNDEFINED),
            Version::Amf3 => self.buf.put_u8(amf3::UNDEFINED),
        }
    }

    fn put_boolean(&mut self, b: bool) {
        match self.version {
            Version::Amf0 => {
                self.buf.put_u8(amf0::BOOLEAN);
                self.buf.put_u8(b.into());
            }
            Version::Amf3 => match b {
                false => self.buf.put_u8(amf3::FALSE),
                true => self.buf.put_u8(amf3::TRUE),
            },
        }
    }

    fn put_number(&mut self, n: f64) {
        match self.version {
            Version::Amf0 => self.buf.put_u8(amf0::NUMBER),
            Version::Amf3 => self.buf.put_u8(amf3::DOUBLE),
        }
        self.buf.put_f64(n);
    }

    /// AMF0 has no integer kind and always writes an 8-byte double.
    fn put_integer(&mut self, i: i32) -> Result<(), AmfEncodingError> {
        match self.version {
            Version::Amf0 => {
                self.put_number(i as f64);
                Ok(())
            }
            Version::Amf3 => {
                self.buf.put_u8(amf3::INTEGER);
                amf3::put_i29(&mut self.buf, i)
            }
        }
    }

    fn put_string(&mut self, s: &str) -> Result<(), AmfEncodingError> {
        match self.version {
            Version::Amf0 => {
                if s.len() > amf0::MAX_PLAIN_STRING_LEN {
                    self.buf.put_u8(amf0::LONG_STRING);
                    self.put_long_utf8(s)
                } else {
                    self.buf.put_u8(amf0::STRING);
                    self.put_utf8(s)
                }
            }
            Version::Amf3 => {
                self.buf.put_u8(amf3::STRING);
                self.put_utf8_vr(s)
            }
        }
    }

    fn put_utf8(&mut self, s: &str) -> Result<(), AmfEncodingError> {
        if s.len() > amf0::MAX_PLAIN_STRING_LEN {
            return Err(AmfEncodingError::StringTooLong(s.len()));
        }
        self.buf.put_u16(s.len() as u16);
        self.buf.put_slice(s.as_bytes());
        Ok(())
    }

    fn put_long_utf8(&mut self, s: &str) -> Result<(), AmfEncodingError> {
        if s.len() > u32::MAX as usize {
            return Err(AmfEncodingError::StringTooLong(s.len()));
        }
        self.buf.put_u32(s.len() as u32);
        self.buf.put_slice(s.as_bytes());
        Ok(())
    }

    /// AMF3 string with content-based dedup. The zero-length string always
    /// uses the dedicated single-byte empty encoding and is never registered.
    fn put_utf8_vr(&mut self, s: &str) -> Result<(), AmfEncodingError> {
        if s.is_empty() {
            self.buf.put_u8(amf3::EMPTY_STRING);
            return Ok(());
        }
        if let Some(index) = self.refs.find_string(s) {
            return amf3::put_u29(&mut self.buf, index << 1);
        }

        if s.len() > amf3::U28_MAX as usize {
            return Err(AmfEncodingError::StringTooLong(s.len()));
        }
        amf3::put_u29(&mut self.buf, ((s.len() as u32) << 1) | 0x01)?;
        self.buf.put_slice(s.as_bytes());
        self.refs.add_string(s);
        Ok(())
    }

    fn put_strict_array(&mut self, values: &[AmfValue]) -> Result<(), AmfEncodingError> {
        if self.version == Version::Amf3 {
            return Err(AmfEncodingError::Amf0OnlyValue("strict array"));
        }
        if values.len() > u32::MAX as usize {
            return Err(AmfEncodingError::ArrayTooLong(values.len()));
        }
        self.buf.put_u8(amf0::STRICT_ARRAY);
        self.buf.put_u32(values.len() as u32);
        for value in values {
            self.put_value(value)?;
        }
        Ok(())
    }

    fn put_amf0_object(
        &mut self,
        properties: &HashMap<String, AmfValue>,
    ) -> Result<(), AmfEncodingError> {
        if self.version == Version::Amf3 {
            return Err(AmfEncodingError::Amf0OnlyValue("object"));
        }
        self.buf.put_u8(amf0::OBJECT);
        self.put_object_properties(properties)
    }

    fn put_typed_object(
        &mut self,
        class_name: &str,
        properties: &HashMap<String, AmfValue>,
    ) -> Result<(), AmfEncodingError> {
        if self.version == Version::Amf3 {
            return Err(AmfEncodingError::Amf0OnlyValue("typed object"));
        }
        self.buf.put_u8(amf0::TYPED_OBJECT);
        self.put_utf8(class_name)?;
        self.put_object_properties(properties)
    }

    fn put_object_properties(
        &mut self,
        properties: &HashMap<String, AmfValue>,
    ) -> Result<(), AmfEncodingError> {
        for (key, value) in properties {
            self.put_utf8(key)?;
            self.put_value(value)?;
        }
        // Empty key plus the object end marker terminate the list.
        self.buf.put_u16(0);
        self.buf.put_u8(amf0::OBJECT_END);
        Ok(())
    }

    /// Runs `encode` with the sub-version switched to AMF3, emitting the
    /// AMF0 escape marker first when the enclosing stream is AMF0. The
    /// switch covers exactly this value's subtree; siblings are unaffected.
    fn with_amf3<F>(&mut self, encode: F) -> Result<(), AmfEncodingError>
    where
        F: FnOnce(&mut Self) -> Result<(), AmfEncodingError>,
    {
        let version = self.version;
        if version == Version::Amf0 {
            self.buf.put_u8(amf0::AVMPLUS_OBJECT);
            self.version = Version::Amf3;
        }
        let result = encode(self);
        self.version = version;
        result
    }

    fn put_amf3_array(&mut self, array: &Amf3Array) -> Result<(), AmfEncodingError> {
        self.with_amf3(|encoder| {
            encoder.buf.put_u8(amf3::ARRAY);
            if let Some(index) = encoder.refs.find_object(array.id()) {
                return amf3::put_u29(&mut encoder.buf, index << 1);
            }

            if array.dense.len() > amf3::U28_MAX as usize {
                return Err(AmfEncodingError::ArrayTooLong(array.dense.len()));
            }
            amf3::put_u29(&mut encoder.buf, ((array.dense.len() as u32) << 1) | 0x01)?;
            for (key, value) in &array.associative {
                encoder.put_utf8_vr(key)?;
                encoder.put_value(value)?;
            }
            encoder.buf.put_u8(amf3::EMPTY_STRING);
            for value in &array.dense {
                encoder.put_value(value)?;
            }

            // Registered only after the full body, mirroring decode.
            encoder.refs.add_object(AmfValue::Amf3Array(array.clone()));
            Ok(())
        })
    }

    fn put_amf3_object(&mut self, object: &Amf3Object) -> Result<(), AmfEncodingError> {
        if object.member_names.len() != object.values.len() {
            return Err(AmfEncodingError::MemberCountMismatch {
                names: object.member_names.len(),
                values: object.values.len(),
            });
        }

        self.with_amf3(|encoder| {
            encoder.buf.put_u8(amf3::OBJECT);
            if let Some(index) = encoder.refs.find_trait(object.trait_id()) {
                amf3::put_u29(&mut encoder.buf, (index << 2) | 0x01)?;
            } else {
                let member_count = object.member_names.len();
                if member_count > (amf3::U29_MAX >> 4) as usize {
                    return Err(AmfEncodingError::TooManySealedMembers(member_count));
                }
                let mut header = ((member_count as u32) << 4) | 0x03;
                if object.dynamic {
                    header |= 0x08;
                }
                amf3::put_u29(&mut encoder.buf, header)?;
                encoder.put_utf8_vr(&object.class_name)?;
                for name in &object.member_names {
                    encoder.put_utf8_vr(name)?;
                }
                // The shape is registered before the member values, so a
                // nested object may reference it.
                encoder.refs.add_trait(object.shape());
            }

            // Member values follow the header in both the inline and the
            // trait-reference forms, positionally matched to the names.
            for name in &object.member_names {
                let value = object
                    .values
                    .get(name)
                    .ok_or(AmfEncodingError::MemberCountMismatch {
                        names: object.member_names.len(),
                        values: object.values.len(),
                    })?;
                encoder.put_value(value)?;
            }

            if object.dynamic {
                for (name, value) in &object.dyn_values {
                    encoder.put_utf8_vr(name)?;
                    encoder.put_value(value)?;
                }
                encoder.buf.put_u8(amf3::EMPTY_STRING);
            }
            Ok(())
        })
    }
}

impl Encode for AmfValue {
    fn encode_amf(&self, encoder: &mut EncoderState<'_>) -> Result<(), AmfEncodingError> {
        encoder.put_value(self)
    }
}

impl Encode for bool {
    fn encode_amf(&self, encoder: &mut EncoderState<'_>) -> Result<(), AmfEncodingError> {
        encoder.put_boolean(*self);
        Ok(())
    }
}

impl Encode for f64 {
    fn encode_amf(&self, encoder: &mut EncoderState<'_>) -> Result<(), AmfEncodingError> {
        encoder.put_number(*self);
        Ok(())
    }
}

impl Encode for i32 {
    fn encode_amf(&self, encoder: &mut EncoderState<'_>) -> Result<(), AmfEncodingError> {
        encoder.put_integer(*self)
    }
}

impl Encode for str {
    fn encode_amf(&self, encoder: &mut EncoderState<'_>) -> Result<(), AmfEncodingError> {
        encoder.put_string(self)
    }
}

impl Encode for String {
    fn encode_amf(&self, encoder: &mut EncoderState<'_>) -> Result<(), AmfEncodingError> {
        encoder.put_string(self)
    }
}

/// Homogeneous sequences encode as an AMF0 strict array, or as an AMF3
/// array with an empty associative portion.
impl<T: Encode> Encode for [T] {
    fn encode_amf(&self, encoder: &mut EncoderState<'_>) -> Result<(), AmfEncodingError> {
        match encoder.version {
            Version::Amf0 => {
                if self.len() > u32::MAX as usize {
                    return Err(AmfEncodingError::ArrayTooLong(self.len()));
                }
                encoder.buf.put_u8(amf0::STRICT_ARRAY);
                encoder.buf.put_u32(self.len() as u32);
                for value in self {
                    value.encode_amf(encoder)?;
                }
                Ok(())
            }
            Version::Amf3 => {
                if self.len() > amf3::U28_MAX as usize {
                    return Err(AmfEncodingError::ArrayTooLong(self.len()));
                }
                encoder.buf.put_u8(amf3::ARRAY);
                amf3::put_u29(&mut encoder.buf, ((self.len() as u32) << 1) | 0x01)?;
                encoder.buf.put_u8(amf3::EMPTY_STRING);
                for value in self {
                    value.encode_amf(encoder)?;
                }
                Ok(())
            }
        }
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode_amf(&self, encoder: &mut EncoderState<'_>) -> Result<(), AmfEncodingError> {
        self.as_slice().encode_amf(encoder)
    }
}
