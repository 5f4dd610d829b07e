use std::collections::HashMap;

use bytes::{Buf, Bytes};

use crate::error::{AmfDecodingError, UnsupportedFeature};
use crate::refs::RefTables;
use crate::value::{Amf3Array, Amf3Object, AmfValue, TraitShape, Version};
use crate::{amf0, amf3};

/// Nesting depth at which decoding gives up instead of exhausting the call
/// stack on adversarial input.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Decode a single AMF0-encoded value.
pub fn decode_amf0(amf_bytes: Bytes) -> Result<AmfValue, AmfDecodingError> {
    decode_value(amf_bytes, Version::Amf0)
}

/// Decode a single AMF3-encoded value.
pub fn decode_amf3(amf_bytes: Bytes) -> Result<AmfValue, AmfDecodingError> {
    decode_value(amf_bytes, Version::Amf3)
}

pub fn decode_value(amf_bytes: Bytes, version: Version) -> Result<AmfValue, AmfDecodingError> {
    decode_value_with_limit(amf_bytes, version, DEFAULT_MAX_DEPTH)
}

pub fn decode_value_with_limit(
    amf_bytes: Bytes,
    version: Version,
    max_depth: usize,
) -> Result<AmfValue, AmfDecodingError> {
    let mut refs = RefTables::default();
    let mut decoder = DecoderState::new(amf_bytes, &mut refs, version, max_depth);
    decoder.decode_value()
}

/// Marker-driven recursive-descent reader. The reference tables are shared
/// by every value nested under one top-level call, including every header
/// and message of a packet.
pub(crate) struct DecoderState<'a> {
    buf: Bytes,
    refs: &'a mut RefTables,
    version: Version,
    depth: usize,
    max_depth: usize,
}

impl<'a> DecoderState<'a> {
    pub(crate) fn new(
        buf: Bytes,
        refs: &'a mut RefTables,
        version: Version,
        max_depth: usize,
    ) -> Self {
        Self {
            buf,
            refs,
            version,
            depth: 0,
            max_depth,
        }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    pub(crate) fn into_remaining(self) -> Bytes {
        self.buf
    }

    pub(crate) fn decode_value(&mut self) -> Result<AmfValue, AmfDecodingError> {
        if self.depth >= self.max_depth {
            return Err(AmfDecodingError::MaxDepthExceeded(self.max_depth));
        }
        if !self.buf.has_remaining() {
            return Err(AmfDecodingError::InsufficientData);
        }

        let marker = self.buf.get_u8();
        self.depth += 1;
        let value = match self.version {
            Version::Amf0 => self.decode_amf0_marker(marker),
            Version::Amf3 => self.decode_amf3_marker(marker),
        };
        self.depth -= 1;
        value
    }

    fn decode_amf0_marker(&mut self, marker: u8) -> Result<AmfValue, AmfDecodingError> {
        match marker {
            amf0::NUMBER => Ok(AmfValue::Number(self.decode_number()?)),
            amf0::BOOLEAN => Ok(AmfValue::Boolean(self.decode_boolean()?)),
            amf0::STRING => Ok(AmfValue::String(self.decode_utf8()?)),
            amf0::OBJECT => Ok(AmfValue::Object(self.decode_object_properties()?)),
            amf0::NULL => Ok(AmfValue::Null),
            amf0::UNDEFINED => Ok(AmfValue::Undefined),
            amf0::OBJECT_END => Err(AmfDecodingError::UnexpectedObjectEnd),
            amf0::STRICT_ARRAY => self.decode_strict_array(),
            amf0::LONG_STRING => Ok(AmfValue::String(self.decode_long_utf8()?)),
            amf0::TYPED_OBJECT => self.decode_typed_object(),
            amf0::AVMPLUS_OBJECT => self.decode_avmplus(),
            amf0::MOVIE_CLIP => Err(UnsupportedFeature::Amf0MovieClip.into()),
            amf0::REFERENCE => Err(UnsupportedFeature::Amf0Reference.into()),
            amf0::ECMA_ARRAY => Err(UnsupportedFeature::Amf0EcmaArray.into()),
            amf0::DATE => Err(UnsupportedFeature::Amf0Date.into()),
            amf0::UNSUPPORTED => Err(UnsupportedFeature::Amf0Unsupported.into()),
            amf0::RECORD_SET => Err(UnsupportedFeature::Amf0RecordSet.into()),
            amf0::XML_DOCUMENT => Err(UnsupportedFeature::Amf0XmlDocument.into()),
            other => Err(AmfDecodingError::UnknownMarker(other)),
        }
    }

    fn decode_amf3_marker(&mut self, marker: u8) -> Result<AmfValue, AmfDecodingError> {
        match marker {
            amf3::UNDEFINED => Ok(AmfValue::Undefined),
            amf3::NULL => Ok(AmfValue::Null),
            amf3::FALSE => Ok(AmfValue::Boolean(false)),
            amf3::TRUE => Ok(AmfValue::Boolean(true)),
            amf3::INTEGER => Ok(AmfValue::Integer(amf3::get_i29(&mut self.buf)?)),
            amf3::DOUBLE => Ok(AmfValue::Number(self.decode_number()?)),
            amf3::STRING => Ok(AmfValue::String(self.decode_utf8_vr()?)),
            amf3::ARRAY => self.decode_amf3_array(),
            amf3::OBJECT => self.decode_amf3_object(),
            amf3::XML_DOC => Err(UnsupportedFeature::Amf3XmlDocument.into()),
            amf3::DATE => Err(UnsupportedFeature::Amf3Date.into()),
            amf3::XML => Err(UnsupportedFeature::Amf3Xml.into()),
            amf3::BYTE_ARRAY => Err(UnsupportedFeature::Amf3ByteArray.into()),
            other => Err(AmfDecodingError::UnknownMarker(other)),
        }
    }

    fn decode_number(&mut self) -> Result<f64, AmfDecodingError> {
        if self.buf.remaining() < 8 {
            return Err(AmfDecodingError::InsufficientData);
        }
        Ok(self.buf.get_f64())
    }

    fn decode_boolean(&mut self) -> Result<bool, AmfDecodingError> {
        if !self.buf.has_remaining() {
            return Err(AmfDecodingError::InsufficientData);
        }
        Ok(self.buf.get_u8() != 0x00)
    }

    fn decode_utf8(&mut self) -> Result<String, AmfDecodingError> {
        if self.buf.remaining() < 2 {
            return Err(AmfDecodingError::InsufficientData);
        }
        let size = self.buf.get_u16() as usize;
        self.decode_utf8_payload(size)
    }

    fn decode_long_utf8(&mut self) -> Result<String, AmfDecodingError> {
        if self.buf.remaining() < 4 {
            return Err(AmfDecodingError::InsufficientData);
        }
        let size = self.buf.get_u32() as usize;
        self.decode_utf8_payload(size)
    }

    fn decode_utf8_payload(&mut self, size: usize) -> Result<String, AmfDecodingError> {
        if self.buf.remaining() < size {
            return Err(AmfDecodingError::InsufficientData);
        }
        let raw = self.buf.split_to(size);
        String::from_utf8(raw.to_vec()).map_err(|_| AmfDecodingError::InvalidUtf8)
    }

    /// AMF0 property list: repeated key/value pairs, terminated by an empty
    /// key immediately followed by the object end marker. An empty key
    /// followed by anything else is a format error.
    fn decode_object_properties(&mut self) -> Result<HashMap<String, AmfValue>, AmfDecodingError> {
        let mut properties = HashMap::new();
        loop {
            let key = self.decode_utf8()?;
            if key.is_empty() {
                if !self.buf.has_remaining() {
                    return Err(AmfDecodingError::InsufficientData);
                }
                if self.buf.get_u8() != amf0::OBJECT_END {
                    return Err(AmfDecodingError::MissingObjectEnd);
                }
                return Ok(properties);
            }
            let value = self.decode_value()?;
            properties.insert(key, value);
        }
    }

    fn decode_strict_array(&mut self) -> Result<AmfValue, AmfDecodingError> {
        if self.buf.remaining() < 4 {
            return Err(AmfDecodingError::InsufficientData);
        }
        let count = self.buf.get_u32() as usize;
        let mut values = Vec::new();
        for _ in 0..count {
            values.push(self.decode_value()?);
        }
        Ok(AmfValue::StrictArray(values))
    }

    fn decode_typed_object(&mut self) -> Result<AmfValue, AmfDecodingError> {
        let class_name = self.decode_utf8()?;
        let properties = self.decode_object_properties()?;
        Ok(AmfValue::TypedObject {
            class_name,
            properties,
        })
    }

    /// Version escape: the next value is AMF3-encoded. The switch is scoped
    /// to exactly one nested value; siblings decode with the prior version.
    fn decode_avmplus(&mut self) -> Result<AmfValue, AmfDecodingError> {
        let version = self.version;
        self.version = Version::Amf3;
        let value = self.decode_value();
        self.version = version;
        value
    }

    /// AMF3 U29-prefixed string with content-based back-references. The
    /// empty string is never registered in the string table.
    fn decode_utf8_vr(&mut self) -> Result<String, AmfDecodingError> {
        let u29 = amf3::get_u29(&mut self.buf)?;
        if u29 & 0x01 == 0 {
            return Ok(self.refs.get_string(u29 >> 1)?.to_string());
        }

        let size = (u29 >> 1) as usize;
        if size == 0 {
            return Ok(String::new());
        }
        let string = self.decode_utf8_payload(size)?;
        self.refs.add_string(&string);
        Ok(string)
    }

    fn decode_amf3_array(&mut self) -> Result<AmfValue, AmfDecodingError> {
        let u29 = amf3::get_u29(&mut self.buf)?;
        if u29 & 0x01 == 0 {
            return Ok(self.refs.get_object(u29 >> 1)?.clone());
        }

        let dense_len = (u29 >> 1) as usize;
        let mut array = Amf3Array::new();
        loop {
            let key = self.decode_utf8_vr()?;
            if key.is_empty() {
                break;
            }
            let value = self.decode_value()?;
            array.add_assoc_value(key, value);
        }
        for _ in 0..dense_len {
            array.add_dense_value(self.decode_value()?);
        }

        // Registered only once both portions are fully read; an array cannot
        // reference itself from inside its own body.
        self.refs.add_object(AmfValue::Amf3Array(array.clone()));
        Ok(AmfValue::Amf3Array(array))
    }

    fn decode_amf3_object(&mut self) -> Result<AmfValue, AmfDecodingError> {
        let u29 = amf3::get_u29(&mut self.buf)?;

        let mut object = if u29 & 0x01 == 0 {
            // The format does not define re-materializing a shared instance
            // from an inline object reference.
            return Err(UnsupportedFeature::Amf3ObjectReference.into());
        } else if u29 & 0x03 == 0x01 {
            let shape = self.refs.get_trait(u29 >> 2)?.clone();
            self.decode_sealed_members(&shape)?
        } else if u29 & 0x07 == 0x07 {
            return Err(UnsupportedFeature::ExternalizableTraits.into());
        } else {
            let dynamic = u29 & 0x08 == 0x08;
            let member_count = (u29 >> 4) as usize;
            let class_name = self.decode_utf8_vr()?;
            let mut member_names = Vec::with_capacity(member_count);
            for _ in 0..member_count {
                member_names.push(self.decode_utf8_vr()?);
            }

            let shape = TraitShape::new(class_name, dynamic, member_names);
            // Registered before the member values are read, so a later member
            // may reference its own enclosing class shape.
            self.refs.add_trait(shape.clone());
            self.decode_sealed_members(&shape)?
        };

        if object.dynamic {
            loop {
                let name = self.decode_utf8_vr()?;
                if name.is_empty() {
                    break;
                }
                let value = self.decode_value()?;
                object.dyn_values.insert(name, value);
            }
        }
        Ok(AmfValue::Amf3Object(object))
    }

    fn decode_sealed_members(&mut self, shape: &TraitShape) -> Result<Amf3Object, AmfDecodingError> {
        let mut object = Amf3Object::from_shape(shape);
        for name in &shape.member_names {
            let value = self.decode_value()?;
            object.values.insert(name.clone(), value);
        }
        // Duplicate member names collapse in the value map and betray a
        // malformed trait declaration.
        if object.values.len() != shape.member_names.len() {
            return Err(AmfDecodingError::MemberCountMismatch);
        }
        Ok(object)
    }
}

#[cfg(test)]
mod decode_tests {
    use bytes::Bytes;

    use super::{decode_amf0, decode_amf3, decode_value_with_limit};
    use crate::error::{AmfDecodingError, UnsupportedFeature};
    use crate::value::{AmfValue, Version};
    use crate::{amf0, amf3};

    #[test]
    fn test_unsupported_amf0_markers() {
        for (marker, feature) in [
            (amf0::MOVIE_CLIP, UnsupportedFeature::Amf0MovieClip),
            (amf0::REFERENCE, UnsupportedFeature::Amf0Reference),
            (amf0::ECMA_ARRAY, UnsupportedFeature::Amf0EcmaArray),
            (amf0::DATE, UnsupportedFeature::Amf0Date),
            (amf0::UNSUPPORTED, UnsupportedFeature::Amf0Unsupported),
            (amf0::RECORD_SET, UnsupportedFeature::Amf0RecordSet),
            (amf0::XML_DOCUMENT, UnsupportedFeature::Amf0XmlDocument),
        ] {
            let err = decode_amf0(Bytes::from_iter([marker])).unwrap_err();
            assert!(matches!(err, AmfDecodingError::Unsupported(f) if f == feature));
        }
    }

    #[test]
    fn test_unsupported_amf3_markers() {
        for (marker, feature) in [
            (amf3::XML_DOC, UnsupportedFeature::Amf3XmlDocument),
            (amf3::DATE, UnsupportedFeature::Amf3Date),
            (amf3::XML, UnsupportedFeature::Amf3Xml),
            (amf3::BYTE_ARRAY, UnsupportedFeature::Amf3ByteArray),
        ] {
            let err = decode_amf3(Bytes::from_iter([marker])).unwrap_err();
            assert!(matches!(err, AmfDecodingError::Unsupported(f) if f == feature));
        }
    }

    #[test]
    fn test_unknown_marker() {
        let err = decode_amf0(Bytes::from_iter([0x42])).unwrap_err();
        assert!(matches!(err, AmfDecodingError::UnknownMarker(0x42)));

        let err = decode_amf3(Bytes::from_iter([0x42])).unwrap_err();
        assert!(matches!(err, AmfDecodingError::UnknownMarker(0x42)));
    }

    #[test]
    fn test_bare_object_end_marker() {
        let err = decode_amf0(Bytes::from_iter([amf0::OBJECT_END])).unwrap_err();
        assert!(matches!(err, AmfDecodingError::UnexpectedObjectEnd));
    }

    #[test]
    fn test_truncated_number() {
        let err = decode_amf0(Bytes::from_iter([amf0::NUMBER, 0x00, 0x01])).unwrap_err();
        assert!(matches!(err, AmfDecodingError::InsufficientData));
    }

    #[test]
    fn test_unterminated_object() {
        // Empty key must be followed by the object end marker.
        let err =
            decode_amf0(Bytes::from_iter([amf0::OBJECT, 0x00, 0x00, 0x42])).unwrap_err();
        assert!(matches!(err, AmfDecodingError::MissingObjectEnd));
    }

    #[test]
    fn test_object_reference_unsupported() {
        // U29 header with the low bit clear is an inline instance reference.
        let err = decode_amf3(Bytes::from_iter([amf3::OBJECT, 0x00])).unwrap_err();
        assert!(matches!(
            err,
            AmfDecodingError::Unsupported(UnsupportedFeature::Amf3ObjectReference)
        ));
    }

    #[test]
    fn test_externalizable_traits_unsupported() {
        let err = decode_amf3(Bytes::from_iter([amf3::OBJECT, 0x07])).unwrap_err();
        assert!(matches!(
            err,
            AmfDecodingError::Unsupported(UnsupportedFeature::ExternalizableTraits)
        ));
    }

    #[test]
    fn test_out_of_range_array_reference() {
        let err = decode_amf3(Bytes::from_iter([amf3::ARRAY, 0x02])).unwrap_err();
        assert!(matches!(err, AmfDecodingError::OutOfBoundsReference(1)));
    }

    #[test]
    fn test_out_of_range_string_reference() {
        let err = decode_amf3(Bytes::from_iter([amf3::STRING, 0x04])).unwrap_err();
        assert!(matches!(err, AmfDecodingError::OutOfBoundsReference(2)));
    }

    #[test]
    fn test_max_depth_exceeded() {
        // Strict arrays nested deeper than the limit allows.
        let mut bytes = vec![];
        for _ in 0..5 {
            bytes.extend_from_slice(&[amf0::STRICT_ARRAY, 0x00, 0x00, 0x00, 0x01]);
        }
        bytes.push(amf0::NULL);

        let err = decode_value_with_limit(Bytes::from(bytes.clone()), Version::Amf0, 3)
            .unwrap_err();
        assert!(matches!(err, AmfDecodingError::MaxDepthExceeded(3)));

        let value = decode_value_with_limit(Bytes::from(bytes), Version::Amf0, 8).unwrap();
        assert!(matches!(value, AmfValue::StrictArray(_)));
    }

    #[test]
    fn test_version_escape() {
        // AMF3 integer 5 wrapped in the AMF0 escape marker.
        let value = decode_amf0(Bytes::from_iter([
            amf0::AVMPLUS_OBJECT,
            amf3::INTEGER,
            0x05,
        ]))
        .unwrap();
        assert_eq!(value, AmfValue::Integer(5));
    }

    #[test]
    fn test_version_escape_is_scoped_to_one_value() {
        // [escaped AMF3 null, AMF0 boolean] inside one strict array.
        let value = decode_amf0(Bytes::from_iter([
            amf0::STRICT_ARRAY,
            0x00,
            0x00,
            0x00,
            0x02,
            amf0::AVMPLUS_OBJECT,
            amf3::NULL,
            amf0::BOOLEAN,
            0x01,
        ]))
        .unwrap();
        assert_eq!(
            value,
            AmfValue::StrictArray(vec![AmfValue::Null, AmfValue::Boolean(true)])
        );
    }
}
