//! AMF3 marker bytes and the U29 variable-length integer codec.

use bytes::{Buf, BufMut};

use crate::error::{AmfDecodingError, AmfEncodingError};

pub(crate) const UNDEFINED: u8 = 0x00;
pub(crate) const NULL: u8 = 0x01;
pub(crate) const FALSE: u8 = 0x02;
pub(crate) const TRUE: u8 = 0x03;
pub(crate) const INTEGER: u8 = 0x04;
pub(crate) const DOUBLE: u8 = 0x05;
pub(crate) const STRING: u8 = 0x06;
pub(crate) const XML_DOC: u8 = 0x07;
pub(crate) const DATE: u8 = 0x08;
pub(crate) const ARRAY: u8 = 0x09;
pub(crate) const OBJECT: u8 = 0x0A;
pub(crate) const XML: u8 = 0x0B;
pub(crate) const BYTE_ARRAY: u8 = 0x0C;

/// The U29 form of the zero-length string, doubling as the terminator of
/// associative and dynamic member lists.
pub(crate) const EMPTY_STRING: u8 = 0x01;

pub(crate) const U29_MAX: u32 = (1 << 29) - 1;
pub(crate) const U28_MAX: u32 = (1 << 28) - 1;

pub(crate) const I29_MAX: i32 = (1 << 28) - 1;
pub(crate) const I29_MIN: i32 = -(1 << 28);

/// Encode an unsigned integer into 1-4 bytes. The first three bytes carry a
/// continuation flag and 7 payload bits each; the fourth byte, when present,
/// is a full 8-bit extension (3 x 7 + 8 = 29 bits).
pub(crate) fn put_u29(buf: &mut impl BufMut, value: u32) -> Result<(), AmfEncodingError> {
    match value {
        0..=0x7F => buf.put_u8(value as u8),
        0x80..=0x3FFF => {
            buf.put_u8((value >> 7) as u8 | 0x80);
            buf.put_u8((value & 0x7F) as u8);
        }
        0x4000..=0x1F_FFFF => {
            buf.put_u8((value >> 14) as u8 | 0x80);
            buf.put_u8(((value >> 7) & 0x7F) as u8 | 0x80);
            buf.put_u8((value & 0x7F) as u8);
        }
        0x20_0000..=U29_MAX => {
            buf.put_u8(((value >> 22) & 0x7F) as u8 | 0x80);
            buf.put_u8(((value >> 15) & 0x7F) as u8 | 0x80);
            buf.put_u8(((value >> 8) & 0x7F) as u8 | 0x80);
            buf.put_u8((value & 0xFF) as u8);
        }
        _ => return Err(AmfEncodingError::OutOfRangeU29(value)),
    }
    Ok(())
}

pub(crate) fn get_u29(buf: &mut impl Buf) -> Result<u32, AmfDecodingError> {
    let mut value: u32 = 0;
    for _ in 0..3 {
        if !buf.has_remaining() {
            return Err(AmfDecodingError::InsufficientData);
        }
        let byte = buf.get_u8();
        value = (value << 7) | (byte & 0x7F) as u32;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }

    // Third byte still had the continuation flag set: a mandatory fourth
    // byte follows as a full 8-bit extension.
    if !buf.has_remaining() {
        return Err(AmfDecodingError::InsufficientData);
    }
    Ok((value << 8) | buf.get_u8() as u32)
}

/// Signed 29-bit integers map onto U29 via two's complement truncated to
/// 29 bits; values outside `[I29_MIN, I29_MAX]` are rejected.
pub(crate) fn put_i29(buf: &mut impl BufMut, value: i32) -> Result<(), AmfEncodingError> {
    if !(I29_MIN..=I29_MAX).contains(&value) {
        return Err(AmfEncodingError::OutOfRangeInteger(value));
    }
    put_u29(buf, (value as u32) & U29_MAX)
}

pub(crate) fn get_i29(buf: &mut impl Buf) -> Result<i32, AmfDecodingError> {
    let u29 = get_u29(buf)?;
    if u29 & (1 << 28) != 0 {
        Ok((u29 as i32) - (1 << 29))
    } else {
        Ok(u29 as i32)
    }
}

#[cfg(test)]
mod u29_tests {
    use bytes::{Bytes, BytesMut};

    use super::{get_i29, get_u29, put_i29, put_u29};
    use crate::error::AmfEncodingError;

    fn encode(value: u32) -> Bytes {
        let mut buf = BytesMut::new();
        put_u29(&mut buf, value).unwrap();
        buf.freeze()
    }

    #[test]
    fn test_u29_byte_lengths() {
        assert_eq!(encode(0).len(), 1);
        assert_eq!(encode(127).len(), 1);
        assert_eq!(encode(128).len(), 2);
        assert_eq!(encode(16_383).len(), 2);
        assert_eq!(encode(16_384).len(), 3);
        assert_eq!(encode(2_097_151).len(), 3);
        assert_eq!(encode(2_097_152).len(), 4);
        assert_eq!(encode(536_870_911).len(), 4);
    }

    #[test]
    fn test_u29_boundary_round_trips() {
        for value in [
            0,
            127,
            128,
            16_383,
            16_384,
            2_097_151,
            2_097_152,
            536_870_911,
        ] {
            let mut encoded = encode(value);
            assert_eq!(get_u29(&mut encoded).unwrap(), value);
        }
    }

    #[test]
    fn test_u29_known_encodings() {
        assert_eq!(encode(105), Bytes::from_iter([0b01101001]));
        assert_eq!(encode(2137), Bytes::from_iter([0b10010000, 0b01011001]));
        assert_eq!(
            encode(1_002_137),
            Bytes::from_iter([0b10111101, 0b10010101, 0b00011001])
        );
        assert_eq!(
            encode(21_372_137),
            Bytes::from_iter([0b10000101, 0b10001100, 0b10011100, 0b11101001])
        );
    }

    #[test]
    fn test_u29_out_of_range() {
        let mut buf = BytesMut::new();
        let err = put_u29(&mut buf, 536_870_912).unwrap_err();
        assert!(matches!(err, AmfEncodingError::OutOfRangeU29(536_870_912)));
    }

    #[test]
    fn test_i29_round_trips() {
        for value in [0, 1, -1, 2137, -2137, (1 << 28) - 1, -(1 << 28)] {
            let mut buf = BytesMut::new();
            put_i29(&mut buf, value).unwrap();
            let mut encoded = buf.freeze();
            assert_eq!(get_i29(&mut encoded).unwrap(), value);
        }
    }

    #[test]
    fn test_i29_out_of_range() {
        let mut buf = BytesMut::new();
        assert!(matches!(
            put_i29(&mut buf, 1 << 28),
            Err(AmfEncodingError::OutOfRangeInteger(_))
        ));
        assert!(matches!(
            put_i29(&mut buf, -(1 << 28) - 1),
            Err(AmfEncodingError::OutOfRangeInteger(_))
        ));
    }
}
