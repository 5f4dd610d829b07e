use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::warn;

use crate::amf0;
use crate::decoding::{DEFAULT_MAX_DEPTH, DecoderState};
use crate::encoding::EncoderState;
use crate::error::{AmfDecodingError, AmfEncodingError};
use crate::refs::RefTables;
use crate::value::{AmfValue, Version};

/// Length field value meaning "the value follows inline, un-length-prefixed".
const UNKNOWN_CONTENT_LENGTH: u32 = 0xFFFF_FFFF;

/// The outer envelope: a list of named headers and named messages, each
/// wrapping one encoded value. All of them share one set of reference
/// tables per encode or decode call.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub version: Version,
    pub headers: Vec<PacketHeader>,
    pub messages: Vec<PacketMessage>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PacketHeader {
    pub name: String,
    pub must_understand: u8,
    pub value: AmfValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PacketMessage {
    pub target_uri: String,
    pub response_uri: String,
    pub value: AmfValue,
}

impl Packet {
    pub fn new(version: Version) -> Self {
        Self {
            version,
            headers: vec![],
            messages: vec![],
        }
    }

    /// Header names are constrained to the AMF0 short-string form,
    /// independent of the string encoder's own long-string fallback.
    pub fn add_header(
        &mut self,
        name: impl Into<String>,
        must_understand: u8,
        value: AmfValue,
    ) -> Result<(), AmfEncodingError> {
        let name = envelope_field(name)?;
        self.headers.push(PacketHeader {
            name,
            must_understand,
            value,
        });
        Ok(())
    }

    pub fn add_message(
        &mut self,
        target_uri: impl Into<String>,
        response_uri: impl Into<String>,
        value: AmfValue,
    ) -> Result<(), AmfEncodingError> {
        let target_uri = envelope_field(target_uri)?;
        let response_uri = envelope_field(response_uri)?;
        self.messages.push(PacketMessage {
            target_uri,
            response_uri,
            value,
        });
        Ok(())
    }
}

fn envelope_field(field: impl Into<String>) -> Result<String, AmfEncodingError> {
    let field = field.into();
    if field.len() >= amf0::MAX_PLAIN_STRING_LEN {
        return Err(AmfEncodingError::FieldTooLong(field.len()));
    }
    Ok(field)
}

pub fn encode_packet(packet: &Packet) -> Result<Bytes, AmfEncodingError> {
    let mut refs = RefTables::default();
    let mut buf = BytesMut::new();
    buf.put_u16(packet.version.as_u16());

    put_count(&mut buf, packet.headers.len())?;
    for header in &packet.headers {
        put_envelope_field(&mut buf, &header.name)?;
        buf.put_u8(header.must_understand);
        put_value_block(&mut buf, &mut refs, packet.version, &header.value)?;
    }

    put_count(&mut buf, packet.messages.len())?;
    for message in &packet.messages {
        put_envelope_field(&mut buf, &message.target_uri)?;
        put_envelope_field(&mut buf, &message.response_uri)?;
        put_value_block(&mut buf, &mut refs, packet.version, &message.value)?;
    }

    Ok(buf.freeze())
}

fn put_count(buf: &mut BytesMut, count: usize) -> Result<(), AmfEncodingError> {
    if count > u16::MAX as usize {
        return Err(AmfEncodingError::TooManyEntries(count));
    }
    buf.put_u16(count as u16);
    Ok(())
}

fn put_envelope_field(buf: &mut BytesMut, field: &str) -> Result<(), AmfEncodingError> {
    if field.len() >= amf0::MAX_PLAIN_STRING_LEN {
        return Err(AmfEncodingError::FieldTooLong(field.len()));
    }
    buf.put_u16(field.len() as u16);
    buf.put_slice(field.as_bytes());
    Ok(())
}

/// Each value goes out as a length-prefixed sub-block so a tolerant reader
/// can skip a corrupt or unsupported one. The sub-encoder shares the
/// packet's reference tables.
fn put_value_block(
    buf: &mut BytesMut,
    refs: &mut RefTables,
    version: Version,
    value: &AmfValue,
) -> Result<(), AmfEncodingError> {
    let mut encoder = EncoderState::new(BytesMut::new(), refs, version);
    encoder.put_value(value)?;
    let body = encoder.into_bytes();
    if body.len() >= UNKNOWN_CONTENT_LENGTH as usize {
        return Err(AmfEncodingError::ValueTooLong(body.len()));
    }
    buf.put_u32(body.len() as u32);
    buf.put_slice(&body);
    Ok(())
}

pub fn decode_packet(packet_bytes: Bytes) -> Result<Packet, AmfDecodingError> {
    let mut refs = RefTables::default();
    let mut buf = packet_bytes;

    if buf.remaining() < 2 {
        return Err(AmfDecodingError::InsufficientData);
    }
    let raw_version = buf.get_u16();
    let version =
        Version::from_u16(raw_version).ok_or(AmfDecodingError::InvalidVersion(raw_version))?;
    let mut packet = Packet::new(version);

    let header_count = get_count(&mut buf)?;
    for _ in 0..header_count {
        let name = get_envelope_field(&mut buf)?;
        if !buf.has_remaining() {
            return Err(AmfDecodingError::InsufficientData);
        }
        let must_understand = buf.get_u8();
        let value = get_value_block(&mut buf, &mut refs, version)?;
        packet.headers.push(PacketHeader {
            name,
            must_understand,
            value,
        });
    }

    let message_count = get_count(&mut buf)?;
    for _ in 0..message_count {
        let target_uri = get_envelope_field(&mut buf)?;
        let response_uri = get_envelope_field(&mut buf)?;
        let value = get_value_block(&mut buf, &mut refs, version)?;
        packet.messages.push(PacketMessage {
            target_uri,
            response_uri,
            value,
        });
    }

    if buf.has_remaining() {
        let trailing = buf.remaining();
        warn!("{trailing} trailing bytes after the packet body");
    }
    Ok(packet)
}

fn get_count(buf: &mut Bytes) -> Result<usize, AmfDecodingError> {
    if buf.remaining() < 2 {
        return Err(AmfDecodingError::InsufficientData);
    }
    Ok(buf.get_u16() as usize)
}

fn get_envelope_field(buf: &mut Bytes) -> Result<String, AmfDecodingError> {
    if buf.remaining() < 2 {
        return Err(AmfDecodingError::InsufficientData);
    }
    let size = buf.get_u16() as usize;
    if buf.remaining() < size {
        return Err(AmfDecodingError::InsufficientData);
    }
    let raw = buf.split_to(size);
    String::from_utf8(raw.to_vec()).map_err(|_| AmfDecodingError::InvalidUtf8)
}

/// A length of `0xFFFFFFFF` means the value parses straight from the packet
/// cursor; any other length is an exact byte count sliced off and decoded
/// with its own fresh cursor but the packet's shared reference tables.
fn get_value_block(
    buf: &mut Bytes,
    refs: &mut RefTables,
    version: Version,
) -> Result<AmfValue, AmfDecodingError> {
    if buf.remaining() < 4 {
        return Err(AmfDecodingError::InsufficientData);
    }
    let length = buf.get_u32();

    if length == UNKNOWN_CONTENT_LENGTH {
        let mut decoder = DecoderState::new(buf.clone(), refs, version, DEFAULT_MAX_DEPTH);
        let value = decoder.decode_value()?;
        *buf = decoder.into_remaining();
        Ok(value)
    } else {
        if buf.remaining() < length as usize {
            return Err(AmfDecodingError::InsufficientData);
        }
        let body = buf.split_to(length as usize);
        let mut decoder = DecoderState::new(body, refs, version, DEFAULT_MAX_DEPTH);
        let value = decoder.decode_value()?;
        if decoder.remaining() > 0 {
            let trailing = decoder.remaining();
            warn!("{trailing} trailing bytes in a length-prefixed value block");
        }
        Ok(value)
    }
}
