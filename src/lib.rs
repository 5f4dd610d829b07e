//! Codec for the AMF0 and AMF3 binary object-serialization formats.

pub mod error;
pub mod packet;
pub mod value;

mod amf0;
mod amf3;
mod decoding;
mod encoding;
mod refs;


pub use decoding::{
    DEFAULT_MAX_DEPTH, decode_amf0, decode_amf3, decode_value, decode_value_with_limit,
};
pub use encoding::{Encode, EncoderState, encode_amf0, encode_amf3, encode_value};
pub use error::{AmfDecodingError, AmfEncodingError, UnsupportedFeature};
pub use packet::{Packet, PacketHeader, PacketMessage, decode_packet, encode_packet};
pub use value::{Amf3Array, Amf3Object, AmfValue, Version};
