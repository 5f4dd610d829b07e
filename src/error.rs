use thiserror::Error;

/// A recognized marker or object-encoding variant this codec does not implement.
///
/// These decode into explicit errors rather than being skipped, so unsupported
/// input never turns into silent data loss.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsupportedFeature {
    #[error("AMF0 movie clip marker")]
    Amf0MovieClip,

    #[error("AMF0 reference marker")]
    Amf0Reference,

    #[error("AMF0 ECMA array marker")]
    Amf0EcmaArray,

    #[error("AMF0 date marker")]
    Amf0Date,

    #[error("AMF0 unsupported marker")]
    Amf0Unsupported,

    #[error("AMF0 record set marker")]
    Amf0RecordSet,

    #[error("AMF0 XML document marker")]
    Amf0XmlDocument,

    #[error("AMF3 XML document marker")]
    Amf3XmlDocument,

    #[error("AMF3 date marker")]
    Amf3Date,

    #[error("AMF3 XML marker")]
    Amf3Xml,

    #[error("AMF3 byte array marker")]
    Amf3ByteArray,

    #[error("AMF3 object instance reference")]
    Amf3ObjectReference,

    #[error("AMF3 externalizable traits")]
    ExternalizableTraits,
}

#[derive(Error, Debug)]
pub enum AmfDecodingError {
    #[error("not enough bytes in the buffer")]
    InsufficientData,

    #[error("invalid UTF-8 in a string payload")]
    InvalidUtf8,

    #[error("unknown marker: {0:#04x}")]
    UnknownMarker(u8),

    #[error("unsupported feature: {0}")]
    Unsupported(#[from] UnsupportedFeature),

    #[error("reference index {0} is out of range")]
    OutOfBoundsReference(u32),

    #[error("AMF version should be 0 or 3, got {0}")]
    InvalidVersion(u16),

    #[error("expected object end marker after an empty property key")]
    MissingObjectEnd,

    #[error("object end marker outside of a property list")]
    UnexpectedObjectEnd,

    #[error("sealed member values do not match the trait member names")]
    MemberCountMismatch,

    #[error("maximum nesting depth of {0} exceeded")]
    MaxDepthExceeded(usize),
}

#[derive(Error, Debug)]
pub enum AmfEncodingError {
    #[error("value {0} is out of U29 range")]
    OutOfRangeU29(u32),

    #[error("integer {0} is out of the signed 29-bit range")]
    OutOfRangeInteger(i32),

    #[error("string of {0} bytes is too long for its encoding")]
    StringTooLong(usize),

    #[error("array of {0} elements is too long for its encoding")]
    ArrayTooLong(usize),

    #[error("too many sealed members: {0}")]
    TooManySealedMembers(usize),

    #[error("{names} sealed member names but {values} member values")]
    MemberCountMismatch { names: usize, values: usize },

    #[error("{0} can only be encoded in an AMF0 stream")]
    Amf0OnlyValue(&'static str),

    #[error("envelope field of {0} bytes exceeds the AMF0 plain string limit")]
    FieldTooLong(usize),

    #[error("encoded value of {0} bytes does not fit the envelope length field")]
    ValueTooLong(usize),

    #[error("{0} entries do not fit the 16-bit envelope count field")]
    TooManyEntries(usize),
}
