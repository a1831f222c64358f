//! Avro binary value encoding (§4.2).
//!
//! Integers use zig-zag varint encoding; floats/doubles are raw
//! little-endian IEEE 754; strings and bytes are a zig-zag length prefix
//! followed by the raw payload. Nullable fields are Avro unions `["null", T]`,
//! encoded as a zig-zag branch index (`0` for null, `1` for `T`) followed by
//! the value when present.

use common::codec::zigzag_encode;

#[derive(Debug, Clone, PartialEq)]
pub enum AvroValue {
    Null,
    Long(i64),
    Int(i32),
    Float(f32),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    /// Index into the enum's `symbols` array.
    Enum(i32),
}

pub fn encode_value(buf: &mut Vec<u8>, value: &AvroValue) {
    match value {
        AvroValue::Null => {}
        AvroValue::Long(n) => buf.extend_from_slice(&zigzag_encode(*n)),
        AvroValue::Int(n) => buf.extend_from_slice(&zigzag_encode(*n as i64)),
        AvroValue::Float(f) => buf.extend_from_slice(&f.to_le_bytes()),
        AvroValue::Double(d) => buf.extend_from_slice(&d.to_le_bytes()),
        AvroValue::String(s) => encode_bytes(buf, s.as_bytes()),
        AvroValue::Bytes(b) => encode_bytes(buf, b),
        AvroValue::Enum(idx) => buf.extend_from_slice(&zigzag_encode(*idx as i64)),
    }
}

fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&zigzag_encode(bytes.len() as i64));
    buf.extend_from_slice(bytes);
}

/// Encodes a nullable field (`["null", T]` union): branch `0` for
/// `Option::None`, branch `1` followed by the value otherwise.
pub fn encode_nullable(buf: &mut Vec<u8>, value: &Option<AvroValue>) {
    match value {
        None => buf.extend_from_slice(&zigzag_encode(0)),
        Some(v) => {
            buf.extend_from_slice(&zigzag_encode(1));
            encode_value(buf, v);
        }
    }
}
